//! cangw-api - REST API layer for the CAN gateway
//!
//! # Usage
//!
//! ```ignore
//! use cangw_api::{create_router, AppState};
//! use cangw_gateway::{CanGateway, GatewayConfig};
//!
//! let gateway = Arc::new(CanGateway::new(GatewayConfig::default()));
//! let router = create_router(AppState::new(gateway));
//! ```

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use extract::{ApiJson, ApiQuery};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the gateway REST router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health::health))
        // Channel routes
        .route("/channels", get(handlers::channels::list_channels))
        .route(
            "/channels/{channel_id}",
            get(handlers::channels::get_channel),
        )
        // Message routes
        .route("/messages/send", post(handlers::messages::send_message))
        // Monitoring routes
        .route(
            "/monitoring/start",
            post(handlers::monitoring::start_monitoring),
        )
        .route(
            "/monitoring/stop",
            post(handlers::monitoring::stop_monitoring),
        )
        .route(
            "/monitoring/messages",
            get(handlers::monitoring::get_messages),
        )
        .route(
            "/monitoring/status",
            get(handlers::monitoring::get_status),
        )
        // Bus diagnostics
        .route(
            "/troubleshoot",
            get(handlers::troubleshoot::troubleshoot),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
