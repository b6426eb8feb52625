//! HTTP request handlers

pub mod channels;
pub mod health;
pub mod messages;
pub mod monitoring;
pub mod troubleshoot;
