//! HTTP handlers.

pub mod chat;
pub mod connect;
pub mod execute;
pub mod health;
