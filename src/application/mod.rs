//! Application layer - Generic services that use ports.

pub mod consumer;
pub mod dispatcher;
pub mod health;
pub mod pipeline;
