//! Ports - Capability traits the application layer is generic over.

pub mod encoder;
pub mod events;
pub mod health;
pub mod storage;
