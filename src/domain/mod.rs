//! Domain layer - Pure business logic.

pub mod events;
pub mod hls;
pub mod jobs;
pub mod ladder;
pub mod layout;
pub mod probe;
