//! Transcoder - Upload-to-HLS Transcoding Service
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (events, ladder, hls, layout, probe, jobs)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (S3, filesystem, Redis Streams, FFmpeg, HTTP)
//! - application/: Generic services (pipeline, dispatcher, consumer loop, health)
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod testing;

pub use config::TranscoderConfig;
