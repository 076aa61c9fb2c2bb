//! Adapters for S3-compatible object storage.

pub mod s3;

pub use s3::{S3Adapter, S3Settings};
