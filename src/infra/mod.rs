//! Infrastructure adapters and runtime bootstrap.

pub mod blob;
pub mod error;
pub mod generator;
pub mod http;
pub mod jobs;
pub mod launcher;
pub mod telemetry;
