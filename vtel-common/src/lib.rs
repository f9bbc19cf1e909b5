//! # VTEL Common Library
//!
//! Shared code for the video telemetry services including:
//! - Error types
//! - Configuration loading (TOML + environment)
//! - Event types (TelemetryEvent enum) and the EventBus
//! - SSE helpers
//! - Time formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
