//! # VTEL Live Telemetry Library (vtel-live)
//!
//! Aggregates the push streams of running video-analytics sessions into a
//! bounded cache of per-session time series, latest results and frames.
//!
//! **Data flow:** upstream stream -> [`supervisor`] -> [`normalizer`] ->
//! [`throttle`] -> [`cache`] -> display layer ([`engine::SessionReader`], [`api`]).

pub mod api;
pub mod cache;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod rules;
pub mod series;
pub mod session;
pub mod summary;
pub mod supervisor;
pub mod throttle;
pub mod transport;

pub use engine::{EngineConfig, LiveEngine, SessionReader};
pub use error::{Error, Result};
pub use session::{SessionDescriptor, SessionId, SessionState};
