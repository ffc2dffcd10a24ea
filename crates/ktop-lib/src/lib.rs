//! Core library for the ktop cluster monitor
//!
//! This crate provides the core functionality for:
//! - Quantity conversion and percentage bars
//! - Concurrent per-entity metric fan-out
//! - Shared aggregation and top-K ranking
//! - The timer-driven refresh loop and session wiring
//! - Observability hooks

pub mod bar;
pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod refresh;
pub mod session;
pub mod view;

pub use config::TopConfig;
pub use error::{ConfigError, RenderError, RetrievalError, TopError};
pub use models::*;
pub use observability::{FetchMetrics, StructuredLogger};
pub use session::{snapshot, Session, SessionBuilder, SessionSummary};
pub use view::{Frame, RenderSink, TableRow};
