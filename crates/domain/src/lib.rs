//! `sr-domain` — types shared by every SearchRelay crate.
//!
//! Nothing in here does I/O.  The request/response model, the terminal
//! error taxonomy of a search stream, the telemetry vocabulary and the
//! configuration structs all live here so that the coordinator, the HTTP
//! backend and the CLI agree on one set of definitions.

pub mod config;
pub mod error;
pub mod search;
pub mod stream;
pub mod telemetry;

pub use error::{Error, Result};
pub use search::{
    AbortReason, Attempt, BackendError, SearchError, SearchHandle, SearchRequest, SearchResponse,
};
pub use telemetry::{NoopTelemetry, TelemetryEvent, TelemetrySink, TracingTelemetry};
