//! Per-connection telemetry ingestion over TCP.
//!
//! One accepted connection, one [`IngestSession`]: the session drives the
//! receive loop, authenticates and decodes each frame through
//! `telwire-codec`, and forwards decoded readings to a [`ReadingSink`].
//! Tampered frames are dropped and counted; structural violations and
//! transport failures end the session.

pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod sink;

pub use config::{IngestConfig, DEFAULT_READ_TIMEOUT};
pub use error::{IngestError, Result, SinkError};
pub use server::IngestServer;
pub use session::{CloseReason, IngestSession, SessionSummary};
pub use sink::{record, HttpSink, JsonLinesSink, ReadingSink};
