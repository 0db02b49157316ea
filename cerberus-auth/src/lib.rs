//! Protocol-version-agnostic adapter in front of a pluggable authorization
//! decision engine, exposed over the Envoy external authorization gRPC
//! interface.
//!
//! The adapter answers both the v2 and v3 generations of the check schema on
//! one server: each inbound request is normalized into a neutral
//! [`model::Request`], handed to the configured [`Checker`], and the decision
//! is translated back into the caller's wire shape, with per-request
//! Prometheus metrics recorded along the way.

pub mod checker;
pub mod config;
pub mod error;
pub mod grpc;
pub mod metrics;
pub mod model;

pub use checker::{Checker, StaticChecker};
pub use config::Config;
pub use error::ServerError;
pub use metrics::CheckMetrics;
pub use model::{CerberusReason, Request, Response};
