//! Pluggable decision contract.

use async_trait::async_trait;
use tonic::Status;

use crate::model::{Request, Response, REASON_HEADER};

/// The decision capability the adapter depends on.
///
/// Implementations must be safe to invoke concurrently from many in-flight
/// calls; the adapter performs no synchronization around them. A returned
/// `Status` is propagated verbatim as the RPC failure and is never treated
/// as a deny decision. Cancellation is drop-based: when the caller goes
/// away, tonic drops the call future, so `check` futures must be
/// cancel-safe.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, request: &Request) -> Result<Response, Status>;
}

/// Checker that allows every request with a fixed reason header.
///
/// Default wiring for the binary until a real decision engine is plugged
/// in; also convenient in tests.
#[derive(Debug, Clone)]
pub struct StaticChecker {
    reason: String,
}

impl StaticChecker {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Checker for StaticChecker {
    async fn check(&self, _request: &Request) -> Result<Response, Status> {
        let mut response = Response {
            allow: true,
            ..Response::default()
        };
        response.headers.set(REASON_HEADER, self.reason.clone());
        Ok(response)
    }
}
