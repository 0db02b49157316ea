//! Prometheus instrumentation for authorization checks.
//!
//! Instruments are injected rather than process-global so tests can register
//! them against a private `Registry` and assert on recorded samples.

use std::collections::HashMap;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

use crate::model::CerberusReason;

pub const REASON_LABEL: &str = "cerberus_reason";
pub const UPSTREAM_AUTH_LABEL: &str = "has_upstream_auth";
pub const CHECK_REQUEST_VERSION_LABEL: &str = "check_request_version";

/// Version label literal for calls handled through the v2 wire schema.
pub const CHECK_REQUEST_VERSION_2: &str = "v2";
/// Version label literal for calls handled through the v3 wire schema.
pub const CHECK_REQUEST_VERSION_3: &str = "v3";

/// Label set built freshly per request, never shared across calls.
pub type Labels = HashMap<&'static str, String>;

/// Add the decision-reason classification to a label set.
pub fn add_reason_label(mut labels: Labels, reason: &CerberusReason) -> Labels {
    labels.insert(REASON_LABEL, reason.as_str().to_string());
    labels
}

/// Add the upstream-auth indicator to a label set.
pub fn add_upstream_auth_label(mut labels: Labels, has_upstream_auth: bool) -> Labels {
    labels.insert(UPSTREAM_AUTH_LABEL, has_upstream_auth.to_string());
    labels
}

/// Counter plus latency histogram for check calls, keyed by reason,
/// upstream-auth indicator and wire version.
#[derive(Clone)]
pub struct CheckMetrics {
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
}

impl CheckMetrics {
    const LABEL_NAMES: [&'static str; 3] = [
        REASON_LABEL,
        UPSTREAM_AUTH_LABEL,
        CHECK_REQUEST_VERSION_LABEL,
    ];

    /// Create the instruments and register them with `registry`.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "cerberus_check_request_total",
                "Authorization check requests segmented by reason, upstream auth and wire version",
            ),
            &Self::LABEL_NAMES,
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "cerberus_check_request_duration_seconds",
                "Authorization check latency segmented by reason, upstream auth and wire version",
            ),
            &Self::LABEL_NAMES,
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
        })
    }

    /// Record one completed call: a single counter increment and a single
    /// latency observation under the same label set.
    pub fn record(&self, labels: &Labels, elapsed_seconds: f64) {
        let label_view: HashMap<&str, &str> =
            labels.iter().map(|(k, v)| (*k, v.as_str())).collect();

        self.requests_total.with(&label_view).inc();
        self.request_duration_seconds
            .with(&label_view)
            .observe(elapsed_seconds);
    }
}
