//! gRPC surface: generated wire types, the per-version services and the
//! shared check-handling procedure.

use std::time::Instant;

use tonic::Status;

use crate::checker::Checker;
use crate::metrics::{self, CheckMetrics, Labels, CHECK_REQUEST_VERSION_LABEL};
use crate::model::{self, CerberusReason};

pub mod server;
pub mod v2;
pub mod v3;

// Generated proto code for the two wire generations of the check schema.
pub mod pb {
    pub mod google {
        pub mod rpc {
            tonic::include_proto!("google.rpc");
        }
    }
    pub mod envoy {
        pub mod service {
            pub mod auth {
                pub mod v2 {
                    tonic::include_proto!("envoy.service.auth.v2");
                }
                pub mod v3 {
                    tonic::include_proto!("envoy.service.auth.v3");
                }
            }
        }
    }
}

/// google.rpc.Code for an allowed request.
pub(crate) const RPC_CODE_OK: i32 = 0;
/// google.rpc.Code for a denied request.
pub(crate) const RPC_CODE_PERMISSION_DENIED: i32 = 7;

/// One wire generation of the check schema: the external message types, the
/// metrics version tag and the translations to and from the neutral model.
///
/// The two implementations stay independent, non-generic translators so the
/// externally owned schemas can evolve without forcing synchronized changes.
pub(crate) trait WireVersion {
    type CheckRequest: Send + 'static;
    type CheckResponse: Send + 'static;

    const VERSION_LABEL: &'static str;

    /// Total, side-effect-free mapping from the external request shape into
    /// the neutral model. Fields absent in this wire generation map to the
    /// model's defaults, never to an error.
    fn normalize(request: Self::CheckRequest) -> model::Request;

    /// Structural inverse for the response direction. Infallible for any
    /// response the checker is permitted to produce.
    fn denormalize(response: &model::Response) -> Self::CheckResponse;
}

/// Handle one check call: normalize in, decide, normalize out, record
/// metrics. Instantiated once per wire generation by the two service impls.
///
/// A checker error aborts the call with that exact status; no response is
/// synthesized and no metrics are recorded for the failed call.
pub(crate) async fn handle_check<V: WireVersion>(
    checker: &dyn Checker,
    check_metrics: &CheckMetrics,
    external: V::CheckRequest,
) -> Result<V::CheckResponse, Status> {
    let start = Instant::now();

    let request = V::normalize(external);
    let response = checker.check(&request).await?;
    let external_response = V::denormalize(&response);

    let reason = CerberusReason::from_response(&response);
    let labels = metrics::add_reason_label(Labels::new(), &reason);
    let mut labels = metrics::add_upstream_auth_label(labels, request.has_upstream_auth());
    labels.insert(CHECK_REQUEST_VERSION_LABEL, V::VERSION_LABEL.to_string());
    check_metrics.record(&labels, start.elapsed().as_secs_f64());

    Ok(external_response)
}
