//! Translation between the v2 wire schema and the neutral model, plus the
//! v2-facing gRPC service.

use std::sync::Arc;

use tonic::Status;

use crate::checker::Checker;
use crate::metrics::{CheckMetrics, CHECK_REQUEST_VERSION_2};
use crate::model;

use super::pb::envoy::service::auth::v2::{
    authorization_server::Authorization, check_response::HttpResponse, CheckRequest,
    CheckResponse, DeniedHttpResponse, HeaderValue, HeaderValueOption, HttpStatus, OkHttpResponse,
};
use super::{handle_check, WireVersion, RPC_CODE_OK, RPC_CODE_PERMISSION_DENIED};

/// Map an external v2 check request into the neutral model.
///
/// Total and side-effect free: unset submessages normalize to the model's
/// defaults. v2 has no raw request body, so `body` always comes from the
/// string field.
pub fn from_v2(check: CheckRequest) -> model::Request {
    let attributes = check.attributes.unwrap_or_default();
    let source = attributes.source.unwrap_or_default();
    let destination = attributes.destination.unwrap_or_default();
    let http = attributes
        .request
        .unwrap_or_default()
        .http
        .unwrap_or_default();

    model::Request {
        context: attributes.context_extensions,
        request_id: http.id,
        method: http.method,
        path: http.path,
        host: http.host,
        scheme: http.scheme,
        protocol: http.protocol,
        body: http.body,
        headers: http.headers.into(),
        source_principal: source.principal,
        source_address: source.address,
        destination_principal: destination.principal,
        destination_address: destination.address,
    }
}

/// Render a neutral response in the v2 wire shape.
///
/// Infallible by construction. `headers_to_remove` has no v2 wire
/// representation and is dropped here; v3 carries it.
pub fn as_v2(response: &model::Response) -> CheckResponse {
    let headers = wire_headers(&response.headers);

    if response.allow {
        CheckResponse {
            status: Some(super::pb::google::rpc::Status {
                code: RPC_CODE_OK,
                message: String::new(),
            }),
            http_response: Some(HttpResponse::OkResponse(OkHttpResponse { headers })),
        }
    } else {
        CheckResponse {
            status: Some(super::pb::google::rpc::Status {
                code: RPC_CODE_PERMISSION_DENIED,
                message: String::new(),
            }),
            http_response: Some(HttpResponse::DeniedResponse(DeniedHttpResponse {
                status: Some(HttpStatus {
                    code: u32::from(response.status_code),
                }),
                headers,
                body: response.body.clone(),
            })),
        }
    }
}

fn wire_headers(headers: &model::Headers) -> Vec<HeaderValueOption> {
    headers
        .iter()
        .map(|(key, value)| HeaderValueOption {
            header: Some(HeaderValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
        })
        .collect()
}

/// v2 wire generation marker for the shared check handler.
pub(crate) struct V2;

impl WireVersion for V2 {
    type CheckRequest = CheckRequest;
    type CheckResponse = CheckResponse;

    const VERSION_LABEL: &'static str = CHECK_REQUEST_VERSION_2;

    fn normalize(request: CheckRequest) -> model::Request {
        from_v2(request)
    }

    fn denormalize(response: &model::Response) -> CheckResponse {
        as_v2(response)
    }
}

/// Authorization service answering proxies pinned to the v2 schema.
pub struct AuthorizationV2 {
    checker: Arc<dyn Checker>,
    metrics: Arc<CheckMetrics>,
}

impl AuthorizationV2 {
    pub fn new(checker: Arc<dyn Checker>, metrics: Arc<CheckMetrics>) -> Self {
        Self { checker, metrics }
    }
}

#[tonic::async_trait]
impl Authorization for AuthorizationV2 {
    async fn check(
        &self,
        request: tonic::Request<CheckRequest>,
    ) -> Result<tonic::Response<CheckResponse>, Status> {
        let response =
            handle_check::<V2>(self.checker.as_ref(), &self.metrics, request.into_inner()).await?;
        Ok(tonic::Response::new(response))
    }
}
