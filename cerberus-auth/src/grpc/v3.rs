//! Translation between the v3 wire schema and the neutral model, plus the
//! v3-facing gRPC service.
//!
//! Kept deliberately separate from the v2 translator: the two external
//! schemas evolve independently upstream.

use std::sync::Arc;

use tonic::Status;

use crate::checker::Checker;
use crate::metrics::{CheckMetrics, CHECK_REQUEST_VERSION_3};
use crate::model;

use super::pb::envoy::service::auth::v3::{
    authorization_server::Authorization, check_response::HttpResponse, CheckRequest,
    CheckResponse, DeniedHttpResponse, HeaderValue, HeaderValueOption, HttpStatus, OkHttpResponse,
};
use super::{handle_check, WireVersion, RPC_CODE_OK, RPC_CODE_PERMISSION_DENIED};

/// Map an external v3 check request into the neutral model.
///
/// Total and side-effect free: unset submessages normalize to the model's
/// defaults. When the proxy buffered the raw body, `raw_body` takes
/// precedence over the string `body` field (lossy UTF-8 conversion).
pub fn from_v3(check: CheckRequest) -> model::Request {
    let attributes = check.attributes.unwrap_or_default();
    let source = attributes.source.unwrap_or_default();
    let destination = attributes.destination.unwrap_or_default();
    let http = attributes
        .request
        .unwrap_or_default()
        .http
        .unwrap_or_default();

    let body = if http.raw_body.is_empty() {
        http.body
    } else {
        String::from_utf8_lossy(&http.raw_body).into_owned()
    };

    model::Request {
        context: attributes.context_extensions,
        request_id: http.id,
        method: http.method,
        path: http.path,
        host: http.host,
        scheme: http.scheme,
        protocol: http.protocol,
        body,
        headers: http.headers.into(),
        source_principal: source.principal,
        source_address: source.address,
        destination_principal: destination.principal,
        destination_address: destination.address,
    }
}

/// Render a neutral response in the v3 wire shape.
///
/// Infallible by construction. Unlike v2, `headers_to_remove` is carried
/// through on allowed responses.
pub fn as_v3(response: &model::Response) -> CheckResponse {
    let headers = wire_headers(&response.headers);

    if response.allow {
        CheckResponse {
            status: Some(super::pb::google::rpc::Status {
                code: RPC_CODE_OK,
                message: String::new(),
            }),
            http_response: Some(HttpResponse::OkResponse(OkHttpResponse {
                headers,
                headers_to_remove: response.headers_to_remove.clone(),
            })),
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

/// v3 wire generation marker for the shared check handler.
pub(crate) struct V3;

impl WireVersion for V3 {
    type CheckRequest = CheckRequest;
    type CheckResponse = CheckResponse;

    const VERSION_LABEL: &'static str = CHECK_REQUEST_VERSION_3;

    fn normalize(request: CheckRequest) -> model::Request {
        from_v3(request)
    }

    fn denormalize(response: &model::Response) -> CheckResponse {
        as_v3(response)
    }
}

/// Authorization service answering proxies pinned to the v3 schema.
pub struct AuthorizationV3 {
    checker: Arc<dyn Checker>,
    metrics: Arc<CheckMetrics>,
}

impl AuthorizationV3 {
    pub fn new(checker: Arc<dyn Checker>, metrics: Arc<CheckMetrics>) -> Self {
        Self { checker, metrics }
    }
}

#[tonic::async_trait]
impl Authorization for AuthorizationV3 {
    async fn check(
        &self,
        request: tonic::Request<CheckRequest>,
    ) -> Result<tonic::Response<CheckResponse>, Status> {
        let response =
            handle_check::<V3>(self.checker.as_ref(), &self.metrics, request.into_inner()).await?;
        Ok(tonic::Response::new(response))
    }
}
