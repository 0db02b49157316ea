//! Server registration and lifecycle.
//!
//! One process answers both wire generations of the check schema: both
//! authorization services are registered on a single tonic server next to
//! the standard health service.

use std::future::Future;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::Stream;
use tonic::transport::{server::Router, Server};
use tracing::{info, warn};

use crate::checker::Checker;
use crate::config::Config;
use crate::error::ServerError;
use crate::metrics::CheckMetrics;

use super::pb::envoy::service::auth::v2::authorization_server::AuthorizationServer as AuthorizationServerV2;
use super::pb::envoy::service::auth::v3::authorization_server::AuthorizationServer as AuthorizationServerV3;
use super::v2::AuthorizationV2;
use super::v3::AuthorizationV3;

/// Build both version-facing services around one shared checker and one
/// shared instrument set.
pub fn register(
    checker: Arc<dyn Checker>,
    metrics: Arc<CheckMetrics>,
) -> (
    AuthorizationServerV2<AuthorizationV2>,
    AuthorizationServerV3<AuthorizationV3>,
) {
    let v2 = AuthorizationV2::new(checker.clone(), metrics.clone());
    let v3 = AuthorizationV3::new(checker, metrics);

    (
        AuthorizationServerV2::new(v2),
        AuthorizationServerV3::new(v3),
    )
}

/// Run the server on `listener` until serving terminates on its own or
/// `shutdown` resolves.
///
/// Cancellation wins the race: when `shutdown` fires, the serve future is
/// dropped (halting accepts and in-flight work, no drain) and `Ok(())` is
/// returned even if a serve error arrives at the same moment. A serve error
/// while not cancelled propagates as-is.
pub async fn run_server(
    router: Router,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error> {
    run_with_incoming(router, TcpListenerStream::new(listener), shutdown).await
}

/// Serve over an arbitrary connection stream; lets tests drive the serve
/// loop to a failure the accept path of a healthy listener cannot produce.
pub(crate) async fn run_with_incoming(
    router: Router,
    incoming: impl Stream<Item = Result<TcpStream, std::io::Error>>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error> {
    let serve = router.serve_with_incoming(incoming);
    tokio::pin!(serve);
    tokio::pin!(shutdown);

    tokio::select! {
        biased;
        _ = &mut shutdown => {
            info!("shutdown signal received, stopping auth server");
            Ok(())
        }
        result = &mut serve => result,
    }
}

/// Full startup path for the adapter: credentials, registration, bind, run.
///
/// Credential failures surface before any socket is bound; the process never
/// starts serving with partial TLS material.
pub async fn serve(
    config: &Config,
    checker: Arc<dyn Checker>,
    metrics: Arc<CheckMetrics>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let mut builder = Server::builder();

    match config.tls.credential_paths()? {
        Some(paths) => {
            let credentials = paths.load()?;
            builder = builder.tls_config(credentials.build_server_tls())?;
            info!("TLS configured for auth server");
        }
        None => {
            warn!("serving without TLS, development use only");
        }
    }

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<AuthorizationServerV2<AuthorizationV2>>()
        .await;
    health_reporter
        .set_serving::<AuthorizationServerV3<AuthorizationV3>>()
        .await;

    let (v2, v3) = register(checker, metrics);
    let router = builder
        .add_service(health_service)
        .add_service(v2)
        .add_service(v3);

    let addr = config.server.parse_socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "auth adapter listening");

    run_server(router, listener, shutdown).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::pb::envoy::service::auth::{v2 as v2pb, v3 as v3pb};
    use super::super::v2::V2;
    use super::super::v3::V3;
    use super::super::{handle_check, RPC_CODE_OK};
    use super::*;
    use crate::checker::StaticChecker;
    use crate::metrics::{
        CHECK_REQUEST_VERSION_2, CHECK_REQUEST_VERSION_3, CHECK_REQUEST_VERSION_LABEL,
        REASON_LABEL, UPSTREAM_AUTH_LABEL,
    };
    use crate::model::{Request, Response, REASON_HEADER};
    use async_trait::async_trait;
    use prometheus::Registry;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tonic::Status;

    /// Returns a fixed response and records every request it sees.
    struct RecordingChecker {
        response: Response,
        seen: Mutex<Vec<Request>>,
    }

    impl RecordingChecker {
        fn allowing(reason: &str) -> Self {
            let mut response = Response {
                allow: true,
                ..Response::default()
            };
            response.headers.set(REASON_HEADER, reason);
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Checker for RecordingChecker {
        async fn check(&self, request: &Request) -> Result<Response, Status> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    struct FailingChecker;

    #[async_trait]
    impl Checker for FailingChecker {
        async fn check(&self, _request: &Request) -> Result<Response, Status> {
            Err(Status::unavailable("decision engine down"))
        }
    }

    fn test_metrics() -> (Registry, CheckMetrics) {
        let registry = Registry::new();
        let metrics = CheckMetrics::register(&registry).unwrap();
        (registry, metrics)
    }

    fn v3_check_request(upstream_auth: bool) -> v3pb::CheckRequest {
        v3pb::CheckRequest {
            attributes: Some(v3pb::AttributeContext {
                source: None,
                destination: None,
                request: Some(v3pb::attribute_context::Request {
                    http: Some(v3pb::attribute_context::HttpRequest {
                        method: "GET".to_string(),
                        path: "/ping".to_string(),
                        ..Default::default()
                    }),
                }),
                context_extensions: HashMap::from([(
                    "HasUpstreamAuth".to_string(),
                    upstream_auth.to_string(),
                )]),
            }),
        }
    }

    fn v2_check_request(upstream_auth: bool) -> v2pb::CheckRequest {
        v2pb::CheckRequest {
            attributes: Some(v2pb::AttributeContext {
                source: None,
                destination: None,
                request: Some(v2pb::attribute_context::Request {
                    http: Some(v2pb::attribute_context::HttpRequest {
                        method: "GET".to_string(),
                        path: "/ping".to_string(),
                        ..Default::default()
                    }),
                }),
                context_extensions: HashMap::from([(
                    "HasUpstreamAuth".to_string(),
                    upstream_auth.to_string(),
                )]),
            }),
        }
    }

    fn counter_samples(registry: &Registry) -> Vec<(HashMap<String, String>, f64)> {
        registry
            .gather()
            .iter()
            .filter(|f| f.get_name() == "cerberus_check_request_total")
            .flat_map(|f| f.get_metric().iter().cloned().collect::<Vec<_>>())
            .map(|m| {
                let labels = m
                    .get_label()
                    .iter()
                    .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
                    .collect();
                (labels, m.get_counter().get_value())
            })
            .collect()
    }

    #[tokio::test]
    async fn successful_call_records_one_increment_and_observation() {
        let (registry, metrics) = test_metrics();
        let checker = RecordingChecker::allowing("rate_limited");
        let started = Instant::now();

        let response = handle_check::<V3>(&checker, &metrics, v3_check_request(true))
            .await
            .unwrap();
        let wall_clock = started.elapsed().as_secs_f64();

        assert_eq!(response.status.unwrap().code, RPC_CODE_OK);

        let samples = counter_samples(&registry);
        assert_eq!(samples.len(), 1);
        let (labels, value) = &samples[0];
        assert_eq!(*value, 1.0);
        assert_eq!(labels[REASON_LABEL], "rate_limited");
        assert_eq!(labels[UPSTREAM_AUTH_LABEL], "true");
        assert_eq!(labels[CHECK_REQUEST_VERSION_LABEL], "v3");

        let histogram = registry
            .gather()
            .into_iter()
            .find(|f| f.get_name() == "cerberus_check_request_duration_seconds")
            .unwrap();
        let h = histogram.get_metric()[0].get_histogram().clone();
        assert_eq!(h.get_sample_count(), 1);
        assert!(h.get_sample_sum() >= 0.0);
        assert!(h.get_sample_sum() <= wall_clock);
    }

    #[tokio::test]
    async fn checker_failure_suppresses_metrics_and_propagates_status() {
        let (registry, metrics) = test_metrics();

        let err = handle_check::<V2>(&FailingChecker, &metrics, v2_check_request(false))
            .await
            .unwrap_err();

        assert_eq!(err.code(), tonic::Code::Unavailable);
        assert_eq!(err.message(), "decision engine down");
        assert!(registry
            .gather()
            .iter()
            .all(|f| f.get_metric().is_empty()));
    }

    #[tokio::test]
    async fn equivalent_requests_reach_checker_identically_across_versions() {
        let (registry, metrics) = test_metrics();
        let checker = RecordingChecker::allowing("ok");

        let v2_response = handle_check::<V2>(&checker, &metrics, v2_check_request(false))
            .await
            .unwrap();
        let v3_response = handle_check::<V3>(&checker, &metrics, v3_check_request(false))
            .await
            .unwrap();

        let seen = checker.seen.lock().unwrap();
        assert_eq!(seen[0], seen[1]);

        // Same decision, differing only in wire shape and version label.
        assert_eq!(
            v2_response.status.unwrap().code,
            v3_response.status.unwrap().code
        );
        let samples = counter_samples(&registry);
        let versions: Vec<_> = samples
            .iter()
            .map(|(labels, _)| labels[CHECK_REQUEST_VERSION_LABEL].clone())
            .collect();
        assert!(versions.contains(&CHECK_REQUEST_VERSION_2.to_string()));
        assert!(versions.contains(&CHECK_REQUEST_VERSION_3.to_string()));
    }

    #[tokio::test]
    async fn cancellation_wins_over_serve() {
        let (_registry, metrics) = test_metrics();
        let checker: Arc<dyn Checker> = Arc::new(StaticChecker::new("ok"));
        let (v2, v3) = register(checker, Arc::new(metrics));
        let router = Server::builder().add_service(v2).add_service(v3);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        // Shutdown is already resolved when the race starts.
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_server(router, listener, std::future::ready(())),
        )
        .await
        .expect("run_server should return promptly");

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn serve_error_propagates_when_not_cancelled() {
        let (_registry, metrics) = test_metrics();
        let checker: Arc<dyn Checker> = Arc::new(StaticChecker::new("ok"));
        let (v2, v3) = register(checker, Arc::new(metrics));
        let router = Server::builder().add_service(v2).add_service(v3);

        // The connection stream fails immediately; shutdown never fires.
        let incoming = tokio_stream::once(Err::<tokio::net::TcpStream, std::io::Error>(
            std::io::Error::new(std::io::ErrorKind::Other, "accept failed"),
        ));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_with_incoming(router, incoming, std::future::pending::<()>()),
        )
        .await
        .expect("serve failure should surface promptly");

        let err = result.expect_err("serve error must propagate when not cancelled");

        // The failing accept must still be visible in the error chain.
        let mut source = std::error::Error::source(&err);
        let mut found = false;
        while let Some(cause) = source {
            if cause.to_string().contains("accept failed") {
                found = true;
                break;
            }
            source = cause.source();
        }
        assert!(found, "underlying accept failure should be preserved: {err}");
    }
}
