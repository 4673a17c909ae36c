//! Router construction and server host for the agent API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::Request,
    middleware,
    routing::{get, post},
};
use configflow_core::ConfigUpdater;
use configflow_telemetry::build_sha;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::auth::require_bearer_token;
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::handlers::{config_update, health};
use crate::state::ApiState;

/// Axum router wrapper hosting the agent endpoints.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router; `token` guards the update route and `updater` receives
    /// accepted requests.
    #[must_use]
    pub fn new(token: String, updater: Arc<dyn ConfigUpdater>) -> Self {
        let state = Arc::new(ApiState::new(token, updater));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );

        let router = Self::public_routes()
            .merge(Self::controller_routes(&state))
            .route_layer(trace_layer)
            .with_state(state);
        Self { router }
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new().route("/health", get(health))
    }

    fn controller_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_token = middleware::from_fn_with_state(state.clone(), require_bearer_token);
        Router::new().route(
            "/api/config/update",
            post(config_update).route_layer(require_token),
        )
    }

    /// Serve the API on `addr` until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        info!(%addr, "starting agent API");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{StatusCode, header::AUTHORIZATION, header::CONTENT_TYPE};
    use configflow_core::UpdateRequest;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    type TestResult<T> = anyhow::Result<T>;

    #[derive(Default)]
    struct Counter {
        submitted: AtomicUsize,
    }

    impl ConfigUpdater for Counter {
        fn submit(&self, _request: UpdateRequest) {
            self.submitted.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn server() -> (ApiServer, Arc<Counter>) {
        let counter = Arc::new(Counter::default());
        (ApiServer::new("secret".to_string(), counter.clone()), counter)
    }

    fn update(token: Option<&str>, body: &'static str) -> TestResult<Request<Body>> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/config/update")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(builder.body(Body::from(body))?)
    }

    async fn json_body(response: axum::response::Response) -> TestResult<Value> {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn health_is_public() -> TestResult<()> {
        let (server, _) = server();
        let response = server
            .router()
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await?["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn update_requires_matching_bearer_token() -> TestResult<()> {
        let (server, counter) = server();
        let body = r#"{"config":"port: 7890"}"#;

        let missing = server.router().clone().oneshot(update(None, body)?).await?;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        let wrong = server
            .router()
            .clone()
            .oneshot(update(Some("nope"), body)?)
            .await?;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(wrong).await?["success"], "false");
        assert_eq!(counter.submitted.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn update_acknowledges_and_submits() -> TestResult<()> {
        let (server, counter) = server();
        let response = server
            .router()
            .clone()
            .oneshot(update(Some("secret"), r#"{"config":"port: 7890"}"#)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["success"], "true");
        assert_eq!(body["message"], "Config update task started");
        assert_eq!(counter.submitted.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() -> TestResult<()> {
        let (server, counter) = server();
        let response = server
            .router()
            .clone()
            .oneshot(update(Some("secret"), "{not json")?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await?;
        assert_eq!(body["message"], "Invalid request body");
        assert_eq!(counter.submitted.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn serve_reports_bind_failure() -> TestResult<()> {
        let occupied = TcpListener::bind("127.0.0.1:0").await?;
        let addr = occupied.local_addr()?;
        let (server, _) = server();
        assert!(matches!(
            server.serve(addr).await,
            Err(ApiServerError::Bind { .. })
        ));
        Ok(())
    }
}
