//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use folio_config::ServiceConfig;
use folio_jobs::JobRunner;
use folio_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, warn};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::batch::{batch_ocr_translate, batch_redact, batch_scrub_metadata};
use crate::http::constants::{HEADER_REQUEST_ID, HEADER_SKIPPED_ITEMS};
use crate::http::documents::{fill_form, merge, ocr_translate, redact, scrub_metadata, split};
use crate::http::download::download_temp_file;
use crate::http::health::{health, metrics, root};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper that hosts the document API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Wire the runner, metrics registry and HTTP settings into a router.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::InvalidOrigin`] when a configured CORS origin is
    /// not a valid header value.
    pub fn new(runner: JobRunner, telemetry: Metrics, config: &ServiceConfig) -> ApiServerResult<Self> {
        let state = Arc::new(ApiState::new(
            runner,
            telemetry.clone(),
            config.download_retention,
        ));
        let cors_layer = CorsLayer::new()
            .allow_origin(allowed_origins(&config.allowed_origins)?)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_REQUEST_ID)])
            .expose_headers([
                CONTENT_DISPOSITION,
                HeaderName::from_static(HEADER_REQUEST_ID),
                HeaderName::from_static(HEADER_SKIPPED_ITEMS),
            ]);
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
        let layered = ServiceBuilder::new()
            .layer(folio_telemetry::request_id_layers())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::build_router()
            .layer(DefaultBodyLimit::max(config.max_upload_bytes))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Ok(Self { router })
    }

    fn build_router() -> Router<Arc<ApiState>> {
        Self::public_routes()
            .merge(Self::document_routes())
            .merge(Self::batch_routes())
            .merge(crate::http::convert::routes())
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/", get(root))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route(
                "/download_temp_file/{area_id}/{filename}",
                get(download_temp_file),
            )
    }

    fn document_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/merge", post(merge))
            .route("/split", post(split))
            .route("/redact", post(redact))
            .route("/scrub_metadata", post(scrub_metadata))
            .route("/fill_form", post(fill_form))
            .route("/ocr_translate", post(ocr_translate))
    }

    fn batch_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/batch_redact", post(batch_redact))
            .route("/batch_ocr_translate", post(batch_ocr_translate))
            .route("/batch_scrub_metadata", post(batch_scrub_metadata))
    }

    /// Serve the API on `addr` until the process receives Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(addr = %addr, "API listening");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) fn router(&self) -> Router {
        self.router.clone()
    }
}

fn allowed_origins(origins: &[String]) -> ApiServerResult<AllowOrigin> {
    if origins.is_empty() {
        return Ok(AllowOrigin::from(Any));
    }
    let values = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|source| ApiServerError::InvalidOrigin {
                origin: origin.clone(),
                source,
            })
        })
        .collect::<ApiServerResult<Vec<_>>>()?;
    Ok(AllowOrigin::list(values))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "shutdown signal listener failed; serving until terminated");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received; draining connections");
}
