//! HTTP surface of the capture service
//!
//! Routes:
//!
//! | method | path          | handler                                  |
//! |--------|---------------|------------------------------------------|
//! | GET    | `/`           | liveness probe                           |
//! | POST   | `/screenshot` | full option set, file or base64 response |
//! | GET    | `/screenshot` | `url`, `mode`, `night_mode` only, file   |
//! | GET    | `/metrics`    | Prometheus text, when a recorder is set  |
//!
//! Every request owns one temp capture file, which is gone before the
//! response is returned regardless of outcome.

use crate::{
    download_filename, remove_file_quietly, ApiError, CaptureEngine, CaptureOptions,
    CaptureRequest, Config, Metrics, ResponseFormat, ScreenshotError, TempCapture,
};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Local, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared state handed to every handler
pub struct AppState {
    pub engine: Arc<dyn CaptureEngine>,
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
    /// Bounds the number of captures running at once
    pub limiter: Arc<Semaphore>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(engine: Arc<dyn CaptureEngine>, config: Config) -> Self {
        Self {
            engine,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_captures)),
            config: Arc::new(config),
            metrics: Arc::new(Metrics::new()),
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct Base64Response {
    success: bool,
    image: String,
    format: &'static str,
}

pub fn router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/", get(health))
        .route("/screenshot", get(screenshot_get).post(screenshot_post))
        .route("/metrics", get(prometheus_metrics))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` resolves
pub async fn serve<F>(config: &Config, app: Router, shutdown: F) -> Result<(), ScreenshotError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "TweetCapture API is running",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => ApiError::NotFound.into_response(),
    }
}

fn handle_panic(_panic: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked");
    ApiError::Internal.into_response()
}

/// True when the body is absent or carries nothing usable as parameters
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        _ => true,
    }
}

/// Missing, null, empty or otherwise falsy `url` values
fn url_missing(value: &Value) -> bool {
    match value.get("url") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(url)) => url.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(true)) => false,
    }
}

async fn screenshot_post(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let no_json = || ApiError::BadRequest("No JSON data provided".to_string());

    let value: Value = serde_json::from_slice(&body).map_err(|_| no_json())?;
    if is_empty_payload(&value) {
        state.metrics.record_validation_error();
        return Err(no_json());
    }
    if url_missing(&value) {
        state.metrics.record_validation_error();
        return Err(ApiError::BadRequest("URL is required".to_string()));
    }

    let request: CaptureRequest = serde_json::from_value(value)
        .map_err(|e| capture_error(&state, ScreenshotError::from(e)))?;
    let url = request.target_url().unwrap_or_default().to_string();
    debug!("POST /screenshot for {}: {:?}", url, request);

    let image = run_capture(&state, &request, &url)
        .await
        .map_err(|e| capture_error(&state, e))?;

    Ok(match request.response_format() {
        ResponseFormat::Base64 => Json(Base64Response {
            success: true,
            image: STANDARD.encode(&image),
            format: "png",
        })
        .into_response(),
        ResponseFormat::File => png_attachment(image),
    })
}

async fn screenshot_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let has_url = params.get("url").is_some_and(|url| !url.is_empty());
    if !has_url {
        state.metrics.record_validation_error();
        return Err(ApiError::BadRequest("URL parameter is required".to_string()));
    }

    let request = CaptureRequest::from_query(&params).map_err(|e| capture_error(&state, e))?;
    let url = request.target_url().unwrap_or_default().to_string();
    debug!("GET /screenshot for {}: {:?}", url, request);

    let image = run_capture(&state, &request, &url)
        .await
        .map_err(|e| capture_error(&state, e))?;

    Ok(png_attachment(image))
}

fn capture_error(state: &AppState, err: ScreenshotError) -> ApiError {
    error!("Capture failed ({}): {}", err.kind(), err);
    ApiError::capture(err, state.config.debug)
}

fn png_attachment(image: Vec<u8>) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_filename(&Local::now())
    );

    (
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        image,
    )
        .into_response()
}

/// Decrements the in-flight gauge even if the request future is dropped
struct InFlight<'a>(&'a Metrics);

impl<'a> InFlight<'a> {
    fn start(metrics: &'a Metrics) -> Self {
        metrics.capture_started();
        Self(metrics)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.capture_finished();
    }
}

/// Capture `url` into a fresh temp file and return the image bytes
///
/// The temp file is removed when this returns, on success and failure alike.
async fn run_capture(
    state: &AppState,
    request: &CaptureRequest,
    url: &str,
) -> Result<Vec<u8>, ScreenshotError> {
    let options = CaptureOptions::from_request(request)?;

    let _permit = state.limiter.acquire().await?;
    let _in_flight = InFlight::start(&state.metrics);
    let temp = TempCapture::new(&state.config.temp_dir);
    let start_time = Instant::now();

    let timeout = state.config.capture_timeout;
    let result = match tokio::time::timeout(
        timeout,
        state.engine.capture(url, &options, temp.path()),
    )
    .await
    {
        Ok(Ok(written)) => {
            let read = tokio::fs::read(&written).await;
            if written != temp.path() {
                remove_file_quietly(&written).await;
            }
            read.map_err(ScreenshotError::from)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!("Capture of {} timed out after {:?}", url, timeout);
            state.metrics.record_timeout();
            Err(ScreenshotError::Timeout(timeout))
        }
    };

    state
        .metrics
        .record_capture(start_time.elapsed(), result.is_ok());
    temp.remove().await;

    result
}
