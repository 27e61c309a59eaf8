use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::AcquireError;

#[derive(Debug, Clone, Error)]
pub enum ScreenshotError {
    #[error("Browser instance unavailable")]
    BrowserUnavailable,

    #[error("URL loading failed: {0}")]
    UrlLoadFailed(String),

    #[error("Screenshot capture failed: {0}")]
    CaptureFailed(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Semaphore acquire error: {0}")]
    SemaphoreError(String),
}

impl ScreenshotError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ScreenshotError::BrowserUnavailable
            | ScreenshotError::BrowserLaunchFailed(_)
            | ScreenshotError::SemaphoreError(_) => "browser",
            ScreenshotError::UrlLoadFailed(_) | ScreenshotError::PageError(_) => "page",
            ScreenshotError::Timeout(_) => "timeout",
            ScreenshotError::InvalidUrl(_) | ScreenshotError::InvalidOption(_) => "parameter",
            ScreenshotError::ElementNotFound(_) => "element",
            ScreenshotError::CaptureFailed(_) | ScreenshotError::ImageError(_) => "capture",
            ScreenshotError::IoError(_) => "io",
            ScreenshotError::ConfigurationError(_) => "config",
        }
    }
}

impl From<AcquireError> for ScreenshotError {
    fn from(err: AcquireError) -> Self {
        ScreenshotError::SemaphoreError(err.to_string())
    }
}

impl From<std::io::Error> for ScreenshotError {
    fn from(err: std::io::Error) -> Self {
        ScreenshotError::IoError(err.to_string())
    }
}

impl From<image::ImageError> for ScreenshotError {
    fn from(err: image::ImageError) -> Self {
        ScreenshotError::ImageError(err.to_string())
    }
}

impl From<serde_json::Error> for ScreenshotError {
    fn from(err: serde_json::Error) -> Self {
        ScreenshotError::InvalidOption(err.to_string())
    }
}

/// Errors surfaced to HTTP callers, always rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Endpoint not found")]
    NotFound,

    #[error("Internal server error")]
    Internal,

    #[error("{source}")]
    Capture {
        source: ScreenshotError,
        /// Debug rendering of the failure, only populated in debug mode
        traceback: Option<String>,
    },
}

impl ApiError {
    pub fn capture(source: ScreenshotError, debug: bool) -> Self {
        let traceback = debug.then(|| format!("{source:?}"));
        ApiError::Capture { source, traceback }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal | ApiError::Capture { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Capture { source, traceback } => ErrorBody {
                error: source.to_string(),
                traceback,
            },
            other => ErrorBody {
                error: other.to_string(),
                traceback: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
