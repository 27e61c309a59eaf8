//! Configuration management with serde serialization/deserialization
//!
//! This module holds the service configuration: where the HTTP server listens,
//! how captures are bounded, and how the headless Chrome pool is launched.

use crate::ScreenshotError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for inbound request bodies (16 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Main configuration structure for the capture service
///
/// Every field has a default, so a JSON config file only needs to name the
/// settings it changes.
///
/// # Examples
///
/// ```rust
/// use tweet_capture_api::Config;
///
/// let config = Config {
///     port: 9000,
///     browser_pool_size: 2,
///     ..Default::default()
/// };
/// assert_eq!(config.bind_addr(), "0.0.0.0:9000");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Interface to bind the HTTP listener to (default: all interfaces)
    pub bind_address: String,

    /// Listening port (default: 8080, overridden by `PORT`)
    pub port: u16,

    /// Maximum accepted request body size in bytes (default: 16 MiB)
    pub max_body_bytes: usize,

    /// Directory that receives the per-request capture files (default: system temp dir)
    pub temp_dir: PathBuf,

    /// Upper bound for a single capture, browser work included (default: 60 seconds)
    ///
    /// When exceeded the capture is cancelled and the request fails.
    pub capture_timeout: Duration,

    /// Maximum number of captures running at once (default: 8)
    ///
    /// Requests beyond this limit wait for a permit rather than failing.
    pub max_concurrent_captures: usize,

    /// Number of Chrome instances kept in the pool (default: CPU count, at most 4)
    pub browser_pool_size: usize,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    ///
    /// Container images usually ship Chromium at a fixed location such as
    /// `/usr/bin/chromium`; set it here instead of relying on detection.
    pub chrome_path: Option<String>,

    /// Browser viewport used when rendering posts
    pub viewport: Viewport,

    /// Include a debug rendering of the failure in 500 responses (default: false)
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            temp_dir: std::env::temp_dir(),
            capture_timeout: Duration::from_secs(60),
            max_concurrent_captures: 8,
            browser_pool_size: num_cpus::get().clamp(1, 4),
            chrome_path: None,
            viewport: Viewport::default(),
            debug: false,
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Browser viewport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Reject configurations the service cannot run with
pub fn validate_config(config: &Config) -> Result<(), ScreenshotError> {
    if config.browser_pool_size == 0 {
        return Err(ScreenshotError::ConfigurationError(
            "Browser pool size must be greater than 0".into(),
        ));
    }

    if config.max_concurrent_captures == 0 {
        return Err(ScreenshotError::ConfigurationError(
            "Max concurrent captures must be greater than 0".into(),
        ));
    }

    if config.capture_timeout.is_zero() {
        return Err(ScreenshotError::ConfigurationError(
            "Capture timeout must be greater than 0".into(),
        ));
    }

    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err(ScreenshotError::ConfigurationError(
            "Viewport dimensions must be greater than 0".into(),
        ));
    }

    if config.max_body_bytes == 0 {
        return Err(ScreenshotError::ConfigurationError(
            "Max body size must be greater than 0".into(),
        ));
    }

    Ok(())
}

/// Generate Chrome command-line arguments for sandboxless container execution
///
/// Each pool instance gets its own user-data and temp directory so several
/// Chrome processes can run side by side.
///
/// # Examples
///
/// ```rust
/// use tweet_capture_api::{Config, get_chrome_args};
///
/// let args = get_chrome_args(&Config::default(), 0);
/// assert!(args.contains(&"--no-sandbox".to_string()));
/// ```
pub fn get_chrome_args(config: &Config, instance_id: usize) -> Vec<String> {
    let unique_id = format!("{}-{}", std::process::id(), instance_id);

    vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!("--user-data-dir=/tmp/chromium-capture-{unique_id}"),
        format!("--temp-dir=/tmp/chromium-temp-{unique_id}"),
    ]
}

pub fn create_browser_config(
    config: &Config,
    instance_id: usize,
) -> Result<chromiumoxide::browser::BrowserConfig, ScreenshotError> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(get_chrome_args(config, instance_id));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(ScreenshotError::BrowserLaunchFailed)
}
