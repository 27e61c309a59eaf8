//! Capture engines that turn a post URL into a PNG on disk
//!
//! The HTTP layer only depends on [`CaptureEngine`]; [`ChromeCapture`] is the
//! production implementation backed by the shared [`BrowserPool`].

use crate::tweet_page::{parse_region, region_script, stylesheet_script};
use crate::{
    round_corners, validate_url, BrowserHandle, BrowserPool, CaptureOptions, Config,
    ScreenshotError,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport as ClipRegion};
use chromiumoxide::page::{Page, ScreenshotParams};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info};

/// Renders a post and writes the image to `output_path`
///
/// Returns the path of the written PNG, normally `output_path` itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptureEngine: Send + Sync {
    async fn capture(
        &self,
        url: &str,
        options: &CaptureOptions,
        output_path: &Path,
    ) -> Result<PathBuf, ScreenshotError>;
}

/// Closes the page when dropped, including when the capture future is cancelled
struct PageGuard(Page);

impl Drop for PageGuard {
    fn drop(&mut self) {
        let page = self.0.clone();
        tokio::spawn(async move {
            let _ = page.close().await;
        });
    }
}

/// Headless Chrome capture engine
pub struct ChromeCapture {
    pub browser_pool: BrowserPool,
    config: Config,
}

impl ChromeCapture {
    pub async fn new(config: Config) -> Result<Self, ScreenshotError> {
        let browser_pool = BrowserPool::new(config.clone()).await?;
        Ok(Self {
            browser_pool,
            config,
        })
    }

    pub async fn shutdown(&self) {
        let stats = self.browser_pool.get_stats().await;
        info!(
            "Browser pool served {} captures across {} instances ({} idle, {} failed)",
            stats.total_captures,
            stats.total_instances,
            stats.available_instances,
            stats.failed_instances
        );
        self.browser_pool.shutdown().await;
    }

    async fn open_page(&self, handle: &BrowserHandle) -> Result<PageGuard, ScreenshotError> {
        let browser = handle.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScreenshotError::PageError(e.to_string()))?;
        Ok(PageGuard(page))
    }

    async fn prepare_page(
        &self,
        page: &Page,
        url: &str,
        options: &CaptureOptions,
    ) -> Result<(), ScreenshotError> {
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(self.config.viewport.width)
            .height(self.config.viewport.height)
            .device_scale_factor(options.scale)
            .mobile(false)
            .build()
            .map_err(ScreenshotError::PageError)?;
        page.execute(metrics)
            .await
            .map_err(|e| ScreenshotError::PageError(e.to_string()))?;

        let cookie = CookieParam::builder()
            .name("night_mode")
            .value(options.night_mode.cookie_value())
            .url(url)
            .build()
            .map_err(ScreenshotError::PageError)?;
        page.set_cookie(cookie)
            .await
            .map_err(|e| ScreenshotError::PageError(e.to_string()))?;

        if let Some(lang) = &options.lang {
            let headers = Headers::new(serde_json::json!({ "Accept-Language": lang }));
            page.execute(SetExtraHttpHeadersParams::new(headers))
                .await
                .map_err(|e| ScreenshotError::PageError(e.to_string()))?;
        }

        Ok(())
    }

    async fn render(
        &self,
        page: &Page,
        url: &str,
        options: &CaptureOptions,
    ) -> Result<Vec<u8>, ScreenshotError> {
        self.prepare_page(page, url, options).await?;

        page.goto(url)
            .await
            .map_err(|e| ScreenshotError::UrlLoadFailed(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScreenshotError::UrlLoadFailed(e.to_string()))?;

        // Let client-side rendering settle
        sleep(options.wait_time).await;

        page.evaluate(stylesheet_script(options)?)
            .await
            .map_err(|e| ScreenshotError::PageError(e.to_string()))?;

        let result = page
            .evaluate(region_script(options.parent_tweets, options.mentions))
            .await
            .map_err(|e| ScreenshotError::PageError(e.to_string()))?;
        let region = parse_region(result.value(), url)?;
        debug!("Capture region for {}: {:?}", url, region);

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(ClipRegion {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                scale: 1.0,
            })
            .capture_beyond_viewport(true)
            .build();

        page.screenshot(params)
            .await
            .map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))
    }
}

#[async_trait]
impl CaptureEngine for ChromeCapture {
    async fn capture(
        &self,
        url: &str,
        options: &CaptureOptions,
        output_path: &Path,
    ) -> Result<PathBuf, ScreenshotError> {
        let start_time = Instant::now();
        validate_url(url)?;

        let handle = self.browser_pool.get_browser().await?;
        let page = self.open_page(&handle).await?;
        debug!("Rendering {} on browser instance {}", url, handle.instance_id);

        let png = self.render(&page.0, url, options).await?;

        let radius = (options.radius as f64 * options.scale).round() as u32;
        let png = round_corners(&png, radius)?;
        tokio::fs::write(output_path, &png).await?;

        info!(
            "Captured {} in {} ({})",
            url,
            crate::format_duration(start_time.elapsed()),
            crate::format_bytes(png.len())
        );

        Ok(output_path.to_path_buf())
    }
}
