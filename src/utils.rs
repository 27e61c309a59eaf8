use crate::ScreenshotError;
use chrono::{DateTime, TimeZone};
use image::{ImageFormat, Rgba};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// `tweet_<32 hex chars>.png`, unique per call
pub fn capture_file_name() -> String {
    format!("tweet_{}.png", uuid::Uuid::new_v4().simple())
}

/// Owns a per-request capture path and removes the file when dropped
///
/// The file may never be created (validation or engine failure); removal of a
/// missing file is not an error. Call [`TempCapture::remove`] on the normal
/// path; `Drop` only covers early returns, panics and cancellation.
#[derive(Debug)]
pub struct TempCapture {
    path: PathBuf,
    removed: bool,
}

impl TempCapture {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(capture_file_name()),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) {
        remove_file_quietly(&self.path).await;
        self.removed = true;
    }
}

impl Drop for TempCapture {
    fn drop(&mut self) {
        if !self.removed {
            // Blocking, but a single small file
            remove_if_exists(&self.path);
        }
    }
}

pub fn remove_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove capture file {}: {}", path.display(), e),
    }
}

pub async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove capture file {}: {}", path.display(), e),
    }
}

/// Attachment name presented to the caller, e.g. `tweet_screenshot_20240101_120000.png`
pub fn download_filename<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("tweet_screenshot_{}.png", now.format("%Y%m%d_%H%M%S"))
}

pub fn validate_url(url: &str) -> Result<Url, ScreenshotError> {
    let parsed = Url::parse(url).map_err(|e| ScreenshotError::InvalidUrl(format!("{url}: {e}")))?;

    // Ensure it's HTTP or HTTPS
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ScreenshotError::InvalidUrl(format!(
            "{url}: unsupported scheme '{scheme}'"
        ))),
    }
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_SIGNATURE)
}

/// Make everything outside a rounded rectangle of the given radius transparent
pub fn round_corners(png: &[u8], radius: u32) -> Result<Vec<u8>, ScreenshotError> {
    let mut img = image::load_from_memory_with_format(png, ImageFormat::Png)?.to_rgba8();
    let (width, height) = img.dimensions();
    let radius = radius.min(width / 2).min(height / 2);

    if radius > 0 {
        let r = radius as f64;
        for y in 0..height {
            for x in 0..width {
                // Distance from the centre of the nearest corner arc, if inside a corner square
                let cx = if x < radius {
                    r - x as f64 - 0.5
                } else if x >= width - radius {
                    x as f64 + 0.5 - (width - radius) as f64
                } else {
                    continue;
                };
                let cy = if y < radius {
                    r - y as f64 - 0.5
                } else if y >= height - radius {
                    y as f64 + 0.5 - (height - radius) as f64
                } else {
                    continue;
                };

                if cx * cx + cy * cy > r * r {
                    img.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                }
            }
        }
    }

    let mut out = Vec::with_capacity(png.len());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
