//! # Tweet Capture API
//!
//! An HTTP service that renders a post URL with headless Chrome and returns
//! the screenshot, either as a PNG download or as base64 inside JSON.
//!
//! A fixed pool of Chrome instances is launched at startup and shared by all
//! requests. Each request writes its capture to a unique temp file, which is
//! read into memory and deleted before the response goes out.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/` | Health check |
//! | POST | `/screenshot` | Capture with the full option set (JSON body) |
//! | GET | `/screenshot` | Capture with `url`, `mode`, `night_mode` query parameters |
//! | GET | `/metrics` | Prometheus metrics |
//!
//! ## Request options
//!
//! | Field | Default | Notes |
//! |-------|---------|-------|
//! | `url` | required | absolute http(s) URL of the post |
//! | `mode` | 3 | layout, 0-4 |
//! | `night_mode` | 0 | 0 light, 1 dim, 2 lights out |
//! | `wait_time` | 5.0 | seconds to let the page settle |
//! | `show_parent_tweets` | false | include the thread above the post |
//! | `show_parent_limit` | -1 | -1 means every parent |
//! | `show_mentions` | 0 | replies to include below the post |
//! | `radius` | 15 | corner radius in CSS pixels |
//! | `scale` | 1.0 | device scale factor |
//! | `lang` | unset | `Accept-Language` sent to the site |
//! | `hide_photos`, `hide_videos`, `hide_gifs`, `hide_quotes`, `hide_link_previews` | false | |
//! | `hide_all` | false | forces every `hide_*` flag on |
//! | `format` | `"file"` | `"base64"` returns JSON |
//!
//! ## Usage
//!
//! ```bash
//! tweet-capture-api --port 8080 --pool-size 2 --chrome-path /usr/bin/chromium
//!
//! curl -X POST localhost:8080/screenshot \
//!     -H 'Content-Type: application/json' \
//!     -d '{"url": "https://twitter.com/jack/status/20", "format": "base64"}'
//! ```

/// Configuration and settings for the service
pub mod config;

/// Error types and their HTTP mapping
pub mod error;

/// Request parameters and validated capture options
pub mod request;

/// Stylesheet and region scripts injected into the post page
pub mod tweet_page;

/// Browser pool management for concurrent Chrome instances
pub mod browser_pool;

/// Capture engine trait and the Chrome implementation
pub mod capture;

/// HTTP routes and handlers
pub mod server;

/// Command-line interface implementation
pub mod cli;

/// Prometheus metrics
pub mod metrics;

/// Utility functions and helpers
pub mod utils;


pub use browser_pool::*;
pub use capture::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use self::metrics::*;
pub use request::*;
pub use server::*;
pub use utils::*;
