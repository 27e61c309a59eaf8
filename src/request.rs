//! Capture request parsing and option defaulting
//!
//! A [`CaptureRequest`] is the loosely-typed wire form accepted by the HTTP
//! endpoints: every field may be missing or `null`. [`CaptureOptions`] is the
//! validated configuration handed to a [`crate::CaptureEngine`].

use crate::ScreenshotError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_MODE: i64 = 3;
pub const DEFAULT_NIGHT_MODE: i64 = 0;
pub const DEFAULT_WAIT_TIME: f64 = 5.0;
pub const DEFAULT_PARENT_LIMIT: i64 = -1;
pub const DEFAULT_RADIUS: i64 = 15;
pub const DEFAULT_SCALE: f64 = 1.0;

/// Body of `POST /screenshot`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CaptureRequest {
    pub url: Option<String>,
    pub mode: Option<i64>,
    pub night_mode: Option<i64>,
    pub wait_time: Option<f64>,
    pub show_parent_tweets: Option<bool>,
    pub show_parent_limit: Option<i64>,
    pub show_mentions: Option<i64>,
    pub radius: Option<i64>,
    pub scale: Option<f64>,
    pub lang: Option<String>,
    pub hide_photos: Option<bool>,
    pub hide_videos: Option<bool>,
    pub hide_gifs: Option<bool>,
    pub hide_quotes: Option<bool>,
    pub hide_link_previews: Option<bool>,
    pub hide_all: Option<bool>,
    pub format: Option<String>,
}

impl CaptureRequest {
    /// The requested URL, if present and non-empty
    pub fn target_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn response_format(&self) -> ResponseFormat {
        ResponseFormat::parse(self.format.as_deref())
    }

    /// Build a request from the reduced query string of `GET /screenshot`
    ///
    /// Only `url`, `mode` and `night_mode` are honoured; everything else keeps
    /// its default. Non-integer `mode`/`night_mode` values are rejected.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ScreenshotError> {
        let int_param = |name: &str| -> Result<Option<i64>, ScreenshotError> {
            params
                .get(name)
                .map(|raw| {
                    raw.trim().parse::<i64>().map_err(|_| {
                        ScreenshotError::InvalidOption(format!(
                            "invalid integer for {name}: '{raw}'"
                        ))
                    })
                })
                .transpose()
        };

        Ok(Self {
            url: params.get("url").cloned(),
            mode: int_param("mode")?,
            night_mode: int_param("night_mode")?,
            ..Default::default()
        })
    }
}

/// Encoding of a successful response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// PNG bytes sent as a download attachment
    File,
    /// JSON body with the PNG base64-encoded
    Base64,
}

impl ResponseFormat {
    /// Anything other than `"base64"` falls back to a file download
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("base64") => ResponseFormat::Base64,
            _ => ResponseFormat::File,
        }
    }
}

/// Layout variant of the rendered post
///
/// | mode | counts | timestamp |
/// |------|--------|-----------|
/// | 0    | no     | no        |
/// | 1    | yes    | no        |
/// | 2    | yes    | yes       |
/// | 3    | yes    | yes, plus the action buttons |
/// | 4    | no     | yes       |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u8);

impl Mode {
    pub fn new(value: i64) -> Result<Self, ScreenshotError> {
        match value {
            0..=4 => Ok(Self(value as u8)),
            _ => Err(ScreenshotError::InvalidOption(format!(
                "mode must be between 0 and 4, got {value}"
            ))),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn shows_counts(self) -> bool {
        matches!(self.0, 1..=3)
    }

    pub fn shows_timestamp(self) -> bool {
        matches!(self.0, 2 | 3 | 4)
    }

    pub fn shows_actions(self) -> bool {
        self.0 == 3
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self(DEFAULT_MODE as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NightMode {
    #[default]
    Light,
    Dim,
    LightsOut,
}

impl NightMode {
    pub fn new(value: i64) -> Result<Self, ScreenshotError> {
        match value {
            0 => Ok(NightMode::Light),
            1 => Ok(NightMode::Dim),
            2 => Ok(NightMode::LightsOut),
            _ => Err(ScreenshotError::InvalidOption(format!(
                "night_mode must be 0, 1 or 2, got {value}"
            ))),
        }
    }

    /// Value of the site's `night_mode` cookie
    pub fn cookie_value(self) -> &'static str {
        match self {
            NightMode::Light => "0",
            NightMode::Dim => "1",
            NightMode::LightsOut => "2",
        }
    }
}

/// Which earlier posts of the thread are included above the focal post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentTweets {
    #[default]
    Hidden,
    Unlimited,
    Limit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HiddenMedia {
    pub photos: bool,
    pub videos: bool,
    pub gifs: bool,
    pub quotes: bool,
    pub link_previews: bool,
}

impl HiddenMedia {
    pub fn all() -> Self {
        Self {
            photos: true,
            videos: true,
            gifs: true,
            quotes: true,
            link_previews: true,
        }
    }

    pub fn any(&self) -> bool {
        self.photos || self.videos || self.gifs || self.quotes || self.link_previews
    }
}

/// Validated configuration for one capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub mode: Mode,
    pub night_mode: NightMode,
    pub wait_time: Duration,
    pub parent_tweets: ParentTweets,
    pub mentions: usize,
    pub radius: u32,
    pub scale: f64,
    pub lang: Option<String>,
    pub hidden: HiddenMedia,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            night_mode: NightMode::default(),
            wait_time: Duration::from_secs_f64(DEFAULT_WAIT_TIME),
            parent_tweets: ParentTweets::default(),
            mentions: 0,
            radius: DEFAULT_RADIUS as u32,
            scale: DEFAULT_SCALE,
            lang: None,
            hidden: HiddenMedia::default(),
        }
    }
}

impl CaptureOptions {
    /// Apply defaults and validate every field of a request
    ///
    /// `hide_all` takes precedence over the individual `hide_*` flags.
    pub fn from_request(request: &CaptureRequest) -> Result<Self, ScreenshotError> {
        let mode = Mode::new(request.mode.unwrap_or(DEFAULT_MODE))?;
        let night_mode = NightMode::new(request.night_mode.unwrap_or(DEFAULT_NIGHT_MODE))?;

        let wait_secs = request.wait_time.unwrap_or(DEFAULT_WAIT_TIME);
        let wait_time = Duration::try_from_secs_f64(wait_secs).map_err(|_| {
            ScreenshotError::InvalidOption(format!(
                "wait_time must be a non-negative number of seconds, got {wait_secs}"
            ))
        })?;

        let parent_tweets = if request.show_parent_tweets.unwrap_or(false) {
            match request.show_parent_limit.unwrap_or(DEFAULT_PARENT_LIMIT) {
                -1 => ParentTweets::Unlimited,
                n if n >= 0 => ParentTweets::Limit(n as usize),
                n => {
                    return Err(ScreenshotError::InvalidOption(format!(
                        "show_parent_limit must be -1 or greater, got {n}"
                    )))
                }
            }
        } else {
            ParentTweets::Hidden
        };

        let mentions = non_negative("show_mentions", request.show_mentions.unwrap_or(0))?;
        let radius = non_negative("radius", request.radius.unwrap_or(DEFAULT_RADIUS))?;
        let radius = u32::try_from(radius)
            .map_err(|_| ScreenshotError::InvalidOption(format!("radius too large: {radius}")))?;

        let scale = request.scale.unwrap_or(DEFAULT_SCALE);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ScreenshotError::InvalidOption(format!(
                "scale must be greater than 0, got {scale}"
            )));
        }

        let hidden = if request.hide_all.unwrap_or(false) {
            HiddenMedia::all()
        } else {
            HiddenMedia {
                photos: request.hide_photos.unwrap_or(false),
                videos: request.hide_videos.unwrap_or(false),
                gifs: request.hide_gifs.unwrap_or(false),
                quotes: request.hide_quotes.unwrap_or(false),
                link_previews: request.hide_link_previews.unwrap_or(false),
            }
        };

        Ok(Self {
            mode,
            night_mode,
            wait_time,
            parent_tweets,
            mentions,
            radius,
            scale,
            lang: request.lang.clone().filter(|lang| !lang.is_empty()),
            hidden,
        })
    }
}

fn non_negative(name: &str, value: i64) -> Result<usize, ScreenshotError> {
    usize::try_from(value).map_err(|_| {
        ScreenshotError::InvalidOption(format!("{name} must not be negative, got {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CaptureRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let options =
            CaptureOptions::from_request(&request(r#"{"url": "https://x.com/a/status/1"}"#))
                .unwrap();
        assert_eq!(options, CaptureOptions::default());
        assert_eq!(options.mode.value(), 3);
        assert_eq!(options.wait_time, Duration::from_secs(5));
        assert_eq!(options.radius, 15);
        assert_eq!(options.scale, 1.0);
    }

    #[test]
    fn test_null_fields_use_defaults() {
        let options = CaptureOptions::from_request(&request(
            r#"{"url": "u", "mode": null, "scale": null, "lang": null}"#,
        ))
        .unwrap();
        assert_eq!(options, CaptureOptions::default());
    }

    #[test]
    fn test_hide_all_overrides_individual_flags() {
        let options = CaptureOptions::from_request(&request(
            r#"{"url": "u", "hide_all": true, "hide_photos": false, "hide_quotes": false}"#,
        ))
        .unwrap();
        assert_eq!(options.hidden, HiddenMedia::all());
    }

    #[test]
    fn test_individual_hide_flags() {
        let options = CaptureOptions::from_request(&request(
            r#"{"url": "u", "hide_videos": true, "hide_link_previews": true}"#,
        ))
        .unwrap();
        assert!(options.hidden.videos && options.hidden.link_previews);
        assert!(!options.hidden.photos && !options.hidden.gifs && !options.hidden.quotes);
    }

    #[test]
    fn test_parent_tweets() {
        let parse = |json: &str| CaptureOptions::from_request(&request(json)).unwrap().parent_tweets;

        assert_eq!(parse(r#"{"show_parent_limit": 3}"#), ParentTweets::Hidden);
        assert_eq!(parse(r#"{"show_parent_tweets": true}"#), ParentTweets::Unlimited);
        assert_eq!(
            parse(r#"{"show_parent_tweets": true, "show_parent_limit": 2}"#),
            ParentTweets::Limit(2)
        );
        assert!(CaptureOptions::from_request(&request(
            r#"{"show_parent_tweets": true, "show_parent_limit": -5}"#
        ))
        .is_err());
    }

    #[test]
    fn test_invalid_options_rejected() {
        for json in [
            r#"{"mode": 7}"#,
            r#"{"night_mode": 3}"#,
            r#"{"wait_time": -1.0}"#,
            r#"{"wait_time": 1e20}"#,
            r#"{"scale": 0.0}"#,
            r#"{"radius": -2}"#,
            r#"{"show_mentions": -1}"#,
        ] {
            let err = CaptureOptions::from_request(&request(json)).unwrap_err();
            assert!(matches!(err, ScreenshotError::InvalidOption(_)), "{json}");
        }
    }

    #[test]
    fn test_empty_lang_is_unset() {
        let options = CaptureOptions::from_request(&request(r#"{"lang": ""}"#)).unwrap();
        assert!(options.lang.is_none());
        let options = CaptureOptions::from_request(&request(r#"{"lang": "ja"}"#)).unwrap();
        assert_eq!(options.lang.as_deref(), Some("ja"));
    }

    #[test]
    fn test_mode_table() {
        let mode = |v| Mode::new(v).unwrap();
        assert!(!mode(0).shows_counts() && !mode(0).shows_timestamp());
        assert!(mode(1).shows_counts() && !mode(1).shows_timestamp());
        assert!(mode(2).shows_counts() && mode(2).shows_timestamp());
        assert!(mode(3).shows_actions());
        assert!(!mode(4).shows_counts() && mode(4).shows_timestamp());
    }

    #[test]
    fn test_response_format() {
        assert_eq!(ResponseFormat::parse(None), ResponseFormat::File);
        assert_eq!(ResponseFormat::parse(Some("base64")), ResponseFormat::Base64);
        assert_eq!(ResponseFormat::parse(Some("jpeg")), ResponseFormat::File);
    }

    #[test]
    fn test_from_query() {
        let mut params = HashMap::new();
        params.insert("url".to_string(), "https://x.com/a/status/1".to_string());
        params.insert("mode".to_string(), "2".to_string());
        params.insert("wait_time".to_string(), "30".to_string());

        let request = CaptureRequest::from_query(&params).unwrap();
        assert_eq!(request.mode, Some(2));
        assert_eq!(request.night_mode, None);
        // Reduced option set: extra parameters are ignored
        assert_eq!(request.wait_time, None);

        params.insert("night_mode".to_string(), "dark".to_string());
        assert!(CaptureRequest::from_query(&params).is_err());
    }
}
