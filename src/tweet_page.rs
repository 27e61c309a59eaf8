//! Page-side scripts used while rendering a post
//!
//! Everything here is pure string building so it can be tested without a
//! browser: the stylesheet that applies the layout mode and media hiding, and
//! the script that measures the region to capture.

use crate::{CaptureOptions, HiddenMedia, Mode, ParentTweets, ScreenshotError};
use serde::Deserialize;
use serde_json::Value;

const ARTICLE: &str = r#"article[data-testid="tweet"]"#;

/// Page-coordinate bounds of the capture region
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

fn mode_rules(mode: Mode) -> Vec<String> {
    let mut rules = Vec::new();

    if !mode.shows_counts() {
        rules.push(format!(r#"{ARTICLE} [role="group"]"#));
    } else if !mode.shows_actions() {
        // Keep the numbers, drop the button icons
        rules.push(format!(r#"{ARTICLE} [role="group"] svg"#));
    }

    if !mode.shows_timestamp() {
        rules.push(format!("{ARTICLE} a:has(> time)"));
    }

    rules
}

fn media_rules(hidden: &HiddenMedia) -> Vec<String> {
    let mut rules = Vec::new();

    if hidden.photos {
        rules.push(format!(
            r#"{ARTICLE} [data-testid="tweetPhoto"]:not(:has(video))"#
        ));
    }
    if hidden.videos {
        rules.push(format!(
            r#"{ARTICLE} [data-testid="videoPlayer"]:not(:has(video[src*="tweet_video"]))"#
        ));
    }
    if hidden.gifs {
        rules.push(format!(
            r#"{ARTICLE} [data-testid="videoPlayer"]:has(video[src*="tweet_video"])"#
        ));
    }
    if hidden.quotes {
        rules.push(format!(r#"{ARTICLE} div[role="link"]:has(time)"#));
    }
    if hidden.link_previews {
        rules.push(format!(r#"{ARTICLE} [data-testid="card.wrapper"]"#));
    }

    rules
}

/// CSS hiding overlays plus whatever the mode and media flags exclude
pub fn build_stylesheet(options: &CaptureOptions) -> String {
    let mut selectors = vec![
        "#layers".to_string(),
        r#"[data-testid="BottomBar"]"#.to_string(),
    ];
    selectors.extend(mode_rules(options.mode));
    selectors.extend(media_rules(&options.hidden));

    format!("{} {{ display: none !important; }}", selectors.join(",\n"))
}

/// Script that appends the stylesheet to the document
pub fn stylesheet_script(options: &CaptureOptions) -> Result<String, ScreenshotError> {
    let css = serde_json::to_string(&build_stylesheet(options))?;

    Ok(format!(
        "(() => {{ const style = document.createElement('style'); \
         style.textContent = {css}; \
         document.head.appendChild(style); return true; }})()"
    ))
}

const REGION_SCRIPT: &str = r#"(() => {
  const parentLimit = __PARENT_LIMIT__;
  const mentions = __MENTIONS__;
  const articles = Array.from(document.querySelectorAll('__ARTICLE__'));
  if (articles.length === 0) return null;
  let focal = articles.findIndex(a => a.getAttribute('tabindex') === '-1');
  if (focal < 0) focal = 0;
  const first = parentLimit < 0 ? 0 : Math.max(0, focal - parentLimit);
  const last = Math.min(articles.length - 1, focal + mentions);
  const top = articles[first].getBoundingClientRect();
  const bottom = articles[last].getBoundingClientRect();
  const main = articles[focal].getBoundingClientRect();
  return {
    x: main.left + window.scrollX,
    y: top.top + window.scrollY,
    width: main.width,
    height: bottom.bottom - top.top,
  };
})()"#;

/// Script returning a [`Region`] spanning the focal post, the requested
/// parents above it and the requested replies below it, or `null`
pub fn region_script(parent_tweets: ParentTweets, mentions: usize) -> String {
    let parent_limit = match parent_tweets {
        ParentTweets::Hidden => 0,
        ParentTweets::Unlimited => -1,
        ParentTweets::Limit(n) => n as i64,
    };

    REGION_SCRIPT
        .replace("__PARENT_LIMIT__", &parent_limit.to_string())
        .replace("__MENTIONS__", &mentions.to_string())
        .replace("__ARTICLE__", ARTICLE)
}

/// Decode the region script's result
///
/// A missing or `null` result, or a zero-sized region, means no post was found.
pub fn parse_region(value: Option<&Value>, url: &str) -> Result<Region, ScreenshotError> {
    let not_found = || ScreenshotError::ElementNotFound(format!("no post rendered at {url}"));

    let value = match value {
        None | Some(Value::Null) => return Err(not_found()),
        Some(value) => value,
    };

    let region = Region::deserialize(value)
        .map_err(|e| ScreenshotError::PageError(format!("unexpected region result: {e}")))?;
    if region.is_empty() {
        return Err(not_found());
    }

    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(mode: i64, hidden: HiddenMedia) -> CaptureOptions {
        CaptureOptions {
            mode: Mode::new(mode).unwrap(),
            hidden,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_stylesheet_only_hides_overlays() {
        let css = build_stylesheet(&CaptureOptions::default());
        assert!(css.contains("#layers"));
        assert!(!css.contains("tweetPhoto"));
        assert!(!css.contains(r#"[role="group"]"#));
        assert!(css.ends_with("{ display: none !important; }"));
    }

    #[test]
    fn test_mode_rules() {
        let css = build_stylesheet(&options(0, HiddenMedia::default()));
        assert!(css.contains(r#"[role="group"]"#));
        assert!(css.contains("a:has(> time)"));

        let css = build_stylesheet(&options(2, HiddenMedia::default()));
        assert!(css.contains(r#"[role="group"] svg"#));
        assert!(!css.contains("a:has(> time)"));

        let css = build_stylesheet(&options(4, HiddenMedia::default()));
        assert!(css.contains(r#"[role="group"]"#));
        assert!(!css.contains("a:has(> time)"));
    }

    #[test]
    fn test_hide_all_media_rules() {
        let css = build_stylesheet(&options(3, HiddenMedia::all()));
        for needle in ["tweetPhoto", "videoPlayer", "tweet_video", r#"div[role="link"]"#, "card.wrapper"] {
            assert!(css.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_stylesheet_script_escapes_css() {
        let script = stylesheet_script(&options(0, HiddenMedia::all())).unwrap();
        assert!(script.starts_with("(() => {"));
        assert!(script.contains(r#"\"tweet\""#));
        assert!(script.contains("document.head.appendChild(style)"));
    }

    #[test]
    fn test_region_script_placeholders() {
        let script = region_script(ParentTweets::Limit(2), 1);
        assert!(script.contains("const parentLimit = 2;"));
        assert!(script.contains("const mentions = 1;"));
        assert!(script.contains(ARTICLE));
        assert!(!script.contains("__"));

        assert!(region_script(ParentTweets::Unlimited, 0).contains("const parentLimit = -1;"));
        assert!(region_script(ParentTweets::Hidden, 0).contains("const parentLimit = 0;"));
    }

    #[test]
    fn test_region_deserialize() {
        let region: Option<Region> =
            serde_json::from_str(r#"{"x": 10.5, "y": 20, "width": 598, "height": 400}"#).unwrap();
        let region = region.unwrap();
        assert_eq!(region.width, 598.0);
        assert!(!region.is_empty());

        let missing: Option<Region> = serde_json::from_str("null").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_parse_region() {
        let url = "https://twitter.com/jack/status/20";

        let value = serde_json::json!({"x": 0, "y": 120.5, "width": 598, "height": 310});
        let region = parse_region(Some(&value), url).unwrap();
        assert_eq!(region.y, 120.5);
        assert_eq!(region.height, 310.0);

        for missing in [None, Some(&Value::Null)] {
            assert!(matches!(
                parse_region(missing, url),
                Err(ScreenshotError::ElementNotFound(_))
            ));
        }

        let empty = serde_json::json!({"x": 0, "y": 0, "width": 598, "height": 0});
        assert!(matches!(
            parse_region(Some(&empty), url),
            Err(ScreenshotError::ElementNotFound(_))
        ));

        let garbage = serde_json::json!("article");
        assert!(matches!(
            parse_region(Some(&garbage), url),
            Err(ScreenshotError::PageError(_))
        ));
    }
}
