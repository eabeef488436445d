// src/executor/browser.rs
//
// Thin session over chromiumoxide: one browser, one page, CSS selectors
// plus the tag:has-text('…') extension matched by inner text. Waits poll
// at a fixed interval instead of subscribing to DOM mutation events.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{Error, Result};

/// Pinned desktop UA; the target site serves a different login layout to
/// unknown agents.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
    slow_mo: Duration,
    default_timeout: Duration,
}

impl BrowserSession {
    pub async fn launch(cfg: &AppConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder().window_size(1920, 1080).no_sandbox();
        if !cfg.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(Error::automation)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::automation(format!("browser launch failed: {e}")))?;

        // The CDP event loop lives as long as the browser does.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::automation(format!("cannot open page: {e}")))?;
        page.set_user_agent(USER_AGENT)
            .await
            .map_err(|e| Error::automation(format!("cannot set user agent: {e}")))?;

        Ok(Self {
            browser,
            handler_task,
            page,
            slow_mo: Duration::from_millis(cfg.slow_mo_ms),
            default_timeout: Duration::from_millis(cfg.timeout_ms),
        })
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| Error::automation(format!("navigation to {url} failed: {e}")))?;
        self.pace().await;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| Error::automation(format!("cannot read page url: {e}")))?;
        Ok(url.unwrap_or_default())
    }

    /// Resolve a selector to an element, or `None` when nothing matches
    /// right now. `tag:has-text('label')` queries by tag and picks the
    /// first element whose inner text contains the label.
    pub async fn query(&self, selector: &str) -> Result<Option<Element>> {
        let (css, needle) = parse_selector(selector);
        match needle {
            None => Ok(self.page.find_element(css.as_str()).await.ok()),
            Some(text) => {
                let candidates = self.page.find_elements(css.as_str()).await.unwrap_or_default();
                for el in candidates {
                    let inner = el.inner_text().await.ok().flatten().unwrap_or_default();
                    if inner.contains(&text) {
                        return Ok(Some(el));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Poll until the selector resolves or the timeout elapses.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<Element> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(el) = self.query(selector).await? {
                return Ok(el);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::automation(format!(
                    "selector '{selector}' not found within {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        let el = self.wait_for(selector, timeout).await?;
        el.click()
            .await
            .map_err(|e| Error::automation(format!("click on '{selector}' failed: {e}")))?;
        self.pace().await;
        Ok(())
    }

    /// Click into the field, clear it, then type the value.
    pub async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> Result<()> {
        let el = self.wait_for(selector, timeout).await?;
        el.click()
            .await
            .map_err(|e| Error::automation(format!("focus on '{selector}' failed: {e}")))?;
        el.call_js_fn(
            "function() { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); }",
            false,
        )
        .await
        .map_err(|e| Error::automation(format!("clearing '{selector}' failed: {e}")))?;
        el.type_str(value)
            .await
            .map_err(|e| Error::automation(format!("typing into '{selector}' failed: {e}")))?;
        self.pace().await;
        Ok(())
    }

    /// Set a `<select>`'s value and fire its change event.
    pub async fn select(&self, selector: &str, value: &str, timeout: Duration) -> Result<()> {
        let el = self.wait_for(selector, timeout).await?;
        let func = format!(
            "function() {{ this.value = {}; this.dispatchEvent(new Event('change', {{ bubbles: true }})); }}",
            js_string(value)
        );
        el.call_js_fn(func, false)
            .await
            .map_err(|e| Error::automation(format!("selecting in '{selector}' failed: {e}")))?;
        self.pace().await;
        Ok(())
    }

    /// Dispatch a key down/up pair to whatever holds focus.
    pub async fn press(&self, key: &str) -> Result<()> {
        let (name, code, text, vk) = key_event_parts(key);
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let is_down = matches!(kind, DispatchKeyEventType::KeyDown);
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(name.clone())
                .code(code.clone())
                .windows_virtual_key_code(vk)
                .native_virtual_key_code(vk);
            if is_down {
                if let Some(text) = &text {
                    builder = builder.text(text.clone());
                }
            }
            let params = builder
                .build()
                .map_err(|e| Error::automation(format!("bad key event for '{key}': {e}")))?;
            self.page
                .execute(params)
                .await
                .map_err(|e| Error::automation(format!("key press '{key}' failed: {e}")))?;
        }
        self.pace().await;
        Ok(())
    }

    pub async fn inner_text(&self, el: &Element) -> Result<String> {
        let text = el
            .inner_text()
            .await
            .map_err(|e| Error::automation(format!("cannot read element text: {e}")))?;
        Ok(text.unwrap_or_default())
    }

    /// Poll `document.readyState` until the page reports complete.
    pub async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state: String = self
                .page
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|v| v.into_value().ok())
                .unwrap_or_default();
            if state == "complete" {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("page load did not settle within {}ms", timeout.as_millis());
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn screenshot_to(&self, path: &Path) -> Result<()> {
        self.page
            .save_screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
                path,
            )
            .await
            .map_err(|e| Error::automation(format!("screenshot failed: {e}")))?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            self.handler_task.abort();
            return Err(Error::automation(format!("browser close failed: {e}")));
        }
        // The handler stream ends once the connection is gone.
        let _ = self.handler_task.await;
        Ok(())
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }
}

/* ---------- selector grammar ---------- */

/// Split `tag:has-text('label')` into its CSS part and text needle. Plain
/// CSS passes through untouched.
fn parse_selector(raw: &str) -> (String, Option<String>) {
    const MARKER: &str = ":has-text(";
    if let Some(idx) = raw.find(MARKER) {
        let rest = &raw[idx + MARKER.len()..];
        if let Some(end) = rest.rfind(')') {
            let needle = rest[..end]
                .trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string();
            let base = raw[..idx].trim();
            let css = if base.is_empty() { "*".to_string() } else { base.to_string() };
            return (css, Some(needle));
        }
    }
    (raw.to_string(), None)
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn key_event_parts(key: &str) -> (String, String, Option<String>, i64) {
    match key {
        "Enter" => ("Enter".into(), "Enter".into(), Some("\r".into()), 13),
        "Tab" => ("Tab".into(), "Tab".into(), None, 9),
        "Escape" => ("Escape".into(), "Escape".into(), None, 27),
        other => {
            let text = (other.chars().count() == 1).then(|| other.to_string());
            (other.to_string(), format!("Key{}", other.to_uppercase()), text, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_css_passes_through() {
        assert_eq!(parse_selector("input[name='username']"), ("input[name='username']".into(), None));
        assert_eq!(parse_selector("#usernameHook"), ("#usernameHook".into(), None));
    }

    #[test]
    fn has_text_splits_tag_and_needle() {
        assert_eq!(
            parse_selector("button:has-text('Đăng nhập')"),
            ("button".into(), Some("Đăng nhập".into()))
        );
        assert_eq!(
            parse_selector("a:has-text(\"Chi tiết\")"),
            ("a".into(), Some("Chi tiết".into()))
        );
    }

    #[test]
    fn bare_has_text_queries_everything() {
        assert_eq!(parse_selector(":has-text('Lưu')"), ("*".into(), Some("Lưu".into())));
    }

    #[test]
    fn key_parts_cover_submit_keys() {
        let (name, code, text, vk) = key_event_parts("Enter");
        assert_eq!((name.as_str(), code.as_str(), vk), ("Enter", "Enter", 13));
        assert_eq!(text.as_deref(), Some("\r"));

        let (_, _, text, _) = key_event_parts("Tab");
        assert!(text.is_none());

        let (name, _, text, _) = key_event_parts("a");
        assert_eq!(name, "a");
        assert_eq!(text.as_deref(), Some("a"));
    }

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string("Bảo hiểm \"A\""), r#""Bảo hiểm \"A\"""#);
    }
}
