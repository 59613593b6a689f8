//! Headless Chromium control.
//!
//! With the `browser` feature, [`Browser`] launches Chromium through the Chrome
//! `DevTools` Protocol (chromiumoxide) and hands out [`ChromiumPage`]s, which
//! implement every collaborator trait in [`crate::driver`].
//!
//! ```text
//!   Browser::launch ──► CDP handler task
//!        │
//!        └─ new_page ──► ChromiumPage ──┬─ console listener task ──► ConsoleCapture
//!                                        ├─ on_request  ──► listener task ──► callback
//!                                        └─ on_response ──► listener task ──► callback
//! ```
//!
//! Listener tasks are aborted when the page is dropped.

use serde::{Deserialize, Serialize};

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// How long an action waits for its target element
    pub action_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            sandbox: true,
            action_timeout_ms: 5_000,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Classify a launch failure: a missing Chromium binary gets its own error
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn launch_error(message: String) -> crate::result::WaypointError {
    let lower = message.to_lowercase();
    if lower.contains("executable") || lower.contains("no such file") {
        crate::result::WaypointError::BrowserNotFound
    } else {
        crate::result::WaypointError::BrowserLaunch { message }
    }
}

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::missing_errors_doc)]
mod cdp {
    use super::BrowserConfig;
    use crate::console::{ConsoleCapture, ConsoleLevel, ConsoleMessage};
    use crate::driver::{
        ActionDriver, DomInspector, ElementSnapshot, NetworkCallback, NetworkExchange,
        NetworkMonitor,
    };
    use crate::result::{WaypointError, WaypointResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
    use chromiumoxide::cdp::browser_protocol::network::{
        ClearBrowserCookiesParams, EnableParams, EventRequestWillBeSent, EventResponseReceived,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::{ConsoleApiCalledType, EventConsoleApiCalled};
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use std::path::Path;
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    const ACTION_RETRY_MS: u64 = 100;

    fn page_error(e: impl std::fmt::Display) -> WaypointError {
        WaypointError::page(e.to_string())
    }

    fn js_string(value: &str) -> String {
        serde_json::Value::String(value.to_string()).to_string()
    }

    /// Running Chromium instance
    #[derive(Debug)]
    pub struct Browser {
        config: BrowserConfig,
        inner: CdpBrowser,
        handle: JoinHandle<()>,
    }

    impl Browser {
        /// Launch Chromium
        pub async fn launch(config: BrowserConfig) -> WaypointResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(super::launch_error)?;

            let (inner, mut handler) = CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| super::launch_error(e.to_string()))?;

            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            debug!(headless = config.headless, "chromium launched");
            Ok(Self {
                config,
                inner,
                handle,
            })
        }

        /// Open a blank tab with console capture running
        pub async fn new_page(&self) -> WaypointResult<ChromiumPage> {
            let inner = self
                .inner
                .new_page("about:blank")
                .await
                .map_err(page_error)?;
            inner.execute(EnableParams::default()).await.map_err(page_error)?;

            let page = ChromiumPage {
                inner,
                console: ConsoleCapture::new(),
                listeners: Mutex::new(Vec::new()),
                action_timeout: Duration::from_millis(self.config.action_timeout_ms),
            };
            page.capture_console().await?;
            Ok(page)
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser
        pub async fn close(mut self) -> WaypointResult<()> {
            self.inner
                .close()
                .await
                .map_err(|e| WaypointError::BrowserLaunch {
                    message: e.to_string(),
                })?;
            self.handle.abort();
            Ok(())
        }
    }

    /// One Chromium tab
    #[derive(Debug)]
    pub struct ChromiumPage {
        inner: CdpPage,
        console: ConsoleCapture,
        listeners: Mutex<Vec<JoinHandle<()>>>,
        action_timeout: Duration,
    }

    impl Drop for ChromiumPage {
        fn drop(&mut self) {
            for handle in self
                .listeners
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..)
            {
                handle.abort();
            }
        }
    }

    impl ChromiumPage {
        /// Console messages captured since the page opened
        #[must_use]
        pub fn console(&self) -> &ConsoleCapture {
            &self.console
        }

        fn track(&self, handle: JoinHandle<()>) {
            self.listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle);
        }

        async fn capture_console(&self) -> WaypointResult<()> {
            let mut events = self
                .inner
                .event_listener::<EventConsoleApiCalled>()
                .await
                .map_err(page_error)?;
            let console = self.console.clone();
            self.track(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    console.push(console_message(&event));
                }
            }));
            Ok(())
        }

        async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> WaypointResult<T> {
            self.inner
                .evaluate(expression)
                .await
                .map_err(|e| WaypointError::Evaluation {
                    message: e.to_string(),
                })?
                .into_value()
                .map_err(|e| WaypointError::Evaluation {
                    message: e.to_string(),
                })
        }

        /// Run a DOM action script until it reports success or the action timeout passes
        async fn act(&self, what: &str, script: &str) -> WaypointResult<()> {
            let deadline = tokio::time::Instant::now() + self.action_timeout;
            loop {
                if self.evaluate::<bool>(script).await? {
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(WaypointError::ElementNotFound {
                        selector: what.to_string(),
                    });
                }
                tokio::time::sleep(Duration::from_millis(ACTION_RETRY_MS)).await;
            }
        }

        async fn fill_at(&self, selector: &str, index: usize, value: &str) -> WaypointResult<()> {
            let script = format!(
                "(() => {{ \
                    const el = document.querySelectorAll({sel})[{index}]; \
                    if (!el) return false; \
                    el.focus(); \
                    const proto = el instanceof HTMLTextAreaElement \
                        ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
                    Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {val}); \
                    el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                    el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                    return true; \
                }})()",
                sel = js_string(selector),
                val = js_string(value),
            );
            self.act(&format!("{selector} >> nth={index}"), &script).await
        }
    }

    fn console_message(event: &EventConsoleApiCalled) -> ConsoleMessage {
        let level = match event.r#type {
            ConsoleApiCalledType::Log => ConsoleLevel::Log,
            ConsoleApiCalledType::Info => ConsoleLevel::Info,
            ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
            ConsoleApiCalledType::Error => ConsoleLevel::Error,
            ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
            _ => ConsoleLevel::Other,
        };
        let text = event
            .args
            .iter()
            .map(|arg| match &arg.value {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => arg
                    .description
                    .clone()
                    .unwrap_or_else(|| "<object>".to_string()),
            })
            .collect::<Vec<_>>()
            .join(" ");

        let message = ConsoleMessage::new(level, text);
        match event
            .stack_trace
            .as_ref()
            .and_then(|trace| trace.call_frames.first())
        {
            Some(frame) => message.with_source(format!(
                "{}:{}:{}",
                frame.url, frame.line_number, frame.column_number
            )),
            None => message,
        }
    }

    #[async_trait]
    impl DomInspector for ChromiumPage {
        async fn find_by_text(&self, selector: &str, labels: &[String]) -> WaypointResult<bool> {
            let script = format!(
                "(() => {{ \
                    const labels = {labels}; \
                    return Array.from(document.querySelectorAll({sel})) \
                        .some(el => labels.includes((el.textContent || '').trim())); \
                }})()",
                labels = serde_json::to_string(labels)?,
                sel = js_string(selector),
            );
            self.evaluate(&script).await
        }

        async fn query_all(&self, selector: &str) -> WaypointResult<Vec<ElementSnapshot>> {
            let script = format!(
                "Array.from(document.querySelectorAll({sel})).map(el => ({{ \
                    text: (el.textContent || '').trim(), \
                    visible: el.getClientRects().length > 0 \
                }}))",
                sel = js_string(selector),
            );
            self.evaluate(&script).await
        }

        async fn is_text_visible(&self, text: &str) -> WaypointResult<bool> {
            let script = format!(
                "(() => {{ \
                    const needle = {needle}; \
                    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT); \
                    while (walker.nextNode()) {{ \
                        const node = walker.currentNode; \
                        if (node.textContent.includes(needle) && node.parentElement \
                            && node.parentElement.getClientRects().length > 0) return true; \
                    }} \
                    return false; \
                }})()",
                needle = js_string(text),
            );
            self.evaluate(&script).await
        }

        async fn count(&self, selector: &str) -> WaypointResult<usize> {
            self.evaluate(&format!(
                "document.querySelectorAll({}).length",
                js_string(selector)
            ))
            .await
        }

        async fn current_url(&self) -> WaypointResult<String> {
            Ok(self
                .inner
                .url()
                .await
                .map_err(page_error)?
                .unwrap_or_default())
        }
    }

    #[async_trait]
    impl NetworkMonitor for ChromiumPage {
        async fn on_request(&self, callback: NetworkCallback) -> WaypointResult<()> {
            let mut events = self
                .inner
                .event_listener::<EventRequestWillBeSent>()
                .await
                .map_err(page_error)?;
            self.track(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    callback(NetworkExchange::request(event.request.url.clone()));
                }
            }));
            Ok(())
        }

        async fn on_response(&self, callback: NetworkCallback) -> WaypointResult<()> {
            let mut events = self
                .inner
                .event_listener::<EventResponseReceived>()
                .await
                .map_err(page_error)?;
            self.track(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    let url = event.response.url.clone();
                    let status = u16::try_from(event.response.status).ok();
                    if status.is_none() {
                        warn!(%url, raw = event.response.status, "response status out of range");
                    }
                    callback(NetworkExchange { url, status });
                }
            }));
            Ok(())
        }
    }

    #[async_trait]
    impl ActionDriver for ChromiumPage {
        async fn navigate(&self, url: &str) -> WaypointResult<()> {
            self.inner
                .goto(url)
                .await
                .map_err(|e| WaypointError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            debug!(url, "navigated");
            Ok(())
        }

        async fn fill(&self, selector: &str, value: &str) -> WaypointResult<()> {
            self.fill_at(selector, 0, value).await
        }

        async fn fill_nth(&self, selector: &str, index: usize, value: &str) -> WaypointResult<()> {
            self.fill_at(selector, index, value).await
        }

        async fn attach_file(&self, selector: &str, path: &Path) -> WaypointResult<()> {
            let absolute = std::fs::canonicalize(path)?;
            let element = self
                .inner
                .find_element(selector)
                .await
                .map_err(|_| WaypointError::ElementNotFound {
                    selector: selector.to_string(),
                })?;
            let params = SetFileInputFilesParams::builder()
                .files(vec![absolute.to_string_lossy().into_owned()])
                .backend_node_id(element.backend_node_id)
                .build()
                .map_err(WaypointError::input)?;
            self.inner.execute(params).await.map_err(|e| WaypointError::Input {
                message: e.to_string(),
            })?;
            Ok(())
        }

        async fn click(&self, selector: &str) -> WaypointResult<()> {
            let script = format!(
                "(() => {{ \
                    const el = document.querySelector({sel}); \
                    if (!el) return false; \
                    el.scrollIntoView({{ block: 'center' }}); \
                    el.click(); \
                    return true; \
                }})()",
                sel = js_string(selector),
            );
            self.act(selector, &script).await
        }

        async fn click_text(&self, selector: &str, text: &str) -> WaypointResult<()> {
            let script = format!(
                "(() => {{ \
                    const el = Array.from(document.querySelectorAll({sel})) \
                        .find(e => (e.textContent || '').includes({needle})); \
                    if (!el) return false; \
                    el.scrollIntoView({{ block: 'center' }}); \
                    el.click(); \
                    return true; \
                }})()",
                sel = js_string(selector),
                needle = js_string(text),
            );
            self.act(&format!("{selector}:has-text({text})"), &script)
                .await
        }

        async fn screenshot(&self, path: &Path) -> WaypointResult<()> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();

            let screenshot =
                self.inner
                    .execute(params)
                    .await
                    .map_err(|e| WaypointError::Screenshot {
                        message: e.to_string(),
                    })?;

            use base64::Engine;
            let png = base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| WaypointError::Screenshot {
                    message: e.to_string(),
                })?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, png).await?;
            debug!(path = %path.display(), "screenshot saved");
            Ok(())
        }

        async fn clear_session(&self) -> WaypointResult<()> {
            self.inner
                .execute(ClearBrowserCookiesParams::default())
                .await
                .map_err(page_error)?;
            self.evaluate::<bool>(
                "(() => { try { localStorage.clear(); sessionStorage.clear(); } \
                 catch (e) { return false; } return true; })()",
            )
            .await?;
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{Browser, ChromiumPage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_acceptance_viewport() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert!(config.sandbox);
        assert_eq!((config.viewport_width, config.viewport_height), (1280, 800));
    }

    #[test]
    fn test_builders() {
        let config = BrowserConfig::default()
            .with_headless(false)
            .with_viewport(800, 600)
            .with_chromium_path("/usr/bin/chromium")
            .with_no_sandbox();
        assert!(!config.headless);
        assert!(!config.sandbox);
        assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(config.viewport_width, 800);
    }

    #[test]
    fn test_missing_binary_is_browser_not_found() {
        let err = launch_error("Could not auto detect a chrome executable".to_string());
        assert!(matches!(err, crate::result::WaypointError::BrowserNotFound));
        let err = launch_error("No such file or directory (os error 2)".to_string());
        assert!(matches!(err, crate::result::WaypointError::BrowserNotFound));
    }

    #[test]
    fn test_other_launch_failures_keep_message() {
        let err = launch_error("websocket handshake timed out".to_string());
        assert!(err.to_string().contains("websocket handshake timed out"));
    }

    #[test]
    fn test_yaml_partial() {
        let config: BrowserConfig = serde_yaml_ng::from_str("headless: false\n").unwrap();
        assert!(!config.headless);
        assert_eq!(config.action_timeout_ms, 5_000);
    }
}
