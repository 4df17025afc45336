use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::element::Element;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;

use super::driver::{ElementHandle, PageDriver, WaitPolicy};
use super::error::{DriverError, DriverResult};

const READY_STATE_SCRIPT: &str = "document.readyState";
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const READY_POLL_ATTEMPTS: usize = 100;
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);
const TEXT_CONTENT_FN: &str = "function() { return this.textContent; }";
const CLEAR_VALUE_FN: &str = "function() { this.value = ''; }";

/// Boxed future returned by the closure given to [`SessionManager::with_driver`].
pub type SessionFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + 'a>>;

/// Owns the Chromium lifecycle: one driver per acquisition, always released.
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: Arc<SessionConfig>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Launches a browser using the configured headless and slow-mo settings.
    pub async fn launch(&self) -> DriverResult<ChromiumDriver> {
        self.acquire_driver(self.config.headless, self.config.slow_mo_millis)
            .await
    }

    pub async fn acquire_driver(
        &self,
        headless: bool,
        slow_mo_millis: u64,
    ) -> DriverResult<ChromiumDriver> {
        let session_id = Uuid::new_v4().to_string();
        let profile = tempfile::Builder::new()
            .prefix("scrapekit-profile-")
            .tempdir()?;
        let chromium_config = self.build_chromium_config(profile.path(), headless)?;
        info!(
            session = %session_id,
            headless,
            slow_mo_ms = slow_mo_millis,
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        let page = match browser.new_page(CreateTargetParams::new("about:blank")).await {
            Ok(page) => page,
            Err(err) => {
                let driver = ChromiumDriver::assemble(
                    session_id,
                    browser,
                    handler_task,
                    None,
                    profile,
                    slow_mo_millis,
                );
                if let Err(release_err) = driver.shutdown().await {
                    warn!(error = %release_err, "Failed to release browser after page error");
                }
                return Err(err.into());
            }
        };

        Ok(ChromiumDriver::assemble(
            session_id,
            browser,
            handler_task,
            Some(page),
            profile,
            slow_mo_millis,
        ))
    }

    pub async fn release_driver(&self, driver: ChromiumDriver) -> DriverResult<()> {
        driver.shutdown().await
    }

    /// Runs `f` against a freshly acquired driver and releases it on every exit path.
    ///
    /// The closure's own error wins over a release failure.
    pub async fn with_driver<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DriverError>,
        F: for<'a> FnOnce(&'a mut ChromiumDriver) -> SessionFuture<'a, T, E>,
    {
        let mut driver = self.launch().await?;
        let outcome = f(&mut driver).await;
        let released = self.release_driver(driver).await;
        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release_err)) => {
                warn!(error = %release_err, "Failed to release browser after extraction error");
                Err(err)
            }
        }
    }

    fn build_chromium_config(&self, profile: &Path, headless: bool) -> DriverResult<ChromiumConfig> {
        let [width, height] = self.config.window_size;
        let mut builder = ChromiumConfig::builder()
            .user_data_dir(profile)
            .viewport(ChromiumViewport {
                width,
                height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: width >= height,
                has_touch: false,
            });

        if let Some(executable) = &self.config.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = self.config.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }

        let mut args = vec![format!("--window-size={width},{height}")];
        if self.config.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if let Some(user_agent) = &self.config.user_agent {
            args.push(format!("--user-agent={user_agent}"));
        }
        args.push("--no-first-run".into());
        args.push("--password-store=basic".into());

        builder = builder.args(args);

        builder.build().map_err(DriverError::Configuration)
    }
}

/// [`PageDriver`] backed by a single Chromium tab.
#[derive(Debug)]
pub struct ChromiumDriver {
    session_id: String,
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    page: Option<Page>,
    elements: Vec<Element>,
    profile: Option<TempDir>,
    slow_mo: Duration,
}

impl ChromiumDriver {
    fn assemble(
        session_id: String,
        browser: Browser,
        handler_task: JoinHandle<()>,
        page: Option<Page>,
        profile: TempDir,
        slow_mo_millis: u64,
    ) -> Self {
        Self {
            session_id,
            browser,
            handler_task: Some(handler_task),
            page,
            elements: Vec::new(),
            profile: Some(profile),
            slow_mo: Duration::from_millis(slow_mo_millis),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn page(&self) -> DriverResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| DriverError::Unexpected("browser session has no open page".into()))
    }

    async fn shutdown(mut self) -> DriverResult<()> {
        info!(session = %self.session_id, "Shutting down Chromium instance");
        self.elements.clear();
        self.page = None;
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "Failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Browser handler join error");
            }
        }
        if let Some(profile) = self.profile.take() {
            profile.close()?;
        }
        Ok(())
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            sleep(self.slow_mo).await;
        }
    }

    fn element(&self, handle: ElementHandle) -> DriverResult<&Element> {
        self.elements
            .get(handle.index())
            .ok_or(DriverError::StaleElement(handle.index()))
    }

    fn register(&mut self, elements: Vec<Element>) -> Vec<ElementHandle> {
        let start = self.elements.len();
        let count = elements.len();
        self.elements.extend(elements);
        (start..start + count).map(ElementHandle::new).collect()
    }

    async fn wait_for_network_idle(&self) -> DriverResult<()> {
        let page = self.page()?;
        for _ in 0..READY_POLL_ATTEMPTS {
            let state = page
                .evaluate(READY_STATE_SCRIPT)
                .await?
                .into_value::<String>()
                .unwrap_or_default();
            if state == "complete" {
                sleep(NETWORK_QUIET_WINDOW).await;
                return Ok(());
            }
            sleep(READY_POLL_INTERVAL).await;
        }
        warn!(session = %self.session_id, "document never reached readyState=complete");
        Ok(())
    }
}

#[async_trait(?Send)]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> DriverResult<()> {
        self.pace().await;
        self.elements.clear();
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(DriverError::Configuration)?;
        let page = self.page()?;
        page.goto(params)
            .await
            .map_err(|err| DriverError::Navigation(format!("{url}: {err}")))?;
        page.wait_for_navigation()
            .await
            .map_err(|err| DriverError::Navigation(format!("{url}: {err}")))?;
        if wait == WaitPolicy::NetworkIdle {
            self.wait_for_network_idle().await?;
        }
        Ok(())
    }

    async fn wait_millis(&mut self, millis: u64) -> DriverResult<()> {
        if millis > 0 {
            sleep(Duration::from_millis(millis)).await;
        }
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let found = self
            .page()?
            .find_elements(selector)
            .await
            .map_err(|err| DriverError::query(selector, err))?;
        Ok(self.register(found))
    }

    async fn query(&mut self, selector: &str) -> DriverResult<Option<ElementHandle>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> DriverResult<Vec<ElementHandle>> {
        let found = self
            .element(scope)?
            .find_elements(selector)
            .await
            .map_err(|err| DriverError::query(selector, err))?;
        Ok(self.register(found))
    }

    async fn query_within(
        &mut self,
        scope: ElementHandle,
        selector: &str,
    ) -> DriverResult<Option<ElementHandle>> {
        Ok(self
            .query_all_within(scope, selector)
            .await?
            .into_iter()
            .next())
    }

    async fn evaluate_script(&mut self, script: &str) -> DriverResult<Value> {
        self.pace().await;
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|err| DriverError::Script(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn screenshot(&mut self, path: &Path) -> DriverResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page()?.save_screenshot(params, path).await?;
        info!(path = %path.display(), "Screenshot saved");
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> DriverResult<()> {
        self.pace().await;
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|err| DriverError::query(selector, err))?;
        element.click().await?;
        element.call_js_fn(CLEAR_VALUE_FN, false).await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        self.pace().await;
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|err| DriverError::query(selector, err))?;
        element.click().await?;
        self.elements.clear();
        Ok(())
    }

    async fn click_element(&mut self, element: ElementHandle) -> DriverResult<()> {
        self.pace().await;
        self.element(element)?.click().await?;
        // A click may replace the document; earlier handles are dropped.
        self.elements.clear();
        Ok(())
    }

    async fn element_text_content(
        &mut self,
        element: ElementHandle,
    ) -> DriverResult<Option<String>> {
        let returns = self
            .element(element)?
            .call_js_fn(TEXT_CONTENT_FN, false)
            .await?;
        Ok(returns
            .result
            .value
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    async fn element_attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>> {
        Ok(self.element(element)?.attribute(name).await?)
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!(
                    session = %self.session_id,
                    "ChromiumDriver dropped without explicit release"
                );
            }
        }
    }
}
