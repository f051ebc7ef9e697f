use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::collectors::politeness::Politeness;
use crate::collectors::{AuthOutcome, BrowserSession, PageFactory, PageHandle, Timeouts};
use crate::config::Credentials;
use crate::error::ScrapeError;

const VIEWPORT_WIDTH: u32 = 1920;
const VIEWPORT_HEIGHT: u32 = 1080;

/// Applied before any site script runs on every page we open.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
"#;

// Login form locators, most specific first.
const EMAIL_FIELDS: &[&str] = &[
    "#usernameField",
    "input[type='email']",
    "input[name='email']",
    "input[placeholder*='Email']",
    "input[type='text']",
];
const PASSWORD_FIELDS: &[&str] = &["#passwordField", "input[type='password']", "input[name='password']"];
const SUBMIT_BUTTONS: &[&str] = &["button[type='submit']", "button.loginButton", "input[type='submit']"];
const LOGGED_IN_MARKERS: &[&str] = &[
    ".nI-gNb-drawer__icon",
    ".view-profile-wrapper",
    "a[href*='mnjuser/profile']",
    "img[alt*='profile' i]",
];

/// Resolves once the page's resource count stops changing, or after
/// `timeoutMs`. Always resolves; the outcome is only logged.
const NETWORK_IDLE_SCRIPT: &str = r#"(async (timeoutMs) => {
    const start = Date.now();
    const count = () => { try { return performance.getEntriesByType('resource').length; } catch (_) { return 0; } };
    let last = count();
    let stable = 0;
    while (Date.now() - start < timeoutMs) {
        await new Promise(r => setTimeout(r, 250));
        const cur = count();
        if (document.readyState === 'complete' && cur === last) {
            stable += 250;
            if (stable >= 500) return true;
        } else {
            stable = 0;
        }
        last = cur;
    }
    return false;
})"#;

/// A chromiumoxide tab behind the pipeline's page seam.
pub struct BrowserPage {
    page: Page,
    idle_timeout: Duration,
}

impl BrowserPage {
    async fn wait_for_network_idle(&self) {
        let ms = self.idle_timeout.as_millis();
        match self
            .page
            .evaluate_expression(format!("{NETWORK_IDLE_SCRIPT}({ms})"))
            .await
        {
            Ok(result) => {
                if !result.into_value::<bool>().unwrap_or(false) {
                    tracing::debug!("Network did not go idle within {ms}ms");
                }
            }
            Err(e) => tracing::debug!("Network idle check failed: {e}"),
        }
    }

    async fn find_first(&self, selectors: &[&str]) -> Option<Element> {
        for selector in selectors {
            if let Ok(el) = self.page.find_element(*selector).await {
                return Some(el);
            }
        }
        None
    }
}

#[async_trait]
impl PageHandle for BrowserPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Err(_) => Err(ScrapeError::Timeout {
                url: url.to_string(),
            }),
            Ok(Err(e)) => Err(ScrapeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Ok(Ok(_)) => {
                self.wait_for_network_idle().await;
                Ok(())
            }
        }
    }

    async fn html(&self) -> Result<String, ScrapeError> {
        Ok(self.page.content().await?)
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.page.close().await {
            tracing::debug!("Failed to close page: {e}");
        }
    }
}

/// Owns the browser process, its CDP handler task and the primary listing page.
pub struct Session {
    headless: bool,
    politeness: Politeness,
    timeouts: Timeouts,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    page: Option<BrowserPage>,
}

impl Session {
    pub fn new(headless: bool, politeness: &Politeness, timeouts: &Timeouts) -> Self {
        Self {
            headless,
            politeness: politeness.clone(),
            timeouts: timeouts.clone(),
            browser: None,
            handler_task: None,
            page: None,
        }
    }

    fn browser_page(&self) -> Result<&BrowserPage, ScrapeError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::Browser("session not initialized".to_string()))
    }

    async fn open_browser_page(&self, user_agent: &str) -> Result<BrowserPage, ScrapeError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| ScrapeError::Browser("session not initialized".to_string()))?;
        let page = browser.new_page("about:blank").await?;
        page.execute(SetUserAgentOverrideParams::new(user_agent)).await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await?;
        Ok(BrowserPage {
            page,
            idle_timeout: self.timeouts.network_idle(),
        })
    }

    async fn login(&self, credentials: &Credentials, login_url: &str) -> Result<bool, ScrapeError> {
        let page = self.browser_page()?;
        page.goto(login_url, self.timeouts.navigation()).await?;

        let email = page
            .find_first(EMAIL_FIELDS)
            .await
            .ok_or_else(|| ScrapeError::Browser("login field not found".to_string()))?;
        self.type_slowly(&email, &credentials.email).await?;

        let password = page
            .find_first(PASSWORD_FIELDS)
            .await
            .ok_or_else(|| ScrapeError::Browser("password field not found".to_string()))?;
        self.type_slowly(&password, &credentials.password).await?;

        match page.find_first(SUBMIT_BUTTONS).await {
            Some(button) => {
                button.click().await?;
            }
            None => {
                password.press_key("Enter").await?;
            }
        }

        let deadline = Instant::now() + self.timeouts.login_marker();
        loop {
            if page.find_first(LOGGED_IN_MARKERS).await.is_some() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.timeouts.poll_interval()).await;
        }
    }

    async fn type_slowly(&self, field: &Element, text: &str) -> Result<(), ScrapeError> {
        field.click().await?;
        for ch in text.chars() {
            field.type_str(ch.to_string()).await?;
            Politeness::pause(self.politeness.keystroke_delay()).await;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for Session {
    async fn initialize(&mut self) -> Result<(), ScrapeError> {
        let user_agent = self.politeness.user_agent().to_string();
        let mut builder = BrowserConfig::builder()
            .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .viewport(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                ..Default::default()
            })
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg(format!("--user-agent={user_agent}"));
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ScrapeError::Browser)?;

        tracing::info!(headless = self.headless, "Launching browser");
        let (browser, mut handler) = Browser::launch(config).await?;
        self.handler_task = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error: {e}");
                }
            }
        }));
        self.browser = Some(browser);

        let page = self.open_browser_page(&user_agent).await?;
        self.page = Some(page);
        Ok(())
    }

    async fn authenticate(&self, credentials: Option<&Credentials>, login_url: &str) -> AuthOutcome {
        let Some(credentials) = credentials else {
            tracing::info!("No credentials configured, continuing without login");
            return AuthOutcome::NotAttempted;
        };

        match self.login(credentials, login_url).await {
            Ok(true) => {
                tracing::info!("Logged in");
                AuthOutcome::Authenticated
            }
            Ok(false) => {
                tracing::warn!("Login marker never appeared, continuing without login");
                AuthOutcome::Failed
            }
            Err(e) => {
                tracing::warn!("Login failed, continuing without login: {e}");
                AuthOutcome::Failed
            }
        }
    }

    fn primary_page(&self) -> Result<&dyn PageHandle, ScrapeError> {
        Ok(self.browser_page()?)
    }

    async fn shutdown(&mut self) {
        if let Some(page) = self.page.take() {
            Box::new(page).close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser: {e}");
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("Failed to reap browser process: {e}");
            }
            tracing::info!("Browser closed");
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl PageFactory for Session {
    async fn open_page(&self, user_agent: &str) -> Result<Box<dyn PageHandle>, ScrapeError> {
        let page = self.open_browser_page(user_agent).await?;
        Ok(Box::new(page))
    }
}
