//! Browser rendering for job boards that build their pages client-side.
//!
//! Sessions come from a fixed-size pool. A session is closed on every exit
//! path, including a deadline or cancellation that lands while the session is
//! still opening. A panic in the driving code is resumed after the close, and
//! a cancelled caller hands the close to a background task.

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, warn};
use url::Url;

use super::{FetchSettings, RawFetchResult};
use crate::error::FetchError;
use crate::extract::Strategy;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const EXPAND_PAUSE: Duration = Duration::from_millis(750);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait BrowserBackend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, FetchError>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &Url) -> Result<(), FetchError>;
    /// True when any of `selectors` matches an element on the current page.
    async fn has_any(&self, selectors: &[&str]) -> Result<bool, FetchError>;
    /// Clicks every element matching `selectors`; returns how many clicks landed.
    async fn click_all(&self, selectors: &[&str]) -> Result<usize, FetchError>;
    async fn current_url(&self) -> Result<Url, FetchError>;
    async fn source(&self) -> Result<String, FetchError>;
    async fn close(&self) -> Result<(), FetchError>;
}

pub struct Renderer {
    backend: Arc<dyn BrowserBackend>,
    slots: Arc<Semaphore>,
    max_sessions: usize,
    timeout: Duration,
    settle: Duration,
}

impl Renderer {
    pub fn new(backend: Arc<dyn BrowserBackend>, settings: &FetchSettings) -> Self {
        let max_sessions = settings.max_sessions.max(1);
        Self {
            backend,
            slots: Arc::new(Semaphore::new(max_sessions)),
            max_sessions,
            timeout: settings.timeout,
            settle: settings.settle,
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Slots not currently held by a live session.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub async fn render(&self, url: &Url, strategy: Strategy) -> Result<RawFetchResult, FetchError> {
        // One deadline for pool wait, session open and page driving.
        let deadline = Instant::now() + self.timeout;
        let timed_out = || {
            FetchError::timeout(url.as_str(), format!("page not captured within {:?}", self.timeout))
        };

        let permit = match timeout_at(deadline, Arc::clone(&self.slots).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(FetchError::network(url.as_str(), "browser pool closed")),
            Err(_) => return Err(timed_out()),
        };

        let mut guard = match timeout_at(deadline, open_session(Arc::clone(&self.backend), permit)).await {
            Ok(Ok(Ok(guard))) => guard,
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(_)) => return Err(FetchError::network(url.as_str(), "browser session task ended")),
            Err(_) => return Err(timed_out()),
        };
        let session = guard.session();

        let driving = AssertUnwindSafe(drive(session.as_ref(), url, strategy, self.settle)).catch_unwind();
        let outcome = timeout_at(deadline, driving).await;
        guard.close().await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => std::panic::resume_unwind(panic),
            Err(_) => {
                warn!(url = %url, "browser render hit the deadline");
                Err(timed_out())
            }
        }
    }
}

/// Opens a session in its own task, which holds the pool slot. If the caller
/// stops waiting, the task closes the late session before freeing the slot.
fn open_session(
    backend: Arc<dyn BrowserBackend>,
    permit: OwnedSemaphorePermit,
) -> oneshot::Receiver<Result<SessionGuard, FetchError>> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        match backend.open().await {
            Ok(session) => {
                let guard = SessionGuard::new(Arc::from(session), permit);
                if let Err(Ok(mut orphan)) = tx.send(Ok(guard)) {
                    debug!("session opened after the caller gave up, closing it");
                    orphan.close().await;
                }
            }
            Err(e) => {
                drop(permit);
                let _ = tx.send(Err(e));
            }
        }
    });
    rx
}

async fn drive(
    session: &dyn BrowserSession,
    url: &Url,
    strategy: Strategy,
    settle: Duration,
) -> Result<RawFetchResult, FetchError> {
    session.goto(url).await?;

    let ready = wait_until_ready(session, strategy.ready_selectors(), settle).await?;
    if !ready {
        debug!(url = %url, strategy = %strategy, "no ready selector appeared, capturing anyway");
    }

    let expanded = session.click_all(strategy.expand_selectors()).await?;
    if expanded > 0 {
        debug!(clicked = expanded, "expanded collapsed sections");
        sleep(EXPAND_PAUSE).await;
    }

    let final_url = session.current_url().await?;
    let html = session.source().await?;
    Ok(RawFetchResult {
        html,
        final_url,
        fetched_at: Utc::now(),
        status: None,
        rendered: true,
    })
}

async fn wait_until_ready(
    session: &dyn BrowserSession,
    selectors: &[&str],
    settle: Duration,
) -> Result<bool, FetchError> {
    let until = Instant::now() + settle;
    loop {
        if session.has_any(selectors).await? {
            return Ok(true);
        }
        if Instant::now() >= until {
            return Ok(false);
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Owns a live session and its pool slot until the session is closed.
struct SessionGuard {
    session: Arc<dyn BrowserSession>,
    permit: Option<OwnedSemaphorePermit>,
}

impl SessionGuard {
    fn new(session: Arc<dyn BrowserSession>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            session,
            permit: Some(permit),
        }
    }

    fn session(&self) -> Arc<dyn BrowserSession> {
        Arc::clone(&self.session)
    }

    async fn close(&mut self) {
        if let Some(permit) = self.permit.take() {
            close_session(self.session.as_ref()).await;
            drop(permit);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        let session = Arc::clone(&self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    close_session(session.as_ref()).await;
                    drop(permit);
                });
            }
            Err(_) => warn!("browser session dropped outside a runtime; it was not closed"),
        }
    }
}

async fn close_session(session: &dyn BrowserSession) {
    match timeout(CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "failed to close browser session"),
        Err(_) => warn!("browser session close timed out"),
    }
}

/// Chrome sessions through a WebDriver server such as chromedriver.
pub struct WebDriverBackend {
    server_url: String,
    page_load_timeout: Duration,
}

impl WebDriverBackend {
    pub fn new(server_url: &str, page_load_timeout: Duration) -> Self {
        Self {
            server_url: server_url.to_string(),
            page_load_timeout,
        }
    }
}

fn driver_error(url: &str, err: WebDriverError) -> FetchError {
    FetchError::network(url, format!("webdriver: {}", err))
}

#[async_trait]
impl BrowserBackend for WebDriverBackend {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, FetchError> {
        let server = self.server_url.as_str();
        let mut caps = DesiredCapabilities::chrome();
        caps.set_headless().map_err(|e| driver_error(server, e))?;
        for arg in ["--no-sandbox", "--disable-dev-shm-usage", "--window-size=1280,2000"] {
            caps.add_arg(arg).map_err(|e| driver_error(server, e))?;
        }

        let driver = WebDriver::new(server, caps)
            .await
            .map_err(|e| driver_error(server, e))?;
        if let Err(e) = driver.set_page_load_timeout(self.page_load_timeout).await {
            let _ = driver.clone().quit().await;
            return Err(driver_error(server, e));
        }
        debug!(server = server, "browser session opened");
        Ok(Box::new(WebDriverSession { driver }))
    }
}

struct WebDriverSession {
    driver: WebDriver,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &Url) -> Result<(), FetchError> {
        self.driver
            .goto(url.as_str())
            .await
            .map_err(|e| driver_error(url.as_str(), e))
    }

    async fn has_any(&self, selectors: &[&str]) -> Result<bool, FetchError> {
        for selector in selectors {
            match self.driver.find_all(By::Css(*selector)).await {
                Ok(found) if !found.is_empty() => return Ok(true),
                Ok(_) => {}
                Err(e) => debug!(selector = *selector, error = %e, "selector probe failed"),
            }
        }
        Ok(false)
    }

    async fn click_all(&self, selectors: &[&str]) -> Result<usize, FetchError> {
        let mut clicked = 0;
        for selector in selectors {
            let Ok(elements) = self.driver.find_all(By::Css(*selector)).await else {
                continue;
            };
            for element in elements {
                match element.click().await {
                    Ok(()) => clicked += 1,
                    Err(e) => debug!(selector = *selector, error = %e, "click did not land"),
                }
            }
        }
        Ok(clicked)
    }

    async fn current_url(&self) -> Result<Url, FetchError> {
        let current = self
            .driver
            .current_url()
            .await
            .map_err(|e| driver_error("current_url", e))?;
        Url::parse(current.as_str()).map_err(|e| FetchError::network(current.as_str(), e.to_string()))
    }

    async fn source(&self) -> Result<String, FetchError> {
        self.driver
            .source()
            .await
            .map_err(|e| driver_error("page source", e))
    }

    async fn close(&self) -> Result<(), FetchError> {
        self.driver
            .clone()
            .quit()
            .await
            .map_err(|e| driver_error("quit", e))
    }
}
