//! Retrieves posting pages, rendering them in a browser when the site needs it.

pub mod browser;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{FetchError, FetchErrorKind};
use crate::extract::Strategy;
use crate::models::{PostingSource, Snapshot};
use browser::{BrowserBackend, Renderer, WebDriverBackend};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const MAX_REDIRECTS: usize = 8;

/// Page content as fetched. Never modified afterwards.
#[derive(Debug, Clone)]
pub struct RawFetchResult {
    pub html: String,
    /// Location after redirects, which may differ from the requested URL.
    pub final_url: Url,
    pub fetched_at: DateTime<Utc>,
    pub status: Option<u16>,
    pub rendered: bool,
}

impl RawFetchResult {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            html: self.html.clone(),
            final_url: self.final_url.to_string(),
            captured_at: self.fetched_at,
        }
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, source: PostingSource) -> Result<RawFetchResult, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub webdriver_url: String,
    pub render: bool,
    pub timeout: Duration,
    pub settle: Duration,
    pub max_sessions: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            render: true,
            timeout: Duration::from_secs(20),
            settle: Duration::from_secs(8),
            max_sessions: 3,
        }
    }
}

pub struct Fetcher {
    http: reqwest::Client,
    renderer: Option<Renderer>,
}

impl Fetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let backend = WebDriverBackend::new(&settings.webdriver_url, settings.timeout);
        Self::with_backend(settings, Arc::new(backend))
    }

    /// Builds a fetcher that renders through `backend` instead of a real WebDriver.
    pub fn with_backend(settings: &FetchSettings, backend: Arc<dyn BrowserBackend>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .context("Failed to create HTTP client")?;

        let renderer = settings.render.then(|| Renderer::new(backend, settings));
        Ok(Self { http, renderer })
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    async fn http_get(&self, url: &Url) -> Result<RawFetchResult, FetchError> {
        debug!(url = %url, "HTTP GET");
        let response = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        if is_blocking_status(status.as_u16()) {
            return Err(
                FetchError::new(FetchErrorKind::Blocked, url.as_str(), format!("HTTP {}", status))
                    .with_status(status.as_u16()),
            );
        }
        if !status.is_success() {
            return Err(
                FetchError::new(FetchErrorKind::HttpError, url.as_str(), format!("HTTP {}", status))
                    .with_status(status.as_u16()),
            );
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        Ok(RawFetchResult {
            html,
            final_url,
            fetched_at: Utc::now(),
            status: Some(status.as_u16()),
            rendered: false,
        })
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    async fn fetch(&self, url: &Url, source: PostingSource) -> Result<RawFetchResult, FetchError> {
        let result = match &self.renderer {
            Some(renderer) if source.needs_rendering() => {
                renderer.render(url, Strategy::for_source(source)).await
            }
            _ => self.http_get(url).await,
        };
        if let Ok(page) = &result {
            info!(
                url = %url,
                final_url = %page.final_url,
                rendered = page.rendered,
                bytes = page.html.len(),
                "page fetched"
            );
        }
        result
    }
}

/// Statuses job boards answer with when they refuse automated clients.
fn is_blocking_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 429 | 999)
}

fn classify_reqwest_error(url: &Url, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::timeout(url.as_str(), err.to_string())
    } else {
        FetchError::network(url.as_str(), err.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn response(status: &str, headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
            status,
            body.len(),
            headers,
            body
        )
    }

    /// Serves every connection with `route(path)`; `None` keeps the connection hanging.
    async fn serve(route: fn(&str) -> Option<String>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    match route(&path) {
                        Some(reply) => {
                            let _ = socket.write_all(reply.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                        None => tokio::time::sleep(Duration::from_secs(30)).await,
                    }
                });
            }
        });
        addr
    }

    fn fetcher(timeout: Duration) -> Fetcher {
        let settings = FetchSettings {
            render: false,
            timeout,
            ..Default::default()
        };
        Fetcher::new(&settings).unwrap()
    }

    fn url(addr: SocketAddr, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", addr, path)).unwrap()
    }

    #[tokio::test]
    async fn test_http_get_follows_redirects() {
        let addr = serve(|path| match path {
            "/start" => Some(response("302 Found", "Location: /posting\r\n", "")),
            "/posting" => Some(response("200 OK", "", "<html><title>Role</title></html>")),
            _ => Some(response("404 Not Found", "", "")),
        })
        .await;

        let page = fetcher(Duration::from_secs(5))
            .fetch(&url(addr, "/start"), PostingSource::Unknown)
            .await
            .unwrap();
        assert_eq!(page.final_url.path(), "/posting");
        assert_eq!(page.status, Some(200));
        assert!(!page.rendered);
        assert!(page.html.contains("<title>Role</title>"));
    }

    #[tokio::test]
    async fn test_refusal_statuses_are_blocked() {
        let addr = serve(|path| match path {
            "/forbidden" => Some(response("403 Forbidden", "", "no")),
            "/limited" => Some(response("429 Too Many Requests", "", "slow down")),
            _ => Some(response("999 Request denied", "", "")),
        })
        .await;
        let fetcher = fetcher(Duration::from_secs(5));

        for (path, status) in [("/forbidden", 403), ("/limited", 429), ("/other", 999)] {
            let err = fetcher
                .fetch(&url(addr, path), PostingSource::Unknown)
                .await
                .unwrap_err();
            assert_eq!(err.kind, FetchErrorKind::Blocked, "{path}");
            assert_eq!(err.status, Some(status));
        }
    }

    #[tokio::test]
    async fn test_server_error_is_http_error_with_status() {
        let addr = serve(|_| Some(response("503 Service Unavailable", "", "down"))).await;
        let err = fetcher(Duration::from_secs(5))
            .fetch(&url(addr, "/"), PostingSource::Unknown)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::HttpError);
        assert_eq!(err.status, Some(503));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let addr = serve(|_| None).await;
        let err = fetcher(Duration::from_millis(200))
            .fetch(&url(addr, "/"), PostingSource::Unknown)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let err = fetcher(Duration::from_secs(5))
            .fetch(&url(addr, "/"), PostingSource::Unknown)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn test_rendering_disabled_uses_http_for_job_boards() {
        let addr = serve(|_| Some(response("200 OK", "", "<p>plain</p>"))).await;
        let fetcher = fetcher(Duration::from_secs(5));
        assert!(fetcher.renderer().is_none());
        let page = fetcher
            .fetch(&url(addr, "/jobs/view/123456"), PostingSource::LinkedIn)
            .await
            .unwrap();
        assert!(!page.rendered);
    }
}
