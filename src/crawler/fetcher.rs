//! Page fetcher capability and its HTTP implementation
//!
//! This module defines what the crawler needs from a page source:
//! - Loading a URL and reading back the rendered HTML
//! - Activating a control (a "next" link or button)
//! - Waiting for a selector to appear
//! - Dismissing overlays such as cookie banners
//!
//! Two implementations exist: plain HTTP requests here, and a Chromium
//! session in `browser.rs`. Each worker owns one session for its whole life.

use crate::config::{Engine, PortalConfig};
use crate::crawler::browser::BrowserSessionFactory;
use crate::crawler::parser::first_href;
use crate::url::resolve_link;
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// A fetched page: final URL after redirects and its HTML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub url: String,
    pub html: String,
}

impl PageContent {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn parsed_url(&self) -> Result<Url, FetchError> {
        Url::parse(&self.url).map_err(|e| FetchError::Transport {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Returns true if `selector` matches anything on the page
    pub fn has_match(&self, selector: &str) -> bool {
        match Selector::parse(selector) {
            Ok(selector) => self.document().select(&selector).next().is_some(),
            Err(_) => false,
        }
    }
}

/// One page session
///
/// Methods take `&mut self`: a session is never used by two tasks at once.
#[async_trait]
pub trait PageFetcher: Send {
    /// Navigates to `url` and returns the loaded page
    async fn fetch(&mut self, url: &str) -> FetchResult<PageContent>;

    /// Activates the first element matching `selector` (click or follow)
    async fn activate(&mut self, selector: &str) -> FetchResult<()>;

    /// Waits up to `timeout` for `selector` to match; returns whether it did
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> FetchResult<bool>;

    /// The page as it currently stands, without navigating
    async fn current(&mut self) -> FetchResult<PageContent>;

    /// Closes cookie banners and similar overlays; returns true if one was closed
    async fn dismiss_overlays(&mut self) -> FetchResult<bool> {
        Ok(false)
    }

    /// Clicks controls that reveal hidden profile details; returns true if one was clicked
    async fn reveal_details(&mut self) -> FetchResult<bool> {
        Ok(false)
    }

    /// Releases the session
    async fn close(&mut self) -> FetchResult<()>;
}

/// Opens page sessions for one run
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open_session(&self) -> FetchResult<Box<dyn PageFetcher>>;

    /// Releases resources shared by all sessions
    async fn shutdown(&self) {}
}

/// Builds an HTTP client with the portal's user agent and timeouts
///
/// # Example
///
/// ```
/// use portal_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("Mozilla/5.0", Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Session backed by plain HTTP requests
///
/// Pages are static, so waiting degenerates to a single check and activating
/// a control means following its `href`.
pub struct HttpFetcher {
    client: Client,
    page: Option<PageContent>,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client, page: None }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&mut self, url: &str) -> FetchResult<PageContent> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let page = PageContent::new(final_url, html);
        self.page = Some(page.clone());
        Ok(page)
    }

    async fn activate(&mut self, selector: &str) -> FetchResult<()> {
        let page = self.current().await?;
        let base = page.parsed_url()?;

        // Html is not Send; it must be gone before the next await
        let href = {
            let document = page.document();
            first_href(&document, selector)
        };

        let target = match href.and_then(|href| resolve_link(&base, &href)) {
            Some(target) => target,
            None if page.has_match(selector) => {
                return Err(FetchError::Unsupported(format!(
                    "'{}' has no followable link",
                    selector
                )))
            }
            None => {
                return Err(FetchError::ElementNotFound {
                    selector: selector.to_string(),
                })
            }
        };

        self.fetch(target.as_str()).await.map(|_| ())
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> FetchResult<bool> {
        Ok(self
            .page
            .as_ref()
            .map_or(false, |page| page.has_match(selector)))
    }

    async fn current(&mut self) -> FetchResult<PageContent> {
        self.page
            .clone()
            .ok_or_else(|| FetchError::Unsupported("no page loaded yet".to_string()))
    }

    async fn close(&mut self) -> FetchResult<()> {
        self.page = None;
        Ok(())
    }
}

fn classify_reqwest_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = e.status() {
        FetchError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Hands out HTTP sessions sharing one connection pool
pub struct HttpSessionFactory {
    client: Client,
}

impl HttpSessionFactory {
    pub fn new(portal: &PortalConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(&portal.user_agent, portal.page_timeout())?,
        })
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open_session(&self) -> FetchResult<Box<dyn PageFetcher>> {
        Ok(Box::new(HttpFetcher::new(self.client.clone())))
    }
}

/// Picks the session factory for the portal's engine
pub async fn create_session_factory(
    portal: &PortalConfig,
    headless: bool,
) -> crate::Result<Arc<dyn SessionFactory>> {
    match portal.engine {
        Engine::Requests => {
            info!("Using HTTP fetcher");
            Ok(Arc::new(HttpSessionFactory::new(portal)?))
        }
        Engine::Browser => {
            info!("Launching Chromium (headless: {})", headless);
            Ok(Arc::new(BrowserSessionFactory::launch(portal, headless).await?))
        }
    }
}
