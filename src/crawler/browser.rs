//! Chromium-backed page sessions
//!
//! One browser process is launched per run; every session is a tab in it.
//! Portal quirks such as cookie consent banners and "show website" buttons
//! are handled here so the crawler never has to know about them.

use crate::config::PortalConfig;
use crate::crawler::fetcher::{PageContent, PageFetcher, SessionFactory};
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::future::Future;
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Interval between selector checks while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Time given to a page to react after an overlay click
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Launches Chromium once and opens one tab per session
pub struct BrowserSessionFactory {
    browser: Mutex<Browser>,
    handler: StdMutex<Option<JoinHandle<()>>>,
    settings: SessionSettings,
}

/// Per-portal settings every tab is opened with
#[derive(Debug, Clone)]
struct SessionSettings {
    user_agent: String,
    timeout: Duration,
    cookie_banner: Option<String>,
    website_button: Option<String>,
}

impl BrowserSessionFactory {
    pub async fn launch(portal: &PortalConfig, headless: bool) -> FetchResult<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(portal.page_timeout());
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(FetchError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler: StdMutex::new(Some(handler)),
            settings: SessionSettings {
                user_agent: portal.user_agent.clone(),
                timeout: portal.page_timeout(),
                cookie_banner: portal.cookie_banner.clone(),
                website_button: portal.website_button.clone(),
            },
        })
    }
}

#[async_trait]
impl SessionFactory for BrowserSessionFactory {
    async fn open_session(&self) -> FetchResult<Box<dyn PageFetcher>> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?
        };

        page.set_user_agent(self.settings.user_agent.clone())
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        Ok(Box::new(BrowserFetcher {
            page: Some(page),
            settings: self.settings.clone(),
        }))
    }

    async fn shutdown(&self) {
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Browser process did not exit cleanly: {}", e);
            }
        }

        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handler) = handler {
            handler.abort();
        }
    }
}

/// A single browser tab
pub struct BrowserFetcher {
    page: Option<Page>,
    settings: SessionSettings,
}

impl BrowserFetcher {
    fn page(&self) -> FetchResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| FetchError::Browser("session already closed".to_string()))
    }

    /// Runs `fut` under the page timeout
    async fn bounded<T, F>(&self, url: &str, fut: F) -> FetchResult<T>
    where
        F: Future<Output = Result<T, CdpError>> + Send,
    {
        match tokio::time::timeout(self.settings.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    /// Clicks the first match of `selector`, if present
    async fn click_if_present(&self, selector: &str) -> FetchResult<bool> {
        let page = self.page()?;
        let element = match page.find_element(selector).await {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };

        if let Err(e) = element.click().await {
            debug!("Click on '{}' failed: {}", selector, e);
            return Ok(false);
        }

        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(true)
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&mut self, url: &str) -> FetchResult<PageContent> {
        debug!("Navigating to {}", url);
        let page = self.page()?.clone();

        self.bounded(url, async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        })
        .await?;

        self.current().await
    }

    async fn activate(&mut self, selector: &str) -> FetchResult<()> {
        let page = self.page()?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| FetchError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        // A detached node shows up as a click error; treat it like a missing one
        element
            .click()
            .await
            .map_err(|_| FetchError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> FetchResult<bool> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;

        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current(&mut self) -> FetchResult<PageContent> {
        let page = self.page()?.clone();
        let (url, html) = self
            .bounded("current page", async {
                let url = page.url().await?.unwrap_or_default();
                let html = page.content().await?;
                Ok::<_, CdpError>((url, html))
            })
            .await?;

        Ok(PageContent::new(url, html))
    }

    async fn dismiss_overlays(&mut self) -> FetchResult<bool> {
        match self.settings.cookie_banner.clone() {
            Some(selector) => {
                let dismissed = self.click_if_present(&selector).await?;
                if dismissed {
                    debug!("Dismissed cookie banner");
                }
                Ok(dismissed)
            }
            None => Ok(false),
        }
    }

    async fn reveal_details(&mut self) -> FetchResult<bool> {
        match self.settings.website_button.clone() {
            Some(selector) => self.click_if_present(&selector).await,
            None => Ok(false),
        }
    }

    async fn close(&mut self) -> FetchResult<()> {
        if let Some(page) = self.page.take() {
            page.close()
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?;
        }
        Ok(())
    }
}
