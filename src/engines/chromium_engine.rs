// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::BrowserSettings;
use crate::engines::traits::{
    BrowserCookie, BrowserEngine, ElementHandle, EngineError, OpenPageRequest, PageHandle,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(200);
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Chromium 引擎
///
/// 基于 chromiumoxide 的浏览器自动化引擎。浏览器连接在首次打开页面时建立，
/// 之后所有任务共享同一连接，每次抓取使用独立的页面（标签页）
pub struct ChromiumEngine {
    settings: BrowserSettings,
    browser: OnceCell<Browser>,
}

impl ChromiumEngine {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            browser: OnceCell::new(),
        }
    }

    // Connects (or launches Chrome) only once per engine instance.
    async fn browser(&self) -> Result<&Browser, EngineError> {
        self.browser
            .get_or_try_init(|| async {
                let (browser, mut handler) = match &self.settings.remote_debugging_url {
                    Some(url) => {
                        tracing::info!("Connecting to remote Chrome instance at: {}", url);
                        Browser::connect(url).await.map_err(|e| {
                            EngineError::Browser(format!("Failed to connect to remote Chrome: {}", e))
                        })?
                    }
                    None => {
                        let config = BrowserConfig::builder()
                            .no_sandbox()
                            .request_timeout(self.settings.navigation_timeout())
                            .arg("--disable-gpu")
                            .arg("--disable-dev-shm-usage")
                            .build()
                            .map_err(EngineError::Browser)?;
                        tracing::info!("Launching local headless Chrome");
                        Browser::launch(config)
                            .await
                            .map_err(|e| EngineError::Browser(e.to_string()))?
                    }
                };

                // Spawn a handler to process browser events
                tokio::spawn(async move {
                    while let Some(h) = handler.next().await {
                        if h.is_err() {
                            break;
                        }
                    }
                });

                Ok(browser)
            })
            .await
    }

    async fn prepare_page(&self, page: &Page, request: &OpenPageRequest) -> Result<(), EngineError> {
        let user_agent = request
            .user_agent
            .as_deref()
            .or(self.settings.user_agent.as_deref());
        if let Some(ua) = user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| EngineError::Browser(e.to_string()))?;
        }

        let cookies = cookie_params(&request.url, &request.cookies);
        if !cookies.is_empty() {
            page.set_cookies(cookies)
                .await
                .map_err(|e| EngineError::Browser(format!("Failed to set cookies: {}", e)))?;
        }

        tokio::time::timeout(request.timeout, page.goto(&request.url))
            .await
            .map_err(|_| EngineError::Timeout(format!("navigation to {}", request.url)))?
            .map_err(|e| EngineError::Navigation(e.to_string()))?;

        if let Some(selector) = &request.wait_for_selector {
            wait_for_selector(page, selector, self.settings.element_timeout()).await?;
        }

        if self.settings.scroll_to_bottom {
            if let Err(e) = page.evaluate(SCROLL_SCRIPT).await {
                tracing::debug!(url = %request.url, error = %e, "Scroll to bottom failed");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_page(&self, request: OpenPageRequest) -> Result<Box<dyn PageHandle>, EngineError> {
        let browser = self.browser().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;

        if let Err(e) = self.prepare_page(&page, &request).await {
            if let Err(close_err) = page.close().await {
                tracing::debug!(error = %close_err, "Failed to close page after open error");
            }
            return Err(e);
        }

        Ok(Box::new(ChromiumPage {
            url: request.url,
            page,
        }))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> Result<(), EngineError> {
    let deadline = Instant::now() + timeout;
    loop {
        match page.find_elements(selector).await {
            Ok(elements) if !elements.is_empty() => return Ok(()),
            Ok(_) => {}
            Err(e) => tracing::trace!(selector = %selector, error = %e, "Selector poll failed"),
        }
        if Instant::now() >= deadline {
            return Err(EngineError::ElementNotFound(selector.to_string()));
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

fn cookie_params(url: &str, cookies: &[BrowserCookie]) -> Vec<CookieParam> {
    cookies
        .iter()
        .filter_map(|cookie| {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only);
            builder = if cookie.domain.is_empty() {
                builder.url(url)
            } else {
                builder.domain(cookie.domain.clone())
            };
            if !cookie.path.is_empty() {
                builder = builder.path(cookie.path.clone());
            }
            // solver cookies without expiry stay session cookies
            if let Some(expires) = cookie.expires.filter(|e| *e > 0.0) {
                builder = builder.expires(TimeSinceEpoch::new(expires));
            }
            match builder.build() {
                Ok(param) => Some(param),
                Err(e) => {
                    tracing::warn!(cookie = %cookie.name, error = %e, "Skipping invalid cookie");
                    None
                }
            }
        })
        .collect()
}

struct ChromiumPage {
    url: String,
    page: Page,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, EngineError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| EngineError::ElementNotFound(format!("{}: {}", selector, e)))?;
        Ok(wrap_elements(elements))
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        self.page
            .close()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))
    }
}

struct ChromiumElement {
    element: Element,
}

fn wrap_elements(elements: Vec<Element>) -> Vec<Box<dyn ElementHandle>> {
    elements
        .into_iter()
        .map(|element| Box::new(ChromiumElement { element }) as Box<dyn ElementHandle>)
        .collect()
}

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn find(&self, selector: &str) -> Result<Option<Box<dyn ElementHandle>>, EngineError> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, EngineError> {
        // An empty match set surfaces as an error on some pages; treat it as no match.
        match self.element.find_elements(selector).await {
            Ok(elements) => Ok(wrap_elements(elements)),
            Err(e) => {
                tracing::trace!(selector = %selector, error = %e, "Sub-element query failed");
                Ok(Vec::new())
            }
        }
    }

    async fn text_content(&self) -> Result<String, EngineError> {
        self.element
            .inner_text()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| EngineError::Browser(e.to_string()))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, EngineError> {
        self.element
            .attribute(name)
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))
    }

    async fn outer_html(&self) -> Result<String, EngineError> {
        self.element
            .outer_html()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| EngineError::Browser(e.to_string()))
    }
}
