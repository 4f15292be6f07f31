use std::fmt::Display;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{poll_until_present, Locator, NavError, Navigator, Snapshot};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/536.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/536.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:89.0) Gecko/20100101 Firefox/90.0",
];

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One Chrome instance with a single tab, driven over the DevTools protocol.
pub struct ChromeNavigator {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeNavigator {
    pub async fn launch(headful: bool) -> Result<Self, NavError> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let mut builder = BrowserConfig::builder().arg(format!("--user-agent={}", user_agent));
        if headful {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(NavError::Browser)?;

        let (browser, mut events) = Browser::launch(config).await.map_err(browser_err)?;
        // The protocol handler must be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("devtools event error: {}", e);
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(browser_err)?;
        info!(headful, "browser launched");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("failed to close browser: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        info!("browser closed");
    }
}

impl Navigator for ChromeNavigator {
    async fn load(&mut self, url: &str) -> Result<(), NavError> {
        debug!(url, "loading");
        self.page.goto(url).await.map_err(|e| NavError::Load {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn wait_for(&mut self, locator: Locator<'_>, timeout: Duration) -> Result<(), NavError> {
        poll_until_present(self, locator, timeout, POLL_INTERVAL).await
    }

    async fn click_tab(&mut self, visible_text: &str) -> Result<bool, NavError> {
        let Some(target) = self.snapshot().await?.link_href_by_text(visible_text) else {
            warn!(tab = visible_text, "tab not found, staying on current page");
            return Ok(false);
        };
        let links = self.page.find_elements("a").await.map_err(browser_err)?;
        for link in links {
            let text = link.inner_text().await.ok().flatten().unwrap_or_default();
            if text.contains(visible_text) {
                link.click().await.map_err(browser_err)?;
                debug!(tab = visible_text, href = %target, "clicked");
                return Ok(true);
            }
        }
        warn!(tab = visible_text, "tab link disappeared before it could be clicked");
        Ok(false)
    }

    async fn snapshot(&mut self) -> Result<Snapshot, NavError> {
        let html = self.page.content().await.map_err(browser_err)?;
        let url = self.current_url().await?;
        Ok(Snapshot::parse(&url, &html))
    }

    async fn current_url(&mut self) -> Result<String, NavError> {
        let url = self.page.url().await.map_err(browser_err)?;
        Ok(url.unwrap_or_default())
    }
}

fn browser_err(e: impl Display) -> NavError {
    NavError::Browser(e.to_string())
}
