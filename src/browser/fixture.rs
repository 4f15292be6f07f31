//! In-memory navigator serving HTML fixtures by URL.

use std::collections::HashMap;
use std::time::Duration;

use super::{Locator, NavError, Navigator, Snapshot};

#[derive(Default)]
pub struct FixtureNavigator {
    pages: HashMap<String, String>,
    current: Option<String>,
    /// Every URL passed to `load`, in order, including failed ones.
    pub loads: Vec<String>,
}

impl FixtureNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    /// Serve `tests/fixtures/<name>.html` at `url`.
    pub fn fixture(self, url: &str, name: &str) -> Self {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        self.page(url, html)
    }

    pub fn loads_matching(&self, needle: &str) -> usize {
        self.loads.iter().filter(|u| u.contains(needle)).count()
    }

    fn current_snapshot(&self) -> Option<Snapshot> {
        let url = self.current.as_ref()?;
        let html = self.pages.get(url)?;
        Some(Snapshot::parse(url, html))
    }
}

impl Navigator for FixtureNavigator {
    async fn load(&mut self, url: &str) -> Result<(), NavError> {
        self.loads.push(url.to_string());
        if !self.pages.contains_key(url) {
            return Err(NavError::Load {
                url: url.to_string(),
                reason: "404".into(),
            });
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_for(&mut self, locator: Locator<'_>, timeout: Duration) -> Result<(), NavError> {
        match self.current_snapshot() {
            Some(snap) if snap.exists(locator) => Ok(()),
            _ => Err(NavError::Timeout {
                locator: locator.to_string(),
                timeout,
            }),
        }
    }

    async fn click_tab(&mut self, visible_text: &str) -> Result<bool, NavError> {
        let target = self
            .current_snapshot()
            .and_then(|snap| snap.link_href_by_text(visible_text));
        match target {
            Some(url) => {
                self.load(&url).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn snapshot(&mut self) -> Result<Snapshot, NavError> {
        self.current_snapshot()
            .ok_or_else(|| NavError::Browser("no page loaded".into()))
    }

    async fn current_url(&mut self) -> Result<String, NavError> {
        Ok(self.current.clone().unwrap_or_default())
    }
}
