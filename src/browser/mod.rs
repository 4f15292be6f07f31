//! Browser-facing seam: page navigation plus parsed DOM snapshots.
//!
//! Extraction code never talks to the browser directly. It drives a
//! [`Navigator`] and reads the rendered page through a [`Snapshot`].

pub mod chrome;
#[cfg(test)]
pub mod fixture;

use std::fmt;
use std::time::{Duration, Instant};

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::text::collapse_whitespace;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("timed out after {timeout:?} waiting for {locator}")]
    Timeout { locator: String, timeout: Duration },
    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },
    #[error("browser error: {0}")]
    Browser(String),
}

/// How an element is found on the page.
#[derive(Debug, Clone, Copy)]
pub enum Locator<'a> {
    Css(&'a str),
    /// An `<a>` whose visible text contains the given substring.
    LinkText(&'a str),
}

impl fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "css `{}`", css),
            Locator::LinkText(text) => write!(f, "link text `{}`", text),
        }
    }
}

pub trait Navigator {
    /// Open `url` and wait for the page load to finish.
    async fn load(&mut self, url: &str) -> Result<(), NavError>;

    /// Wait until `locator` matches, or fail with [`NavError::Timeout`].
    async fn wait_for(&mut self, locator: Locator<'_>, timeout: Duration) -> Result<(), NavError>;

    /// Click the first link whose visible text contains `visible_text`.
    /// Returns `Ok(false)` when there is no such link.
    async fn click_tab(&mut self, visible_text: &str) -> Result<bool, NavError>;

    async fn snapshot(&mut self) -> Result<Snapshot, NavError>;

    async fn current_url(&mut self) -> Result<String, NavError>;
}

/// Re-snapshot `nav` every `interval` until `locator` matches. A failed
/// snapshot counts as not present yet; only the deadline ends the wait.
pub async fn poll_until_present<N: Navigator>(
    nav: &mut N,
    locator: Locator<'_>,
    timeout: Duration,
    interval: Duration,
) -> Result<(), NavError> {
    let start = Instant::now();
    loop {
        match nav.snapshot().await {
            Ok(snap) if snap.exists(locator) => return Ok(()),
            Ok(_) => {}
            Err(e) => debug!(%locator, "snapshot failed while waiting: {}", e),
        }
        if start.elapsed() >= timeout {
            return Err(NavError::Timeout {
                locator: locator.to_string(),
                timeout,
            });
        }
        tokio::time::sleep(interval).await;
    }
}

/// Parsed copy of the rendered DOM at one point in time.
pub struct Snapshot {
    url: Option<Url>,
    html: Html,
}

impl Snapshot {
    pub fn parse(url: &str, html: &str) -> Self {
        Self {
            url: Url::parse(url).ok(),
            html: Html::parse_document(html),
        }
    }

    pub fn exists(&self, locator: Locator<'_>) -> bool {
        match locator {
            Locator::Css(css) => !self.select(css).is_empty(),
            Locator::LinkText(text) => self.link_by_text(text).is_some(),
        }
    }

    /// All elements matching `css`. An invalid selector matches nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(sel) => self.html.select(&sel).collect(),
            Err(e) => {
                debug!(selector = css, "invalid selector: {}", e);
                Vec::new()
            }
        }
    }

    /// Visible text of the first element matching `css`, or `None`.
    pub fn safe_text(&self, css: &str) -> Option<String> {
        self.select(css).first().map(|el| element_text(*el))
    }

    /// Absolute `href`s of every element matching `css`.
    pub fn hrefs(&self, css: &str) -> Vec<String> {
        self.select(css)
            .into_iter()
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| self.resolve(href))
            .collect()
    }

    pub fn link_href_by_text(&self, text: &str) -> Option<String> {
        self.link_by_text(text)
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| self.resolve(href))
    }

    /// Text of the `<p>` that follows a `<label>` whose text contains `label`.
    pub fn labelled_value(&self, label: &str) -> Option<String> {
        self.select("label")
            .into_iter()
            .filter(|el| el.text().collect::<String>().contains(label))
            .find_map(|el| next_sibling_named(el, "p"))
            .map(element_text)
    }

    /// Text of the first `<div>` sibling after the element matching `heading_css`.
    pub fn following_div_text(&self, heading_css: &str) -> Option<String> {
        self.select(heading_css)
            .into_iter()
            .find_map(|el| next_sibling_named(el, "div"))
            .map(|el| el.text().collect::<String>())
    }

    fn link_by_text(&self, text: &str) -> Option<ElementRef<'_>> {
        self.select("a")
            .into_iter()
            .find(|el| el.text().collect::<String>().contains(text))
    }

    fn resolve(&self, href: &str) -> Option<String> {
        match &self.url {
            Some(base) => base.join(href).ok().map(String::from),
            None => Url::parse(href).ok().map(String::from),
        }
    }
}

/// Descendants of `el` matching `css`. An invalid selector matches nothing.
pub fn select_within<'a>(el: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => el.select(&sel).collect(),
        Err(e) => {
            debug!(selector = css, "invalid selector: {}", e);
            Vec::new()
        }
    }
}

/// Whitespace-collapsed text content of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Text nodes that are direct children of `el`, ignoring nested markup.
pub fn own_text(el: ElementRef<'_>) -> String {
    let own: String = el
        .children()
        .filter_map(|n| n.value().as_text().map(|t| String::from(&**t)))
        .collect();
    collapse_whitespace(&own)
}

fn next_sibling_named<'a>(el: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sib| sib.value().name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <main class="main-content">
          <h1 class="h3 js-title">  Crop
             Insurance Rule </h1>
          <ul>
            <li><label>Docket ID <span>?</span></label><p> FCIC-21-0007 </p></li>
            <li><label>RIN</label><p>0563-AC73</p></li>
          </ul>
          <h2 class="section-heading">Comment</h2>
          <span>noise</span>
          <div>First line<br>second   line</div>
          <div>not this one</div>
          <a href="/docket/FCIC-21-0007/document">Docket Documents</a>
          <a href="https://example.org/x.htm">Elsewhere</a>
        </main>
    </body></html>"#;

    fn snap() -> Snapshot {
        Snapshot::parse("https://www.regulations.gov/docket/FCIC-21-0007", PAGE)
    }

    #[test]
    fn safe_text_collapses_or_returns_none() {
        let s = snap();
        assert_eq!(s.safe_text("h1.js-title").as_deref(), Some("Crop Insurance Rule"));
        assert_eq!(s.safe_text("p.missing"), None);
        assert_eq!(s.safe_text("[[[bad"), None);
    }

    #[test]
    fn labelled_values() {
        let s = snap();
        assert_eq!(s.labelled_value("Docket ID").as_deref(), Some("FCIC-21-0007"));
        assert_eq!(s.labelled_value("RIN").as_deref(), Some("0563-AC73"));
        assert_eq!(s.labelled_value("Agency"), None);
    }

    #[test]
    fn following_div_skips_other_siblings() {
        let s = snap();
        let body = s.following_div_text("h2.section-heading").unwrap();
        assert_eq!(collapse_whitespace(&body), "First linesecond line");
    }

    #[test]
    fn links_resolve_against_page_url() {
        let s = snap();
        assert_eq!(
            s.link_href_by_text("Docket Documents").as_deref(),
            Some("https://www.regulations.gov/docket/FCIC-21-0007/document")
        );
        assert!(s.exists(Locator::LinkText("Elsewhere")));
        assert!(!s.exists(Locator::LinkText("Unified Agenda")));
        let all = s.hrefs("main a");
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], "https://example.org/x.htm");
    }

    /// Fails the first `failures` snapshots, then serves `PAGE`.
    struct FlakyNavigator {
        failures: usize,
        snapshots: usize,
    }

    impl Navigator for FlakyNavigator {
        async fn load(&mut self, _url: &str) -> Result<(), NavError> {
            Ok(())
        }

        async fn wait_for(&mut self, locator: Locator<'_>, timeout: Duration) -> Result<(), NavError> {
            poll_until_present(self, locator, timeout, Duration::from_millis(5)).await
        }

        async fn click_tab(&mut self, _visible_text: &str) -> Result<bool, NavError> {
            Ok(false)
        }

        async fn snapshot(&mut self) -> Result<Snapshot, NavError> {
            self.snapshots += 1;
            if self.snapshots <= self.failures {
                return Err(NavError::Browser("page is navigating".into()));
            }
            Ok(snap())
        }

        async fn current_url(&mut self) -> Result<String, NavError> {
            Ok("https://www.regulations.gov/docket/FCIC-21-0007".into())
        }
    }

    #[tokio::test]
    async fn wait_outlasts_failed_snapshots() {
        let mut nav = FlakyNavigator { failures: 3, snapshots: 0 };
        nav.wait_for(Locator::Css("h1.js-title"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(nav.snapshots, 4);
    }

    #[tokio::test]
    async fn wait_times_out_when_snapshots_keep_failing() {
        let mut nav = FlakyNavigator { failures: usize::MAX, snapshots: 0 };
        let err = nav
            .wait_for(Locator::Css("h1.js-title"), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::Timeout { .. }));
        assert!(nav.snapshots > 1);
    }

    #[tokio::test]
    async fn wait_times_out_on_missing_element() {
        let mut nav = FlakyNavigator { failures: 0, snapshots: 0 };
        let err = nav
            .wait_for(Locator::LinkText("Unified Agenda"), Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::Timeout { .. }));
    }

    #[test]
    fn own_text_ignores_nested_markup() {
        let s = snap();
        let label = s.select("label")[0];
        assert_eq!(own_text(label), "Docket ID");
    }
}
