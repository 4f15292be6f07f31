use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::browser::Navigator;
use crate::config::{Pacing, ScrapeSettings};
use crate::extract::docket::extract_docket;
use crate::extract::document::extract_documents;
use crate::fetch::Fetch;
use crate::model::Docket;

const DOCUMENTS_TAB: &str = "Docket Documents";

/// Crawl stats returned after completion.
#[derive(Debug, Default, PartialEq)]
pub struct CrawlStats {
    pub documents: usize,
    pub comments: usize,
    pub with_attachments: usize,
    pub downloads: usize,
}

impl CrawlStats {
    pub fn of(docket: &Docket) -> Self {
        Self {
            documents: docket.documents.len(),
            comments: docket.comments().count(),
            with_attachments: docket.comments().filter(|c| c.has_attachments()).count(),
            downloads: docket
                .documents
                .iter()
                .filter(|d| d.content_path.is_some())
                .count(),
        }
    }

    pub fn print(&self) {
        println!(
            "{} documents, {} comments ({} with attachments), {} documents downloaded.",
            self.documents, self.comments, self.with_attachments, self.downloads
        );
    }
}

/// Drives one browser session over a docket: details, agenda, documents, comments.
pub struct DocketCrawler<'a, N, F> {
    nav: &'a mut N,
    fetcher: &'a F,
    settings: &'a ScrapeSettings,
}

impl<'a, N: Navigator, F: Fetch> DocketCrawler<'a, N, F> {
    pub fn new(nav: &'a mut N, fetcher: &'a F, settings: &'a ScrapeSettings) -> Self {
        Self {
            nav,
            fetcher,
            settings,
        }
    }

    /// Only a failure to open the docket page itself is fatal.
    pub async fn crawl(&mut self, url: &str) -> Result<Docket> {
        let start = Instant::now();
        info!(url, "opening docket");
        self.nav
            .load(url)
            .await
            .with_context(|| format!("Failed to open docket page {}", url))?;
        Pacing::pause(self.settings.pacing.settle).await;

        let mut docket = extract_docket(&mut *self.nav, self.settings).await;

        match self.nav.click_tab(DOCUMENTS_TAB).await {
            Ok(true) => {
                Pacing::pause(self.settings.pacing.settle).await;
                docket.documents = extract_documents(&mut *self.nav, self.fetcher, self.settings).await;
            }
            Ok(false) => warn!("docket page has no \"{}\" tab", DOCUMENTS_TAB),
            Err(e) => warn!("could not open the document listing: {}", e),
        }

        let stats = CrawlStats::of(&docket);
        info!(
            documents = stats.documents,
            comments = stats.comments,
            elapsed_secs = start.elapsed().as_secs(),
            "crawl finished"
        );
        Ok(docket)
    }
}
