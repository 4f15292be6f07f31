use tracing::{debug, info, warn};

use super::comments::extract_comments;
use super::{field, posted_date, ExtractError, PAGE_TITLE, POSTED_TEXT};
use crate::browser::{element_text, select_within, Locator, Navigator, Snapshot};
use crate::config::{Pacing, ScrapeSettings};
use crate::fetch::{download_or_skip, Fetch};
use crate::model::{Document, Sections};

const DOCUMENT_LINKS: &str = "div.card.card-type-proposed-rule h3.card-title a";
const POSTED_BY: &str = "div.col-md-12.mt-2.mb-4 p.js-posted-text strong";
const DOCUMENT_ID: &str = r#"div.card-block.py-0.pl-2.small.text-muted p[class="mb-0"]"#;
const COMMENTS_RECEIVED: &str = "div.card-block.py-0.pl-2.small.text-muted p.js-comments-received";
const PREAMBLE: &str = "main.main-content div.row.mb-6 div.col-md-12 div.px-2";
const PRIMARY_CONTENT_LINK: &str = "ul.dropdown-menu > li:nth-child(2) > a";

/// Preamble section codes, in the order they appear in a Federal Register notice.
pub const SECTION_CODES: &[&str] = &["AGY", "ACT", "SUM", "ADD", "FURINF", "SUPLINF"];

/// Visit every proposed-rule card on the current listing page, one at a time.
pub async fn extract_documents<N: Navigator, F: Fetch>(
    nav: &mut N,
    fetcher: &F,
    settings: &ScrapeSettings,
) -> Vec<Document> {
    let links = match nav.snapshot().await {
        Ok(snap) => snap.hrefs(DOCUMENT_LINKS),
        Err(e) => {
            warn!("could not read document listing: {}", e);
            Vec::new()
        }
    };
    info!(count = links.len(), "document links found");

    let mut documents = Vec::with_capacity(links.len());
    for link in &links {
        match extract_document(nav, fetcher, settings, link).await {
            Ok(doc) => documents.push(doc),
            Err(e) => warn!(url = %link, "skipping document: {}", e),
        }
    }
    documents
}

pub async fn extract_document<N: Navigator, F: Fetch>(
    nav: &mut N,
    fetcher: &F,
    settings: &ScrapeSettings,
    url: &str,
) -> Result<Document, ExtractError> {
    nav.load(url).await?;
    Pacing::pause(settings.pacing.settle).await;
    nav.wait_for(Locator::Css(PAGE_TITLE), settings.wait).await?;

    let (mut doc, content_link) = {
        let snap = nav.snapshot().await?;
        (read_document(&snap), snap.hrefs(PRIMARY_CONTENT_LINK).into_iter().next())
    };
    let document_url = nav.current_url().await?;

    doc.content_path = match content_link {
        Some(link) => download_or_skip(fetcher, &link).await,
        None => {
            debug!(url, "no primary content link");
            None
        }
    };

    doc.comments = extract_comments(nav, settings, &document_url).await;
    info!(
        document_id = doc.document_id.as_deref().unwrap_or("?"),
        sections = doc.sections.len(),
        comments = doc.comments.len(),
        "document extracted"
    );
    Ok(doc)
}

/// Header fields and preamble sections of a rendered document page.
pub fn read_document(snap: &Snapshot) -> Document {
    Document {
        title: field(snap, "Proposed Rule Title", PAGE_TITLE),
        posted_by: field(snap, "Posted By", POSTED_BY),
        posted_date: field(snap, "Posted Date", POSTED_TEXT).map(|t| posted_date(&t)),
        document_id: field(snap, "Document ID", DOCUMENT_ID),
        comments_received: field(snap, "Comments Received", COMMENTS_RECEIVED),
        sections: read_sections(snap),
        ..Default::default()
    }
}

/// Absent sections are skipped, as are sections without a heading.
pub fn read_sections(snap: &Snapshot) -> Sections {
    let mut sections = Sections::new();
    let Some(preamble) = snap.select(PREAMBLE).into_iter().next() else {
        return sections;
    };
    for code in SECTION_CODES {
        let css = format!(r#"div[class="{}"]"#, code);
        let Some(block) = select_within(preamble, &css).into_iter().next() else {
            continue;
        };
        let heading = select_within(block, "h2")
            .first()
            .map(|h| element_text(*h))
            .unwrap_or_default();
        if heading.is_empty() {
            continue;
        }
        let body: Vec<String> = select_within(block, "p")
            .into_iter()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        sections.insert(heading, body.join(" "));
    }
    sections
}
