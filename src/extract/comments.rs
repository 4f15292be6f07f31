use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use url::Url;

use super::{posted_date, ExtractError, MAIN_CONTENT, POSTED_TEXT};
use crate::browser::{element_text, own_text, select_within, Locator, Navigator, Snapshot};
use crate::config::{Pacing, ScrapeSettings};
use crate::model::Comment;
use crate::text::normalize_comment;

const RESULTS_CONTAINER: &str = "div.results-container";
const COMMENT_LINKS: &str = r#"div[class*="card-type-comment"] h3[class*="card-title"] > a"#;
const COMMENT_HEADING: &str = r#"h2[class*="section-heading"]"#;
const SUBMITTER_ITEMS: &str = "div#tab-submitter-info > ul > li";
const ATTACHMENT_BADGE: &str = r#"span[class*="badge-pill"]"#;
const ATTACHMENT_LINKS: &str = r#"a[class*="btn-block"]"#;

/// Collect and visit every comment of the document at `document_url`.
///
/// A comment that fails to load or parse is dropped; the rest are kept.
pub async fn extract_comments<N: Navigator>(
    nav: &mut N,
    settings: &ScrapeSettings,
    document_url: &str,
) -> Vec<Comment> {
    let links = collect_comment_links(nav, settings, document_url).await;
    info!(document = document_url, total = links.len(), "comment links collected");

    let pb = ProgressBar::new(links.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} comments (eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut comments = Vec::with_capacity(links.len());
    for url in &links {
        Pacing::pause(settings.pacing.comment).await;
        match extract_comment(nav, settings, url).await {
            Ok(comment) => comments.push(comment),
            Err(e) => warn!(url = %url, "dropping comment: {}", e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        document = document_url,
        kept = comments.len(),
        dropped = links.len() - comments.len(),
        "comments extracted"
    );
    comments
}

/// Walk the comment listing, at most `max_comment_pages` pages.
///
/// A page that fails to load or shows no comments ends the walk.
pub async fn collect_comment_links<N: Navigator>(
    nav: &mut N,
    settings: &ScrapeSettings,
    document_url: &str,
) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut capped = false;

    for page in 1..=settings.max_comment_pages {
        let url = listing_url(document_url, page);
        let page_links = match listing_page_links(nav, settings, &url).await {
            Ok(found) => found,
            Err(e) => {
                debug!(page, "no more comment pages: {}", e);
                break;
            }
        };
        Pacing::pause(settings.pacing.comment).await;
        if page_links.is_empty() {
            break;
        }
        for link in page_links {
            if !links.contains(&link) {
                links.push(link);
            }
        }
        capped = page == settings.max_comment_pages;
    }

    if capped {
        warn!(
            document = document_url,
            pages = settings.max_comment_pages,
            "stopped at the comment page limit; later comments were not collected"
        );
    }
    links
}

async fn listing_page_links<N: Navigator>(
    nav: &mut N,
    settings: &ScrapeSettings,
    url: &str,
) -> Result<Vec<String>, ExtractError> {
    nav.load(url).await?;
    nav.wait_for(Locator::Css(RESULTS_CONTAINER), settings.comment_wait)
        .await?;
    Ok(nav.snapshot().await?.hrefs(COMMENT_LINKS))
}

/// `<document>/comment`, with `?pageNumber=N` after the first page.
pub fn listing_url(document_url: &str, page: usize) -> String {
    let Ok(mut url) = Url::parse(document_url) else {
        let base = format!("{}/comment", document_url.trim_end_matches('/'));
        return if page > 1 {
            format!("{}?pageNumber={}", base, page)
        } else {
            base
        };
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("comment");
    }
    url.set_query(None);
    url.set_fragment(None);
    if page > 1 {
        url.query_pairs_mut()
            .append_pair("pageNumber", &page.to_string());
    }
    url.into()
}

pub async fn extract_comment<N: Navigator>(
    nav: &mut N,
    settings: &ScrapeSettings,
    url: &str,
) -> Result<Comment, ExtractError> {
    nav.load(url).await?;
    nav.wait_for(Locator::Css(MAIN_CONTENT), settings.comment_wait)
        .await?;
    let snap = nav.snapshot().await?;
    read_comment(&snap)
}

/// Parse a rendered comment page. Only the comment body is required.
pub fn read_comment(snap: &Snapshot) -> Result<Comment, ExtractError> {
    let body = snap
        .following_div_text(COMMENT_HEADING)
        .ok_or(ExtractError::Missing("comment body"))?;

    let mut comment = Comment::default();
    for item in snap.select(SUBMITTER_ITEMS) {
        let label = select_within(item, "label").first().map(|l| own_text(*l));
        let value = select_within(item, "p").first().map(|p| element_text(*p));
        if let (Some(label), Some(value)) = (label, value) {
            comment.insert_submitter(&label, &value);
        }
    }

    let (count, types) = read_attachments(snap);
    comment.attachments = count;
    comment.attachment_types = types;
    if !comment.attachments_consistent() {
        debug!(
            count = comment.attachments,
            found = comment.attachment_types.len(),
            "attachment count and links disagree"
        );
    }
    comment.posted_on = snap.safe_text(POSTED_TEXT).map(|t| posted_date(&t));
    comment.text = normalize_comment(&body);
    Ok(comment)
}

/// Attachment count from the badge plus one extension per attachment link.
fn read_attachments(snap: &Snapshot) -> (u32, Vec<String>) {
    let Some(badge) = snap.safe_text(ATTACHMENT_BADGE) else {
        return (0, Vec::new());
    };
    let types: Vec<String> = snap
        .hrefs(ATTACHMENT_LINKS)
        .iter()
        .filter_map(|href| file_extension(href))
        .collect();
    let count = match badge.trim().parse::<u32>() {
        Ok(n) => n,
        Err(_) => {
            warn!(badge = %badge, "unreadable attachment count, using link count");
            types.len() as u32
        }
    };
    (count, types)
}

/// Extension of the last path segment, e.g. `pdf` for `.../attachment_1.pdf`.
pub fn file_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fixture::FixtureNavigator;

    const DOC_URL: &str = "https://www.regulations.gov/document/FCIC-21-0007-0001";

    fn settings() -> ScrapeSettings {
        ScrapeSettings {
            pacing: Pacing::none(),
            ..Default::default()
        }
    }

    fn listing(urls: &[&str]) -> String {
        let cards: String = urls
            .iter()
            .map(|u| {
                format!(
                    r#"<div class="card card-type-comment ember-view"><h3 class="h4 card-title"><a href="{}">Comment</a></h3></div>"#,
                    u
                )
            })
            .collect();
        format!(r#"<html><body><div class="results-container">{}</div></body></html>"#, cards)
    }

    #[test]
    fn listing_urls() {
        assert_eq!(listing_url(DOC_URL, 1), format!("{}/comment", DOC_URL));
        assert_eq!(
            listing_url(DOC_URL, 2),
            format!("{}/comment?pageNumber=2", DOC_URL)
        );
        assert_eq!(
            listing_url(&format!("{}/", DOC_URL), 3),
            format!("{}/comment?pageNumber=3", DOC_URL)
        );
    }

    #[test]
    fn extensions() {
        assert_eq!(
            file_extension("https://downloads.regulations.gov/X-0005/attachment_1.PDF").as_deref(),
            Some("pdf")
        );
        assert_eq!(file_extension("https://downloads.regulations.gov/X-0005/content"), None);
        assert_eq!(file_extension("not a url"), None);
    }

    #[test]
    fn comment_page_fields() {
        let html = std::fs::read_to_string("tests/fixtures/comment_attachments.html").unwrap();
        let snap = Snapshot::parse("https://www.regulations.gov/comment/FCIC-21-0007-0005", &html);
        let c = read_comment(&snap).unwrap();
        assert_eq!(c.text, "See attached letter from the association - two files.");
        assert_eq!(c.attachments, 2);
        assert_eq!(c.attachment_types, vec!["pdf", "docx"]);
        assert!(c.attachments_consistent());
        assert_eq!(c.posted_on.as_deref(), Some("Mar 9, 2024"));
        assert_eq!(c.submitter.get("Organization Name").map(String::as_str), Some("Growers Association"));
        assert_eq!(c.submitter.get("State").map(String::as_str), Some("Iowa"));
    }

    #[test]
    fn comment_without_body_is_an_error() {
        let snap = Snapshot::parse(
            "https://www.regulations.gov/comment/X",
            r#"<main class="main-content"><p>nothing here</p></main>"#,
        );
        assert!(matches!(read_comment(&snap), Err(ExtractError::Missing(_))));
    }

    #[tokio::test]
    async fn pagination_is_capped() {
        let p1 = format!("{}/comment", DOC_URL);
        let p2 = format!("{}/comment?pageNumber=2", DOC_URL);
        let p3 = format!("{}/comment?pageNumber=3", DOC_URL);
        let mut nav = FixtureNavigator::new()
            .page(&p1, listing(&["/comment/A-1", "/comment/A-2"]))
            .page(&p2, listing(&["/comment/A-3"]))
            .page(&p3, listing(&["/comment/A-4"]));

        let links = collect_comment_links(&mut nav, &settings(), DOC_URL).await;
        assert_eq!(links.len(), 3);
        assert_eq!(links[0], "https://www.regulations.gov/comment/A-1");
        assert_eq!(nav.loads_matching("/comment"), 2);
        assert_eq!(nav.loads_matching("pageNumber=3"), 0);
    }

    #[tokio::test]
    async fn pagination_cap_is_configurable() {
        let p1 = format!("{}/comment", DOC_URL);
        let p2 = format!("{}/comment?pageNumber=2", DOC_URL);
        let p3 = format!("{}/comment?pageNumber=3", DOC_URL);
        let mut nav = FixtureNavigator::new()
            .page(&p1, listing(&["/comment/A-1"]))
            .page(&p2, listing(&["/comment/A-2"]))
            .page(&p3, listing(&["/comment/A-3"]));
        let s = ScrapeSettings {
            max_comment_pages: 5,
            ..settings()
        };

        let links = collect_comment_links(&mut nav, &s, DOC_URL).await;
        assert_eq!(links.len(), 3);
        // Page 4 is missing, which ends the walk.
        assert_eq!(nav.loads.len(), 4);
    }

    #[tokio::test]
    async fn failing_first_page_yields_no_links() {
        let mut nav = FixtureNavigator::new();
        let links = collect_comment_links(&mut nav, &settings(), DOC_URL).await;
        assert!(links.is_empty());
        assert_eq!(nav.loads.len(), 1);
    }
}
