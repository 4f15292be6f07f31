use tracing::{info, warn};

use super::{field, ExtractError, MAIN_CONTENT, PAGE_TITLE};
use crate::browser::{Locator, Navigator, Snapshot};
use crate::config::{Pacing, ScrapeSettings};
use crate::model::Docket;

const DOCKET_ID_LABEL: &str = "Docket ID";
const AGENCY: &str = "div.col-md-12.mt-2.mb-4 p.js-created-text strong";
const SUMMARY: &str = "div.px-2 div.PREAMB p";
const DOCKET_TYPE: &str = "span.js-doctype";
const COMMENT_COUNT: &str = "p.js-comments-posted";
const ALL_COMMENTS_LINK: &str = "All Comments on Docket";

const AGENDA_TAB: &str = "Unified Agenda";
const AGENDA_ABSTRACT: &str = "div.ua-abstract";
const AGENDA_TEXT: &str = "div.ua-abstract p";

/// Fill the docket's top-level metadata from the page the navigator is on.
///
/// Every field is read independently; a missing one is left `None`.
pub async fn extract_docket<N: Navigator>(nav: &mut N, settings: &ScrapeSettings) -> Docket {
    let mut docket = Docket::default();

    if let Err(e) = nav.wait_for(Locator::Css(MAIN_CONTENT), settings.wait).await {
        warn!("docket page did not render main content: {}", e);
    }
    match nav.snapshot().await {
        Ok(snap) => read_details(&snap, &mut docket),
        Err(e) => warn!("could not read docket page: {}", e),
    }

    // The comment counter renders after the rest of the header.
    match nav
        .wait_for(Locator::LinkText(ALL_COMMENTS_LINK), settings.wait)
        .await
    {
        Ok(()) => {
            if let Ok(snap) = nav.snapshot().await {
                docket.comment_count = field(&snap, "Number of Comments", COMMENT_COUNT);
            }
        }
        Err(e) => warn!("comment counter unavailable: {}", e),
    }

    match extract_agenda(nav, settings).await {
        Ok(agenda) => docket.agenda = agenda,
        Err(e) => warn!("could not read Unified Agenda: {}", e),
    }
    Pacing::pause(settings.pacing.agenda).await;

    info!(
        docket_id = docket.docket_id.as_deref().unwrap_or("?"),
        title = docket.title.as_deref().unwrap_or("?"),
        "docket details extracted"
    );
    docket
}

pub fn read_details(snap: &Snapshot, docket: &mut Docket) {
    docket.title = field(snap, "Title", PAGE_TITLE);
    docket.docket_id = snap.labelled_value(DOCKET_ID_LABEL);
    docket.agency = field(snap, "Agency", AGENCY);
    docket.summary = field(snap, "Summary", SUMMARY);
    docket.docket_type = field(snap, "Docket Type", DOCKET_TYPE);
    docket.comment_count = field(snap, "Number of Comments", COMMENT_COUNT);
}

/// Agenda text from the "Unified Agenda" tab, `None` when the docket has no such tab.
async fn extract_agenda<N: Navigator>(
    nav: &mut N,
    settings: &ScrapeSettings,
) -> Result<Option<String>, ExtractError> {
    if !nav.snapshot().await?.exists(Locator::LinkText(AGENDA_TAB)) {
        info!("docket has no Unified Agenda tab");
        return Ok(None);
    }
    if !nav.click_tab(AGENDA_TAB).await? {
        return Ok(None);
    }
    nav.wait_for(Locator::Css(AGENDA_ABSTRACT), settings.wait).await?;
    Ok(nav.snapshot().await?.safe_text(AGENDA_TEXT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fixture::FixtureNavigator;

    const DOCKET_URL: &str = "https://www.regulations.gov/docket/FCIC-21-0007";
    const AGENDA_URL: &str = "https://www.regulations.gov/docket/FCIC-21-0007/unified-agenda";

    fn settings() -> ScrapeSettings {
        ScrapeSettings {
            pacing: Pacing::none(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn docket_fields_and_agenda() {
        let mut nav = FixtureNavigator::new()
            .fixture(DOCKET_URL, "docket")
            .fixture(AGENDA_URL, "agenda");
        nav.load(DOCKET_URL).await.unwrap();

        let d = extract_docket(&mut nav, &settings()).await;
        assert_eq!(d.title.as_deref(), Some("Area Risk Protection Insurance Regulations"));
        assert_eq!(d.docket_id.as_deref(), Some("FCIC-21-0007"));
        assert_eq!(d.agency.as_deref(), Some("Federal Crop Insurance Corporation"));
        assert_eq!(d.docket_type.as_deref(), Some("Rulemaking"));
        assert_eq!(d.comment_count.as_deref(), Some("4 Comments"));
        assert!(d.summary.unwrap().starts_with("The Federal Crop Insurance Corporation"));
        assert_eq!(
            d.agenda.as_deref(),
            Some("This rule revises the Area Risk Protection Insurance Basic Provisions.")
        );
        assert!(d.documents.is_empty());
    }

    #[tokio::test]
    async fn missing_agenda_tab_is_not_fatal() {
        let html = std::fs::read_to_string("tests/fixtures/docket.html")
            .unwrap()
            .replace("Unified Agenda", "Browse");
        let mut nav = FixtureNavigator::new().page(DOCKET_URL, html);
        nav.load(DOCKET_URL).await.unwrap();

        let d = extract_docket(&mut nav, &settings()).await;
        assert_eq!(d.agenda, None);
        assert_eq!(d.docket_id.as_deref(), Some("FCIC-21-0007"));
        assert_eq!(nav.loads.len(), 1);
    }

    #[tokio::test]
    async fn fields_are_guarded_independently() {
        let html = r#"<html><body><main class="main-content">
            <span class="js-doctype">Nonrulemaking</span>
            <label>Docket ID</label><p>ABC-1</p>
        </main></body></html>"#;
        let mut nav = FixtureNavigator::new().page(DOCKET_URL, html);
        nav.load(DOCKET_URL).await.unwrap();

        let d = extract_docket(&mut nav, &settings()).await;
        assert_eq!(d.title, None);
        assert_eq!(d.agency, None);
        assert_eq!(d.comment_count, None);
        assert_eq!(d.docket_type.as_deref(), Some("Nonrulemaking"));
        assert_eq!(d.docket_id.as_deref(), Some("ABC-1"));
    }
}
