//! Post-crawl annotation: bot-likelihood scores, moderation flags and summaries.

pub mod openai;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{BotScore, Docket, Document};
use crate::text::clean_html;

#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Remote classification and summarization service.
pub trait Analyst {
    /// How likely `text` is machine-generated, 0 (human) to 5 (bot).
    async fn score(&self, text: &str) -> Result<BotScore, AnalystError>;

    /// Moderation categories and whether each one is flagged.
    async fn classify(&self, text: &str) -> Result<BTreeMap<String, bool>, AnalystError>;

    async fn summarize(&self, text: &str) -> Result<String, AnalystError>;
}

/// Counts reported after an annotation pass.
#[derive(Debug, Default, PartialEq)]
pub struct AnalysisStats {
    pub scored: usize,
    pub with_attachments: usize,
    pub documents_summarized: usize,
}

impl AnalysisStats {
    pub fn print(&self) {
        println!(
            "Scored {} comments ({} with attachments skipped), summarized {} documents.",
            self.scored, self.with_attachments, self.documents_summarized
        );
    }
}

/// Run every analysis step over the docket in place, one call at a time.
pub async fn annotate<A: Analyst>(docket: &mut Docket, analyst: &A) -> AnalysisStats {
    let mut stats = score_comments(docket, analyst).await;
    stats.documents_summarized = summarize_documents(&mut docket.documents, analyst).await;
    docket.analysis = Some(summarize_or_empty(analyst, &docket_prompt(docket)).await);
    info!("docket summary done");
    stats
}

/// Score and classify every text-only comment. Comments with attachments are left untouched.
pub async fn score_comments<A: Analyst>(docket: &mut Docket, analyst: &A) -> AnalysisStats {
    let mut stats = AnalysisStats::default();
    let eligible = docket.comments().filter(|c| c.is_scorable()).count();

    let pb = ProgressBar::new(eligible as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} comments scored")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    for comment in docket.comments_mut() {
        if comment.has_attachments() {
            stats.with_attachments += 1;
            continue;
        }
        if !comment.is_scorable() {
            continue;
        }

        let score = match analyst.score(&comment.text).await {
            Ok(score) => score,
            Err(e) => {
                warn!("bot score failed, using {}: {}", BotScore::FALLBACK, e);
                BotScore::FALLBACK
            }
        };
        let sentiment = match analyst.classify(&comment.text).await {
            Ok(categories) => Some(categories),
            Err(e) => {
                warn!("moderation failed, leaving sentiment unset: {}", e);
                None
            }
        };
        comment.bot_score = Some(score);
        comment.sentiment = sentiment;
        stats.scored += 1;
        debug!(score = score.value(), "comment scored");
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        scored = stats.scored,
        skipped = stats.with_attachments,
        "comment scoring done"
    );
    stats
}

/// Summarize each document from its sections, or from its downloaded content.
pub async fn summarize_documents<A: Analyst>(documents: &mut [Document], analyst: &A) -> usize {
    let mut summarized = 0;
    for doc in documents.iter_mut() {
        doc.analysis = match document_prompt(doc) {
            Some(content) => {
                summarized += 1;
                Some(summarize_or_empty(analyst, &content).await)
            }
            None => None,
        };
    }
    summarized
}

/// Text to summarize for a document, `None` when there is nothing usable.
pub fn document_prompt(doc: &Document) -> Option<String> {
    if !doc.sections.is_empty() {
        let mut out = String::new();
        for (heading, text) in doc.sections.iter() {
            // Headings are scraped with their trailing colon.
            let _ = write!(out, "{}:\n{}\n\n", heading.trim_end_matches(':'), text);
        }
        return Some(out);
    }

    let path = doc.content_path.as_ref()?;
    match std::fs::read(path) {
        Ok(bytes) => Some(clean_html(&String::from_utf8_lossy(&bytes))),
        Err(e) => {
            warn!(path = %path.display(), "could not read downloaded document: {}", e);
            None
        }
    }
}

pub fn docket_prompt(docket: &Docket) -> String {
    format!(
        "SUMMARY:\n{}\n\nAGENDA:\n{}",
        docket.summary.as_deref().unwrap_or_default(),
        docket.agenda.as_deref().unwrap_or_default()
    )
}

async fn summarize_or_empty<A: Analyst>(analyst: &A, content: &str) -> String {
    match analyst.summarize(content).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!("summary failed, leaving it empty: {}", e);
            String::new()
        }
    }
}
