//! Aggregate views over the scraped comments, rendered as PNG charts.

mod charts;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use crate::model::{BotScore, Comment, Docket};

pub const SCORE_CHART: &str = "score_distribution.png";
pub const WORD_CLOUD: &str = "comment_wordcloud.png";
pub const RATIO_CHART: &str = "comment_ratio.png";
pub const MONTHLY_CHART: &str = "comments_monthly_breakdown.png";
pub const SENTIMENT_CHART: &str = "comments_sentiment_analysis.png";

const POSTED_ON_FORMAT: &str = "%b %d, %Y";
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MAX_CLOUD_WORDS: usize = 100;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "else",
    "ever", "few", "for", "from", "further", "get", "had", "has", "have", "having", "he", "her",
    "here", "hers", "herself", "him", "himself", "his", "how", "however", "i", "if", "in",
    "into", "is", "it", "its", "itself", "just", "like", "me", "more", "most", "my", "myself",
    "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other", "otherwise", "ought",
    "our", "ours", "ourselves", "out", "over", "own", "same", "shall", "she", "should", "since",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "therefore", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "we", "were", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves", "don't", "can't", "won't", "isn't", "it's", "i'm", "we're", "they're",
];

/// Every aggregate the charts are drawn from.
#[derive(Debug, Default, PartialEq)]
pub struct Report {
    pub scores: Vec<(f64, usize)>,
    pub words: Vec<(String, usize)>,
    pub attachments: AttachmentSplit,
    pub months: Vec<(&'static str, usize)>,
    pub sentiment: Vec<(String, usize)>,
}

impl Report {
    pub fn from_docket(docket: &Docket) -> Self {
        let all: Vec<&Comment> = docket.comments().collect();
        let text_only: Vec<&Comment> = all.iter().copied().filter(|c| !c.has_attachments()).collect();
        Self {
            scores: score_distribution(&text_only),
            words: word_frequencies(&text_only),
            attachments: AttachmentSplit::of(&all),
            months: monthly_breakdown(&all),
            sentiment: sentiment_counts(&text_only),
        }
    }

    /// Draw every chart into `dir`, returning the files written.
    /// A view with no data is skipped.
    pub fn render(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let scores: Vec<(String, usize)> = self
            .scores
            .iter()
            .map(|(s, n)| (score_label(*s), *n))
            .collect();
        written.extend(
            charts::bar_chart(
                &dir.join(SCORE_CHART),
                "Distribution of Bot Likelihood Scores",
                "Bot likelihood score",
                &scores,
            )?,
        );

        written.extend(charts::word_cloud(&dir.join(WORD_CLOUD), &self.words)?);

        let caption = match self.attachments.ratio() {
            Some(r) => format!("Comments without vs with attachments (ratio {:.2})", r),
            None => "Comments without vs with attachments".to_string(),
        };
        written.extend(
            charts::bar_chart(
                &dir.join(RATIO_CHART),
                &caption,
                "",
                &self.attachments.bars(),
            )?,
        );

        let months: Vec<(String, usize)> = self
            .months
            .iter()
            .map(|(m, n)| (m.to_string(), *n))
            .collect();
        written.extend(
            charts::bar_chart(
                &dir.join(MONTHLY_CHART),
                "Monthly Breakdown of Comments",
                "Month",
                &months,
            )?,
        );

        written.extend(
            charts::bar_chart(
                &dir.join(SENTIMENT_CHART),
                "Sentiment Analysis of Comments",
                "Moderation category",
                &self.sentiment,
            )?,
        );

        info!(charts = written.len(), dir = %dir.display(), "charts rendered");
        Ok(written)
    }
}

/// Comments without vs with attachments.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AttachmentSplit {
    pub without: usize,
    pub with: usize,
}

impl AttachmentSplit {
    pub fn of(comments: &[&Comment]) -> Self {
        let with = comments.iter().filter(|c| c.has_attachments()).count();
        Self {
            without: comments.len() - with,
            with,
        }
    }

    /// `without / with`, undefined when no comment has attachments.
    pub fn ratio(&self) -> Option<f64> {
        (self.with > 0).then(|| self.without as f64 / self.with as f64)
    }

    fn bars(&self) -> Vec<(String, usize)> {
        if self.without + self.with == 0 {
            return Vec::new();
        }
        vec![
            ("Without Attachments".to_string(), self.without),
            ("With Attachments".to_string(), self.with),
        ]
    }
}

/// Count of each distinct score, ascending. Unscored comments are ignored.
pub fn score_distribution(comments: &[&Comment]) -> Vec<(f64, usize)> {
    let mut scores: Vec<f64> = comments
        .iter()
        .filter_map(|c| c.bot_score)
        .map(BotScore::value)
        .collect();
    scores.sort_by(f64::total_cmp);

    let mut out: Vec<(f64, usize)> = Vec::new();
    for s in scores {
        match out.last_mut() {
            Some((v, n)) if *v == s => *n += 1,
            _ => out.push((s, 1)),
        }
    }
    out
}

/// Word counts across comment text, most frequent first, stop-words removed.
pub fn word_frequencies(comments: &[&Comment]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for c in comments {
        for word in c
            .text
            .split(|ch: char| !(ch.is_alphanumeric() || ch == '\''))
            .map(|w| w.trim_matches('\'').to_lowercase())
        {
            if word.len() < 2 || word.chars().all(|ch| ch.is_ascii_digit()) {
                continue;
            }
            if STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut words: Vec<(String, usize)> = counts.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(MAX_CLOUD_WORDS);
    words
}

/// Comments per month of "Posted On", in calendar order, only months that occur.
/// Years are folded together.
pub fn monthly_breakdown(comments: &[&Comment]) -> Vec<(&'static str, usize)> {
    let mut by_month: BTreeMap<usize, usize> = BTreeMap::new();
    for c in comments {
        let Some(posted) = c.posted_on.as_deref() else {
            continue;
        };
        match NaiveDate::parse_from_str(posted.trim(), POSTED_ON_FORMAT) {
            Ok(date) => *by_month.entry(date.month0() as usize).or_default() += 1,
            Err(e) => warn!(posted_on = posted, "skipping unparseable date: {}", e),
        }
    }
    by_month
        .into_iter()
        .map(|(m, n)| (MONTHS[m], n))
        .collect()
}

/// How many comments each moderation category flagged. Categories never flagged are left out.
pub fn sentiment_counts(comments: &[&Comment]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for sentiment in comments.iter().filter_map(|c| c.sentiment.as_ref()) {
        for (category, _) in sentiment.iter().filter(|(_, flagged)| **flagged) {
            *counts.entry(category.clone()).or_default() += 1;
        }
    }
    counts.into_iter().collect()
}

/// Bar label for a score: shortest exact form, so distinct scores never share a label.
pub fn score_label(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.1}", score)
    } else {
        score.to_string()
    }
}
