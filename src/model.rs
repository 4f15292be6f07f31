use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Keys a comment owns as typed fields. Submitter labels must not shadow them.
const RESERVED_COMMENT_KEYS: &[&str] = &[
    "Posted On",
    "Attachments",
    "Attachment Types",
    "Comment",
    "Bot_Likelihood_Score",
    "Sentiment",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Docket {
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Docket ID", default)]
    pub docket_id: Option<String>,
    #[serde(rename = "Agency", default)]
    pub agency: Option<String>,
    #[serde(rename = "Summary", default)]
    pub summary: Option<String>,
    #[serde(rename = "Agenda", default, skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
    #[serde(rename = "Docket Type", default)]
    pub docket_type: Option<String>,
    #[serde(rename = "Number of Comments", default)]
    pub comment_count: Option<String>,
    #[serde(rename = "Documents", default)]
    pub documents: Vec<Document>,
    #[serde(rename = "Analysis", default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl Docket {
    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.documents.iter().flat_map(|d| d.comments.iter())
    }

    pub fn comments_mut(&mut self) -> impl Iterator<Item = &mut Comment> {
        self.documents.iter_mut().flat_map(|d| d.comments.iter_mut())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "Proposed Rule Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Posted By", default)]
    pub posted_by: Option<String>,
    #[serde(rename = "Posted Date", default)]
    pub posted_date: Option<String>,
    #[serde(rename = "Document ID", default)]
    pub document_id: Option<String>,
    #[serde(rename = "Comments Received", default)]
    pub comments_received: Option<String>,
    #[serde(rename = "Document", default, skip_serializing_if = "Sections::is_empty")]
    pub sections: Sections,
    #[serde(rename = "Document Path", default)]
    pub content_path: Option<PathBuf>,
    #[serde(rename = "Comments", default)]
    pub comments: Vec<Comment>,
    #[serde(rename = "Analysis", default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

/// Preamble sections of a document, keyed by heading, in page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections(Vec<(String, String)>);

impl Sections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a section. Replacing keeps the original position.
    pub fn insert(&mut self, heading: impl Into<String>, text: impl Into<String>) {
        let heading = heading.into();
        let text = text.into();
        match self.0.iter_mut().find(|(h, _)| *h == heading) {
            Some(slot) => slot.1 = text,
            None => self.0.push((heading, text)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, heading: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(h, _)| h == heading)
            .map(|(_, t)| t.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(h, t)| (h.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Sections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (heading, text) in &self.0 {
            map.serialize_entry(heading, text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Sections {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SectionsVisitor;

        impl<'de> Visitor<'de> for SectionsVisitor {
            type Value = Sections;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of section heading to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Sections, A::Error> {
                let mut sections = Sections::new();
                while let Some((heading, text)) = access.next_entry::<String, String>()? {
                    sections.insert(heading, text);
                }
                Ok(sections)
            }
        }

        deserializer.deserialize_map(SectionsVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Free-form submitter labels ("Submitter Name", "City", ...).
    #[serde(flatten)]
    pub submitter: BTreeMap<String, String>,
    #[serde(rename = "Posted On", default, skip_serializing_if = "Option::is_none")]
    pub posted_on: Option<String>,
    #[serde(rename = "Attachments", default)]
    pub attachments: u32,
    #[serde(rename = "Attachment Types", default)]
    pub attachment_types: Vec<String>,
    #[serde(rename = "Comment", default)]
    pub text: String,
    #[serde(
        rename = "Bot_Likelihood_Score",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bot_score: Option<BotScore>,
    #[serde(rename = "Sentiment", default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<BTreeMap<String, bool>>,
}

impl Comment {
    /// Record a submitter label. Returns false when the label collides with a typed field.
    pub fn insert_submitter(&mut self, label: &str, value: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || RESERVED_COMMENT_KEYS.contains(&label) {
            return false;
        }
        self.submitter.insert(label.to_string(), value.trim().to_string());
        true
    }

    pub fn has_attachments(&self) -> bool {
        self.attachments > 0
    }

    /// Only text-only comments are sent for scoring.
    pub fn is_scorable(&self) -> bool {
        !self.text.trim().is_empty() && !self.has_attachments()
    }

    pub fn attachments_consistent(&self) -> bool {
        self.attachments as usize == self.attachment_types.len()
    }
}

/// Bot-likelihood score, always within `[0, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct BotScore(f64);

impl BotScore {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 5.0;
    /// Substituted whenever a score cannot be obtained.
    pub const FALLBACK: BotScore = BotScore(2.5);

    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self(value.clamp(Self::MIN, Self::MAX))
        } else {
            Self::FALLBACK
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for BotScore {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<BotScore> for f64 {
    fn from(score: BotScore) -> Self {
        score.0
    }
}

impl fmt::Display for BotScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}
