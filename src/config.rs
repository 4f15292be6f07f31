use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

pub const DEFAULT_DOCKET_URL: &str = "https://www.regulations.gov/docket/FCIC-21-0007";
pub const DOCKET_FILE: &str = "docket.json";
pub const ANALYSIS_FILE: &str = "docket_analysis.json";

/// Browser and crawl options shared by `scrape` and `run`.
#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Where primary document content is saved
    #[arg(long, env = "DOCKET_DOWNLOADS_DIR", default_value = "downloads")]
    pub downloads_dir: PathBuf,

    /// Comment listing pages visited per document
    #[arg(long, env = "DOCKET_MAX_COMMENT_PAGES", default_value_t = 2)]
    pub max_comment_pages: usize,

    /// Pause after page loads and tab clicks, in seconds
    #[arg(long, env = "DOCKET_SETTLE_SECS", default_value_t = 5)]
    pub settle_secs: u64,

    /// Pause between comment pages, in seconds
    #[arg(long, env = "DOCKET_COMMENT_DELAY_SECS", default_value_t = 10)]
    pub comment_delay_secs: u64,

    /// How long to wait for a page element, in seconds
    #[arg(long, env = "DOCKET_WAIT_SECS", default_value_t = 30)]
    pub wait_secs: u64,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}

impl CrawlArgs {
    pub fn settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            max_comment_pages: self.max_comment_pages,
            wait: Duration::from_secs(self.wait_secs),
            comment_wait: Duration::from_secs(self.wait_secs.min(COMMENT_WAIT_SECS)),
            pacing: Pacing {
                settle: Duration::from_secs(self.settle_secs),
                agenda: Duration::from_secs(self.comment_delay_secs),
                comment: Duration::from_secs(self.comment_delay_secs),
            },
        }
    }
}

/// Remote scoring/summarization service options.
#[derive(Args, Debug, Clone)]
pub struct AnalystArgs {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    #[arg(long, env = "DOCKET_CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    pub chat_model: String,

    #[arg(long, env = "DOCKET_MODERATION_MODEL", default_value = "text-moderation-latest")]
    pub moderation_model: String,
}

impl AnalystArgs {
    pub fn config(&self) -> Result<AnalystConfig> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("OPENAI_API_KEY is not set (pass --api-key or add it to .env)")?;
        Ok(AnalystConfig {
            api_key,
            api_base: self.api_base.trim_end_matches('/').to_string(),
            chat_model: self.chat_model.clone(),
            moderation_model: self.moderation_model.clone(),
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Where chart images are written
    #[arg(long, env = "DOCKET_IMAGES_DIR", default_value = "images")]
    pub images_dir: PathBuf,
}

/// Where `run` writes the scraped and the analysed docket.
#[derive(Args, Debug, Clone)]
pub struct OutputPaths {
    #[arg(long, env = "DOCKET_FILE", default_value = DOCKET_FILE)]
    pub docket_file: PathBuf,

    #[arg(long, env = "DOCKET_ANALYSIS_FILE", default_value = ANALYSIS_FILE)]
    pub analysis_file: PathBuf,
}

const COMMENT_WAIT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub max_comment_pages: usize,
    /// Timeout for page-level elements.
    pub wait: Duration,
    /// Timeout for comment listing and comment pages.
    pub comment_wait: Duration,
    pub pacing: Pacing,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            max_comment_pages: 2,
            wait: Duration::from_secs(30),
            comment_wait: Duration::from_secs(COMMENT_WAIT_SECS),
            pacing: Pacing::default(),
        }
    }
}

/// Fixed delays between crawl steps.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// After a page load or tab click.
    pub settle: Duration,
    /// After visiting the agenda tab.
    pub agenda: Duration,
    /// After each comment listing page and before each comment visit.
    pub comment: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(5),
            agenda: Duration::from_secs(10),
            comment: Duration::from_secs(10),
        }
    }
}

impl Pacing {
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            settle: Duration::ZERO,
            agenda: Duration::ZERO,
            comment: Duration::ZERO,
        }
    }

    pub async fn pause(d: Duration) {
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalystConfig {
    pub api_key: String,
    pub api_base: String,
    pub chat_model: String,
    pub moderation_model: String,
}
