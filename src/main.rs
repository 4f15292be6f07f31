mod analysis;
mod browser;
mod config;
mod crawl;
mod extract;
mod fetch;
mod model;
mod report;
mod store;
mod text;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::analysis::openai::OpenAiAnalyst;
use crate::browser::chrome::ChromeNavigator;
use crate::config::{
    AnalystArgs, CrawlArgs, OutputPaths, ReportArgs, ANALYSIS_FILE, DEFAULT_DOCKET_URL,
    DOCKET_FILE,
};
use crate::crawl::{CrawlStats, DocketCrawler};
use crate::fetch::{ensure_dir, HttpFetcher};
use crate::model::Docket;
use crate::report::Report;

#[derive(Parser)]
#[command(
    name = "docket_scraper",
    about = "regulations.gov docket scraper with comment scoring and charts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a docket and save it as JSON
    Scrape {
        #[arg(long, env = "DOCKET_URL", default_value = DEFAULT_DOCKET_URL)]
        url: String,
        #[arg(short, long, default_value = DOCKET_FILE)]
        output: PathBuf,
        #[command(flatten)]
        crawl: CrawlArgs,
    },
    /// Score and summarize a saved docket, then draw the charts
    Analyze {
        #[arg(short, long, default_value = DOCKET_FILE)]
        input: PathBuf,
        #[arg(short, long, default_value = ANALYSIS_FILE)]
        output: PathBuf,
        #[command(flatten)]
        analyst: AnalystArgs,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Scrape + analyze in one pipeline
    Run {
        #[arg(long, env = "DOCKET_URL", default_value = DEFAULT_DOCKET_URL)]
        url: String,
        #[command(flatten)]
        outputs: OutputPaths,
        #[command(flatten)]
        crawl: CrawlArgs,
        #[command(flatten)]
        analyst: AnalystArgs,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Redraw the charts from an analysed docket
    Report {
        #[arg(short, long, default_value = ANALYSIS_FILE)]
        input: PathBuf,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Show counts for a saved docket
    Stats {
        #[arg(short, long, default_value = DOCKET_FILE)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape { url, output, crawl } => {
            println!("Scraping {} ...", url);
            let docket = scrape(&url, &crawl).await?;
            store::save_docket(&docket, &output)?;
            CrawlStats::of(&docket).print();
            println!("Saved docket to {}", output.display());
            Ok(())
        }
        Commands::Analyze {
            input,
            output,
            analyst,
            report,
        } => {
            let mut docket = store::load_docket(&input)?;
            analyze(&mut docket, &analyst, &report, &output).await
        }
        Commands::Run {
            url,
            outputs,
            crawl,
            analyst,
            report,
        } => {
            // Fail on a missing key before spending minutes in the browser.
            analyst.config()?;

            let t_scrape = Instant::now();
            println!("Pipeline: scraping {} ...", url);
            let mut docket = scrape(&url, &crawl).await?;
            store::save_docket(&docket, &outputs.docket_file)?;
            CrawlStats::of(&docket).print();
            println!(
                "Scraped in {}, saved to {}",
                format_duration(t_scrape.elapsed()),
                outputs.docket_file.display()
            );

            analyze(&mut docket, &analyst, &report, &outputs.analysis_file).await
        }
        Commands::Report { input, report } => {
            let docket = store::load_docket(&input)?;
            let charts = render_report(&docket, &report.images_dir)?;
            if charts.is_empty() {
                println!("Nothing to chart in {}.", input.display());
            }
            for chart in &charts {
                println!("- {}", chart.display());
            }
            Ok(())
        }
        Commands::Stats { input } => {
            let docket = store::load_docket(&input)?;
            let s = CrawlStats::of(&docket);
            let scored = docket.comments().filter(|c| c.bot_score.is_some()).count();
            println!("Docket:      {}", docket.docket_id.as_deref().unwrap_or("-"));
            println!("Documents:   {}", s.documents);
            println!("Comments:    {}", s.comments);
            println!("Attachments: {}", s.with_attachments);
            println!("Downloads:   {}", s.downloads);
            println!("Scored:      {}", scored);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// One browser session over `url`. The browser is closed whatever the outcome.
async fn scrape(url: &str, crawl: &CrawlArgs) -> anyhow::Result<Docket> {
    let settings = crawl.settings();
    ensure_dir(&crawl.downloads_dir)
        .with_context(|| format!("Failed to create {}", crawl.downloads_dir.display()))?;
    let fetcher = HttpFetcher::new(&crawl.downloads_dir)?;

    let mut nav = ChromeNavigator::launch(crawl.headful)
        .await
        .context("Failed to launch Chrome")?;
    let result = DocketCrawler::new(&mut nav, &fetcher, &settings)
        .crawl(url)
        .await;
    nav.close().await;
    result
}

async fn analyze(
    docket: &mut Docket,
    analyst: &AnalystArgs,
    report: &ReportArgs,
    output: &Path,
) -> anyhow::Result<()> {
    let analyst = OpenAiAnalyst::new(analyst.config()?);
    println!("Analyzing comments and documents ...");
    let stats = analysis::annotate(docket, &analyst).await;
    store::save_docket(docket, output)?;
    stats.print();

    let charts = render_report(docket, &report.images_dir)?;
    println!(
        "Analysis completed. Results saved to '{}' and visualizations generated:",
        output.display()
    );
    for chart in &charts {
        println!("- {}", chart.display());
    }
    Ok(())
}

fn render_report(docket: &Docket, images_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    ensure_dir(images_dir).with_context(|| format!("Failed to create {}", images_dir.display()))?;
    Report::from_docket(docket).render(images_dir)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
