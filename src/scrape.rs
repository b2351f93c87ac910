use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::Args;

use crate::config::{EnvDefaults, FileFormat, ScrapeConfig, ScrapeInputs, DEFAULT_MAX_PAGES};
use crate::pipeline;
use crate::source::HttpSource;
use crate::store::{ObjectStore, S3Store};
use crate::telemetry;

pub const DEFAULT_DELAY_SECS: f64 = 2.0;

/// `closet scrape <username>`
#[derive(Args, Debug)]
pub struct ScrapeCmd {
    /// Closet to scrape
    pub username: String,
    /// Local output format
    #[arg(long, value_enum, default_value_t = FileFormat::Json)]
    pub format: FileFormat,
    /// Output file name without extension (default: <username>_listings)
    #[arg(short, long)]
    pub output: Option<String>,
    /// Only collect closet-page summaries
    #[arg(long, default_value_t = false)]
    pub no_details: bool,
    /// Seconds to wait between requests
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
    pub delay: f64,
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: usize,
    /// Bucket for one object per listing (env: S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,
    /// Key prefix inside the bucket (env: S3_PREFIX, default: username)
    #[arg(long)]
    pub s3_prefix: Option<String>,
    /// Skip local files when a bucket is set
    #[arg(long, default_value_t = false)]
    pub s3_only: bool,
    /// Skip listings already stored in the bucket (default)
    #[arg(long, overrides_with = "no_incremental")]
    pub incremental: bool,
    /// Re-scrape and overwrite stored listings
    #[arg(long, overrides_with = "incremental")]
    pub no_incremental: bool,
}

impl ScrapeCmd {
    fn inputs(&self) -> ScrapeInputs {
        ScrapeInputs {
            username: self.username.clone(),
            bucket: self.s3_bucket.clone(),
            prefix: self.s3_prefix.clone(),
            delay_secs: Some(self.delay),
            max_pages: Some(self.max_pages),
            visit_details: Some(!self.no_details),
            incremental: Some(self.incremental || !self.no_incremental),
            remote_only: self.s3_only,
            format: Some(self.format),
            output: self.output.clone(),
        }
    }
}

pub async fn run(args: ScrapeCmd) -> Result<()> {
    let started = Instant::now();
    let cfg = ScrapeConfig::resolve(args.inputs(), &EnvDefaults::from_env(), DEFAULT_DELAY_SECS);
    let log = telemetry::scrape();
    let _root = log
        .root_span_kv([
            ("username", cfg.username.clone()),
            ("max_pages", cfg.max_pages.to_string()),
            ("details", cfg.visit_details.to_string()),
            ("incremental", cfg.incremental.to_string()),
            ("bucket", cfg.remote.as_ref().map(|r| r.bucket.clone()).unwrap_or_else(|| "-".into())),
        ])
        .entered();

    if cfg.remote_only && cfg.remote.is_none() {
        log.warn("⚠️ --s3-only given without a bucket; writing local files");
    }

    let source = HttpSource::new(cfg.timeout)?;
    let store = match &cfg.remote {
        Some(target) => Some(S3Store::from_env(target.bucket.clone()).await),
        None => None,
    };
    let outcome = pipeline::run(&cfg, &source, store.as_ref().map(|s| s as &dyn ObjectStore), Path::new("."), &log).await?;

    if outcome.listings.is_empty() {
        log.info("ℹ️  No listings found.");
    }
    for l in outcome.listings.iter().take(3) {
        log.info(format!("  • {} | ${} | {}", l.title, l.price, l.link));
    }

    if telemetry::config::json_mode() {
        log.result(&outcome.summary, started)?;
    }
    Ok(())
}
