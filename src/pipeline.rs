//! One scrape run: known slugs → enumerate → filter → details → write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::closet::{self, StopReason};
use crate::config::ScrapeConfig;
use crate::dedup::{self, KnownSlugs};
use crate::detail;
use crate::listing::Listing;
use crate::sink::{self, remote, status_page};
use crate::source::PageSource;
use crate::store::ObjectStore;
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase as ScrapePhase, Scrape};
use crate::util::time::utc_stamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detail,
    Remote,
}

#[derive(Debug, Serialize)]
pub struct ItemError {
    pub slug: String,
    pub stage: Stage,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub username: String,
    pub pages: usize,
    pub stop: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumeration_error: Option<String>,
    /// Listings enumerated on the closet pages.
    pub found: usize,
    /// Dropped because their slug was already stored.
    pub skipped: usize,
    /// Listings that reached the writers.
    pub processed: usize,
    /// Of those, listings carrying detail-page fields.
    pub with_details: usize,
    pub written_remote: usize,
    pub new: usize,
    pub updated: usize,
    pub status_page: bool,
    pub json_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
    pub errors: Vec<ItemError>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub listings: Vec<Listing>,
}

/// Run the whole pipeline. Remote steps happen only when both a remote target
/// and a store are present. Errors are limited to an unreachable closet and
/// local file failures; per-listing problems land in `summary.errors`.
pub async fn run(
    cfg: &ScrapeConfig,
    source: &dyn PageSource,
    store: Option<&dyn ObjectStore>,
    out_dir: &Path,
    log: &LogCtx<Scrape>,
) -> Result<RunOutcome> {
    let remote = match (store, cfg.remote.as_ref()) {
        (Some(store), Some(target)) => Some((store, target)),
        _ => None,
    };

    let known = match remote {
        Some((store, target)) => dedup::load_or_empty(store, &target.prefix, log).await,
        None => KnownSlugs::new(),
    };

    let enumeration = closet::enumerate(source, cfg, log).await?;
    let found = enumeration.listings.len();
    log.info_kv("🔗 listings found", [("count", found.to_string()), ("pages", enumeration.pages.to_string())]);

    let filtered = {
        let _g = log.span(&ScrapePhase::Filter).entered();
        dedup::filter(enumeration.listings, &known, cfg.incremental)
    };
    if filtered.skipped > 0 {
        log.info_kv("⏭️ skipping stored listings", [("count", filtered.skipped.to_string())]);
    }
    let mut listings = filtered.kept;

    let mut errors = Vec::new();
    if cfg.visit_details && !listings.is_empty() {
        tokio::time::sleep(cfg.delay).await;
        let failures = detail::enrich_all(source, &mut listings, &cfg.base_url, cfg.delay, log).await;
        errors.extend(failures.into_iter().map(|f| ItemError { slug: f.slug, stage: Stage::Detail, error: f.error.to_string() }));
    }

    let stamp = utc_stamp();
    for l in listings.iter_mut() {
        l.scraped_at = stamp.clone();
    }

    let _w = log.span(&ScrapePhase::Write).entered();
    let mut summary = RunSummary {
        username: cfg.username.clone(),
        pages: enumeration.pages,
        stop: enumeration.stop,
        enumeration_error: enumeration.error,
        found,
        skipped: filtered.skipped,
        processed: listings.len(),
        with_details: listings.iter().filter(|l| l.has_details()).count(),
        written_remote: 0,
        new: 0,
        updated: 0,
        status_page: false,
        json_path: None,
        csv_path: None,
        errors,
    };

    if let Some((store, target)) = remote {
        let report = remote::write_remote(store, target, &listings, &known, log).await;
        summary.written_remote = report.written;
        summary.new = report.new;
        summary.updated = report.updated;
        summary.errors.extend(report.failures.into_iter().map(|(slug, error)| ItemError { slug, stage: Stage::Remote, error }));
        summary.status_page = status_page::publish(store, target, &cfg.username, report.written, report.new, utc_stamp(), log).await;
    }

    if cfg.writes_local() {
        let local = sink::write_local(&listings, cfg, out_dir).context("writing local output")?;
        if let Some(p) = &local.json_path {
            log.info_kv("💾 saved json", [("path", p.display().to_string()), ("count", listings.len().to_string())]);
        }
        if let Some(p) = &local.csv_path {
            log.info_kv("💾 saved csv", [("path", p.display().to_string()), ("count", listings.len().to_string())]);
        }
        summary.json_path = local.json_path;
        summary.csv_path = local.csv_path;
    }

    log.totals(summary.found, summary.skipped, summary.processed, summary.written_remote, summary.errors.len());
    Ok(RunOutcome { summary, listings })
}
