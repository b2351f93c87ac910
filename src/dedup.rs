//! Incremental filtering against slugs already stored remotely.

use std::collections::HashSet;

use crate::listing::Listing;
use crate::store::{ObjectStore, StoreError};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase as ScrapePhase, Scrape};

pub type KnownSlugs = HashSet<String>;

/// Slugs named by `{prefix}/{slug}.json` keys. Other keys are ignored.
pub fn slugs_from_keys<I>(keys: I, prefix: &str) -> KnownSlugs
where
    I: IntoIterator<Item = String>,
{
    let dir = format!("{}/", prefix.trim_end_matches('/'));
    keys.into_iter()
        .filter_map(|k| {
            let rest = k.strip_prefix(&dir)?;
            let slug = rest.strip_suffix(".json")?;
            (!slug.is_empty() && !slug.contains('/')).then(|| slug.to_string())
        })
        .collect()
}

pub async fn load_known_slugs(store: &dyn ObjectStore, prefix: &str) -> Result<KnownSlugs, StoreError> {
    let dir = format!("{}/", prefix.trim_end_matches('/'));
    let keys = store.list_keys(&dir).await?;
    Ok(slugs_from_keys(keys, prefix))
}

/// Known slugs, or an empty set when the store cannot be listed.
pub async fn load_or_empty(store: &dyn ObjectStore, prefix: &str, log: &LogCtx<Scrape>) -> KnownSlugs {
    let _g = log.span(&ScrapePhase::KnownSlugs).entered();
    match load_known_slugs(store, prefix).await {
        Ok(known) => {
            log.info_kv("🗂️ known listings", [("count", known.len().to_string()), ("prefix", prefix.to_string())]);
            known
        }
        Err(e) => {
            log.warn_kv("⚠️ could not list stored listings, treating all as new", [("error", e.to_string())]);
            KnownSlugs::new()
        }
    }
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub kept: Vec<Listing>,
    pub skipped: usize,
}

/// With `incremental`, drop listings whose slug is already known.
pub fn filter(listings: Vec<Listing>, known: &KnownSlugs, incremental: bool) -> FilterOutcome {
    if !incremental {
        return FilterOutcome { kept: listings, skipped: 0 };
    }
    let before = listings.len();
    let kept: Vec<Listing> = listings.into_iter().filter(|l| !known.contains(&l.slug)).collect();
    FilterOutcome { skipped: before - kept.len(), kept }
}
