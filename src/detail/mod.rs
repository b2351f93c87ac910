//! Listing detail pages: fetch, extract, merge into the summary record.

use std::time::Duration;

use crate::listing::{Field, FieldValue, Listing};
use crate::source::{FetchError, PageSource};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase as ScrapePhase, Scrape};

pub mod extract;
pub mod images;

use extract::DetailPage;

/// Fetch `listing.link` and merge every field the page yields. Summary fields
/// are left alone, except that an empty title takes the page heading.
/// Returns how many detail fields were filled.
pub async fn fetch_details(source: &dyn PageSource, listing: &mut Listing, base: &str) -> Result<usize, FetchError> {
    let html = source.get_text(&listing.link).await?;
    let page = DetailPage::parse(&html, base);
    let mut filled = 0;
    for (field, value) in extract::extract(&page) {
        if let (Field::Name, FieldValue::Text(heading)) = (field, &value) {
            if listing.title.is_empty() {
                listing.title = heading.clone();
            }
            if *heading == listing.title {
                continue;
            }
        }
        listing.apply(field, value);
        filled += 1;
    }
    Ok(filled)
}

/// Slug and cause of a detail fetch that fell back to summary fields.
#[derive(Debug)]
pub struct DetailFailure {
    pub slug: String,
    pub error: FetchError,
}

/// Enrich each listing in order, waiting `delay` between fetches. Failures
/// leave the listing as a summary and are returned for the run report.
pub async fn enrich_all(
    source: &dyn PageSource,
    listings: &mut [Listing],
    base: &str,
    delay: Duration,
    log: &LogCtx<Scrape>,
) -> Vec<DetailFailure> {
    let _g = log.span(&ScrapePhase::Detail).entered();
    let total = listings.len();
    let mut failures = Vec::new();

    for (i, listing) in listings.iter_mut().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        log.debug(format!("🔎 detail {}/{} {}", i + 1, total, listing.slug));
        match fetch_details(source, listing, base).await {
            Ok(0) => log.warn_kv("⚠️ detail page had no recognizable fields", [("slug", listing.slug.clone())]),
            Ok(_) => {}
            Err(error) => {
                log.warn_kv("⚠️ detail fetch failed, keeping summary", [("slug", listing.slug.clone()), ("error", error.to_string())]);
                failures.push(DetailFailure { slug: listing.slug.clone(), error });
            }
        }
    }
    failures
}
