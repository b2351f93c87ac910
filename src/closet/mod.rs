//! Closet enumeration: walks the lazy-load cursor of a closet and collects
//! listing summaries.

use std::collections::HashSet;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ScrapeConfig, PAGE_SIZE};
use crate::listing::Listing;
use crate::source::{get_json, PageSource};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase as ScrapePhase, Scrape};

pub mod api;
pub mod grid;
pub mod parse;

/// Why enumeration stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    PageCap,
    EmptyPage,
    NoNewListings,
    LastPage,
    FetchFailed,
}

#[derive(Debug)]
pub struct Enumeration {
    pub listings: Vec<Listing>,
    pub pages: usize,
    pub stop: StopReason,
    /// Set when a later page failed and the result is partial.
    pub error: Option<String>,
}

/// Listings gathered so far plus the loop-guard over slugs.
#[derive(Default)]
struct Accumulator {
    listings: Vec<Listing>,
    seen: HashSet<String>,
}

impl Accumulator {
    /// Append unseen listings; returns how many were new.
    fn extend(&mut self, page: Vec<Listing>) -> usize {
        let before = self.listings.len();
        for l in page {
            if self.seen.insert(l.slug.clone()) {
                self.listings.push(l);
            }
        }
        self.listings.len() - before
    }
}

/// Parsed content of one page plus what it says about the next one.
struct PageOutcome {
    listings: Vec<Listing>,
    next_cursor: Option<String>,
    page_group_id: Option<String>,
    /// Whether a synthetic group cursor may be tried when `next_cursor` is absent.
    may_continue: bool,
}

fn outcome_from_api(data: &Value, cursor: Option<&str>, base: &str) -> PageOutcome {
    let posts = parse::find_posts(data);
    let listings: Vec<Listing> = posts.iter().filter_map(|p| parse::summary_from_post(p, base)).collect();
    PageOutcome {
        next_cursor: api::find_next_cursor(data, cursor),
        page_group_id: api::find_page_group_id(data),
        may_continue: posts.len() >= PAGE_SIZE,
        listings,
    }
}

fn page_group_from_html(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"["']page_group_id["']\s*:\s*["']([^"']+)["']"#).expect("static regex"));
    re.captures(html).map(|c| c[1].to_string())
}

/// Enumerate the closet's available listings.
///
/// Stops on the page cap, an empty page, a page with no unseen slugs, or a
/// response with no way to request the next page. A failure on page 1 of both
/// the JSON endpoint and the HTML grid is an error; later failures end the
/// walk with whatever was collected.
pub async fn enumerate(source: &dyn PageSource, cfg: &ScrapeConfig, log: &LogCtx<Scrape>) -> Result<Enumeration> {
    let _g = log.span(&ScrapePhase::Enumerate).entered();
    let mut acc = Accumulator::default();

    if cfg.max_pages == 0 {
        return Ok(Enumeration { listings: Vec::new(), pages: 0, stop: StopReason::PageCap, error: None });
    }

    let first = first_page(source, cfg, log).await?;
    let mut pages = 1;
    let found = first.listings.len();
    let new = acc.extend(first.listings);
    log.page_summary(pages, found, new, acc.listings.len());
    if found == 0 {
        return Ok(Enumeration { listings: acc.listings, pages, stop: StopReason::EmptyPage, error: None });
    }

    let mut group_id = first.page_group_id;
    let mut cursor = match next_cursor(first.next_cursor, group_id.as_deref(), first.may_continue, pages) {
        Some(c) => c,
        None => return Ok(Enumeration { listings: acc.listings, pages, stop: StopReason::LastPage, error: None }),
    };

    loop {
        if pages >= cfg.max_pages {
            return Ok(Enumeration { listings: acc.listings, pages, stop: StopReason::PageCap, error: None });
        }
        tokio::time::sleep(cfg.delay).await;
        pages += 1;

        let url = api::page_url(&cfg.base_url, &cfg.username, Some(&cursor)).context("building closet page url")?;
        let data = {
            let _s = log.span_kv(&ScrapePhase::FetchPage, [("page", pages.to_string())]).entered();
            get_json(source, &url).await
        };
        let data = match data {
            Ok(d) => d,
            Err(e) => {
                log.warn_kv("⚠️ page fetch failed, keeping partial results", [("page", pages.to_string()), ("error", e.to_string())]);
                return Ok(Enumeration { listings: acc.listings, pages, stop: StopReason::FetchFailed, error: Some(e.to_string()) });
            }
        };

        let outcome = outcome_from_api(&data, Some(&cursor), &cfg.base_url);
        let found = outcome.listings.len();
        let new = acc.extend(outcome.listings);
        log.page_summary(pages, found, new, acc.listings.len());

        if found == 0 {
            return Ok(Enumeration { listings: acc.listings, pages, stop: StopReason::EmptyPage, error: None });
        }
        if new == 0 {
            return Ok(Enumeration { listings: acc.listings, pages, stop: StopReason::NoNewListings, error: None });
        }
        if group_id.is_none() {
            group_id = outcome.page_group_id;
        }
        cursor = match next_cursor(outcome.next_cursor, group_id.as_deref(), outcome.may_continue, pages) {
            Some(c) if c != cursor => c,
            _ => return Ok(Enumeration { listings: acc.listings, pages, stop: StopReason::LastPage, error: None }),
        };
    }
}

fn next_cursor(from_response: Option<String>, group_id: Option<&str>, may_continue: bool, page: usize) -> Option<String> {
    from_response.or_else(|| match group_id {
        Some(g) if may_continue => Some(api::group_cursor(page + 1, g)),
        _ => None,
    })
}

/// Page 1 comes from the JSON endpoint, falling back to the HTML closet grid
/// when the endpoint fails or lists nothing.
async fn first_page(source: &dyn PageSource, cfg: &ScrapeConfig, log: &LogCtx<Scrape>) -> Result<PageOutcome> {
    let url = api::page_url(&cfg.base_url, &cfg.username, None).context("building closet page url")?;
    let api_result = {
        let _s = log.span_kv(&ScrapePhase::FetchPage, [("page", "1".to_string()), ("kind", "api".to_string())]).entered();
        get_json(source, &url).await
    };

    let api_error = match api_result {
        Ok(data) => {
            let outcome = outcome_from_api(&data, None, &cfg.base_url);
            if !outcome.listings.is_empty() {
                return Ok(outcome);
            }
            log.info("ℹ️  closet endpoint returned no listings, trying HTML grid");
            None
        }
        Err(e) => {
            log.warn_kv("⚠️ closet endpoint failed, trying HTML grid", [("error", e.to_string())]);
            Some(e)
        }
    };

    tokio::time::sleep(cfg.delay).await;
    let grid_url = api::closet_url(&cfg.base_url, &cfg.username).context("building closet url")?;
    let html = {
        let _s = log.span_kv(&ScrapePhase::FetchPage, [("page", "1".to_string()), ("kind", "html".to_string())]).entered();
        source.get_text(&grid_url).await
    };

    match html {
        Ok(html) => {
            let mut listings = grid::parse_grid(&html, &cfg.base_url);
            if listings.is_empty() {
                // Tiles missing: fall back to bare links found anywhere in the page.
                listings = grid::listing_paths(&html)
                    .iter()
                    .map(|p| Listing::from_link(parse::absolutize(p, &cfg.base_url)))
                    .collect();
            }
            Ok(PageOutcome { listings, next_cursor: None, page_group_id: page_group_from_html(&html), may_continue: true })
        }
        Err(html_err) => match api_error {
            Some(api_err) => Err(anyhow!("closet {} unreachable: {}; {}", cfg.username, api_err, html_err)),
            None => {
                log.warn_kv("⚠️ HTML grid fetch failed", [("error", html_err.to_string())]);
                Ok(PageOutcome { listings: Vec::new(), next_cursor: None, page_group_id: None, may_continue: false })
            }
        },
    }
}
