use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::sync::OnceLock;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::closet::{api, grid};
use crate::config::{EnvDefaults, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::source::{HttpSource, PageSource};
use crate::telemetry;
use crate::telemetry::ops::inspect::Phase as InspectPhase;

const MAX_ITEMS: usize = 20;
const SAMPLE: usize = 5;

/// `closet inspect <username>`: dump what a closet page exposes.
#[derive(Args, Debug)]
pub struct InspectCmd {
    pub username: String,
    /// Report file
    #[arg(short, long, default_value = "debug_page_info.txt")]
    pub output: String,
}

#[derive(Debug, Default, Serialize)]
pub struct PageReport {
    pub url: String,
    pub content_length: usize,
    pub scripts: usize,
    pub window_vars: BTreeSet<String>,
    pub api_endpoints: BTreeSet<String>,
    pub page_size_hints: BTreeSet<String>,
    pub data_attributes: BTreeSet<String>,
    pub listing_elements: usize,
    pub json_ld_blocks: usize,
    pub pagination_links: Vec<String>,
    pub listing_urls: usize,
    pub sample_listing_urls: Vec<String>,
    pub load_more_hints: usize,
    pub page_group_id: Option<String>,
}

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Structure report for one fetched closet page.
pub fn analyze(url: &str, html: &str) -> PageReport {
    static WINDOW: OnceLock<Regex> = OnceLock::new();
    static ENDPOINT: OnceLock<Regex> = OnceLock::new();
    static PAGE_SIZE: OnceLock<Regex> = OnceLock::new();
    static PAGINATION: OnceLock<Regex> = OnceLock::new();
    static LOAD_MORE: OnceLock<Regex> = OnceLock::new();
    static GROUP: OnceLock<Regex> = OnceLock::new();

    let doc = Html::parse_document(html);
    let mut report = PageReport { url: url.to_string(), content_length: html.len(), ..Default::default() };

    if let Ok(sel) = Selector::parse("script") {
        for script in doc.select(&sel) {
            report.scripts += 1;
            if script.value().attr("type") == Some("application/ld+json") {
                report.json_ld_blocks += 1;
            }
            let text = script.text().collect::<String>();
            for c in re(&WINDOW, r"window\.([A-Za-z_][A-Za-z0-9_]*)\s*=").captures_iter(&text) {
                report.window_vars.insert(c[1].to_string());
            }
            for c in re(&ENDPOINT, r#"["']([^"'\s]*(?:/api/|/vm-rest/|graphql)[^"'\s]*)["']"#).captures_iter(&text) {
                report.api_endpoints.insert(c[1].to_string());
            }
            for c in re(&PAGE_SIZE, r#"(?i)["']?(?:page[_-]?size|per[_-]?page|count|limit)["']?\s*[:=]\s*(\d+)"#).captures_iter(&text) {
                report.page_size_hints.insert(c[1].to_string());
            }
        }
    }

    for el in doc.root_element().descendants().filter_map(scraper::ElementRef::wrap) {
        let mut has_listing_attr = false;
        for (name, _) in el.value().attrs() {
            if name.starts_with("data-") {
                report.data_attributes.insert(name.to_string());
            }
            has_listing_attr |= matches!(name, "data-listing-id" | "data-et-prop-listing_id" | "data-listing");
        }
        if has_listing_attr {
            report.listing_elements += 1;
        }
    }

    if let Ok(sel) = Selector::parse("a[href]") {
        let pagination = re(&PAGINATION, r"[?&](?:page|offset|max_id|cursor)=");
        report.pagination_links = doc
            .select(&sel)
            .filter_map(|a| a.value().attr("href"))
            .filter(|h| pagination.is_match(h))
            .take(SAMPLE)
            .map(str::to_string)
            .collect();
    }

    let paths = grid::listing_paths(html);
    report.listing_urls = paths.len();
    report.sample_listing_urls = paths.into_iter().take(SAMPLE).collect();
    report.load_more_hints = re(&LOAD_MORE, r"(?i)load\s+more|show\s+more|next\s+page").find_iter(html).count();
    report.page_group_id = re(&GROUP, r#"["']page_group_id["']\s*:\s*["']([^"']+)["']"#)
        .captures(html)
        .map(|c| c[1].to_string());

    truncate(&mut report.window_vars);
    truncate(&mut report.api_endpoints);
    truncate(&mut report.data_attributes);
    report
}

fn truncate(set: &mut BTreeSet<String>) {
    while set.len() > MAX_ITEMS {
        set.pop_last();
    }
}

fn section(out: &mut String, title: &str) {
    let rule = "=".repeat(80);
    let _ = write!(out, "\n{rule}\n{title}\n{rule}\n");
}

fn list<'a>(out: &mut String, items: impl IntoIterator<Item = &'a String>) {
    let mut any = false;
    for i in items {
        let _ = writeln!(out, "  - {i}");
        any = true;
    }
    if !any {
        out.push_str("  (none)\n");
    }
}

impl PageReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        section(&mut out, "CLOSET PAGE STRUCTURE");
        let _ = writeln!(out, "URL: {}", self.url);
        let _ = writeln!(out, "Content length: {}", self.content_length);
        let _ = writeln!(out, "Script tags: {}", self.scripts);

        section(&mut out, "WINDOW STATE VARIABLES");
        list(&mut out, &self.window_vars);
        section(&mut out, "API ENDPOINTS");
        list(&mut out, &self.api_endpoints);
        section(&mut out, "PAGE SIZE HINTS");
        list(&mut out, &self.page_size_hints);

        section(&mut out, "DATA ATTRIBUTES");
        list(&mut out, &self.data_attributes);
        let _ = writeln!(out, "Elements with listing attributes: {}", self.listing_elements);

        section(&mut out, "STRUCTURED DATA");
        let _ = writeln!(out, "JSON-LD blocks: {}", self.json_ld_blocks);

        section(&mut out, "PAGINATION");
        list(&mut out, &self.pagination_links);
        let _ = writeln!(out, "Load-more hints: {}", self.load_more_hints);
        let _ = writeln!(out, "page_group_id: {}", self.page_group_id.as_deref().unwrap_or("(not found)"));

        section(&mut out, "LISTING URLS");
        let _ = writeln!(out, "Distinct listing URLs: {}", self.listing_urls);
        list(&mut out, &self.sample_listing_urls);
        out
    }
}

async fn fetch_page(source: &dyn PageSource, url: &str) -> Result<String> {
    source.get_text(url).await.with_context(|| format!("fetching {}", url))
}

pub async fn run(args: InspectCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::inspect();
    let _root = log.root_span_kv([("username", args.username.clone()), ("output", args.output.clone())]).entered();

    let envd = EnvDefaults::from_env();
    let base = envd.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let timeout = std::time::Duration::from_secs(envd.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let url = api::closet_url(&base, &args.username).context("building closet url")?;

    let html = {
        let _s = log.span(&InspectPhase::Fetch).entered();
        fetch_page(&HttpSource::new(timeout)?, &url).await?
    };
    let report = {
        let _s = log.span(&InspectPhase::Analyze).entered();
        analyze(&url, &html)
    };
    {
        let _s = log.span(&InspectPhase::Save).entered();
        fs::write(&args.output, report.render()).with_context(|| format!("writing {}", args.output))?;
    }

    log.info_kv("🧭 page report saved", [
        ("path", args.output.clone()),
        ("listing_urls", report.listing_urls.to_string()),
        ("scripts", report.scripts.to_string()),
        ("data_attributes", report.data_attributes.len().to_string()),
        ("api_endpoints", report.api_endpoints.len().to_string()),
    ]);

    if telemetry::config::json_mode() {
        log.result(&report, started)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::{MockReply, MockSource};

    const PAGE: &str = r#"<html><head>
        <script>window.__INITIAL_STATE__ = {"closet": {"page_group_id": "pg-77", "per_page": 48}};
          fetch("/vm-rest/users/alice/posts/filtered");</script>
        <script type="application/ld+json">{"@type": "Person"}</script>
        </head><body>
        <div class="tile" data-et-prop-listing_id="a1"><a href="/listing/Top-a1">Top</a></div>
        <div class="tile" data-et-prop-listing_id="b2"><a href="/listing/Skirt-b2">Skirt</a></div>
        <a href="/closet/alice?max_id=2">Load more</a>
        </body></html>"#;

    #[test]
    fn reports_page_structure() {
        let r = analyze("https://poshmark.com/closet/alice", PAGE);
        assert_eq!(r.scripts, 2);
        assert_eq!(r.json_ld_blocks, 1);
        assert!(r.window_vars.contains("__INITIAL_STATE__"));
        assert!(r.api_endpoints.contains("/vm-rest/users/alice/posts/filtered"));
        assert!(r.page_size_hints.contains("48"));
        assert!(r.data_attributes.contains("data-et-prop-listing_id"));
        assert_eq!(r.listing_elements, 2);
        assert_eq!(r.pagination_links, vec!["/closet/alice?max_id=2".to_string()]);
        assert_eq!(r.listing_urls, 2);
        assert_eq!(r.load_more_hints, 1);
        assert_eq!(r.page_group_id.as_deref(), Some("pg-77"));
    }

    #[test]
    fn render_has_sections() {
        let text = analyze("u", PAGE).render();
        assert!(text.contains("API ENDPOINTS"));
        assert!(text.contains("  - /listing/Top-a1"));
        assert!(text.contains("page_group_id: pg-77"));
    }

    #[tokio::test]
    async fn failed_fetch_names_status() {
        let src = MockSource::new().route("/closet/alice", vec![MockReply::Status(403)]);
        let err = fetch_page(&src, "https://poshmark.com/closet/alice").await.unwrap_err();
        assert!(format!("{:#}", err).contains("403"));
    }

    #[test]
    fn render_starts_with_url() {
        let text = analyze("https://poshmark.com/closet/alice", PAGE).render();
        assert!(text.contains("URL: https://poshmark.com/closet/alice"));
        assert!(text.contains(&format!("Content length: {}", PAGE.len())));
    }

    #[test]
    fn empty_page_renders_placeholders() {
        let text = analyze("u", "<html></html>").render();
        assert!(text.contains("(none)"));
        assert!(text.contains("page_group_id: (not found)"));
    }
}
