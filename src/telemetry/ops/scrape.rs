use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Scrape;

#[derive(Copy, Clone, Debug)]
pub enum Phase { KnownSlugs, Enumerate, FetchPage, Filter, Detail, Write, StatusPage }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::KnownSlugs => "known_slugs",
        Phase::Enumerate => "enumerate",
        Phase::FetchPage => "fetch_page",
        Phase::Filter => "filter",
        Phase::Detail => "detail",
        Phase::Write => "write",
        Phase::StatusPage => "status_page",
    }}
    fn span(&self) -> Span { match self {
        Phase::KnownSlugs => info_span!("known_slugs"),
        Phase::Enumerate => info_span!("enumerate"),
        Phase::FetchPage => info_span!("fetch_page"),
        Phase::Filter => info_span!("filter"),
        Phase::Detail => info_span!("detail"),
        Phase::Write => info_span!("write"),
        Phase::StatusPage => info_span!("status_page"),
    }}
}

impl OpMarker for Scrape {
    const NAME: &'static str = "scrape";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("scrape") }
}
