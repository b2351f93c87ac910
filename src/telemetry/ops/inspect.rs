use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Inspect;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Fetch, Analyze, Save }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Fetch => "fetch", Phase::Analyze => "analyze", Phase::Save => "save" } }
    fn span(&self) -> Span { match self { Phase::Fetch => info_span!("fetch"), Phase::Analyze => info_span!("analyze"), Phase::Save => info_span!("save") } }
}

impl OpMarker for Inspect {
    const NAME: &'static str = "inspect";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("inspect") }
}
