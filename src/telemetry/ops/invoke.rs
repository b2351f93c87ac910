use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Invoke;

#[derive(Copy, Clone, Debug)]
pub enum Phase { ReadEvent, Run }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::ReadEvent => "read_event", Phase::Run => "run" } }
    fn span(&self) -> Span { match self { Phase::ReadEvent => info_span!("read_event"), Phase::Run => info_span!("run") } }
}

impl OpMarker for Invoke {
    const NAME: &'static str = "invoke";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("invoke") }
}
