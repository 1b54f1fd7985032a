use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Organize;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Config, Parse, Fetch, Enrich, Render }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Config => "config",
        Phase::Parse => "parse",
        Phase::Fetch => "fetch",
        Phase::Enrich => "enrich",
        Phase::Render => "render",
    }}
    fn span(&self) -> Span { match self {
        Phase::Config => info_span!("config"),
        Phase::Parse => info_span!("parse"),
        Phase::Fetch => info_span!("fetch_stage"),
        Phase::Enrich => info_span!("enrich_stage"),
        Phase::Render => info_span!("render_stage"),
    }}
}

impl OpMarker for Organize {
    const NAME: &'static str = "organize";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("organize") }
}
