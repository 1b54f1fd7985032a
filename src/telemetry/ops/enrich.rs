use tracing::{info_span, Span};

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Enrich;

#[derive(Copy, Clone, Debug)]
pub enum Phase {
    Categorize,
    TagBatch,
    Fallback,
    Merge,
}

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Categorize => "categorize",
            Phase::TagBatch => "tag_batch",
            Phase::Fallback => "fallback",
            Phase::Merge => "merge",
        }
    }

    fn span(&self) -> Span {
        match self {
            Phase::Categorize => info_span!("categorize"),
            Phase::TagBatch => info_span!("tag_batch"),
            Phase::Fallback => info_span!("fallback"),
            Phase::Merge => info_span!("merge"),
        }
    }
}

impl OpMarker for Enrich {
    const NAME: &'static str = "enrich";
    type Phase = Phase;

    fn root_span() -> Span {
        info_span!("enrich")
    }
}
