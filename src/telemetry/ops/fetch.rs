use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Fetch;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Dispatch, Retrieve, Collect }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Dispatch => "dispatch",
        Phase::Retrieve => "retrieve",
        Phase::Collect => "collect",
    }}
    fn span(&self) -> Span { match self {
        Phase::Dispatch => info_span!("dispatch"),
        Phase::Retrieve => info_span!("retrieve"),
        Phase::Collect => info_span!("collect"),
    }}
}

impl OpMarker for Fetch {
    const NAME: &'static str = "fetch";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("fetch") }
}
