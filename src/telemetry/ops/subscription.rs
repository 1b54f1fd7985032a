use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Subscription;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Read, Parse }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Read => "read", Phase::Parse => "parse" } }
    fn span(&self) -> Span { match self { Phase::Read => info_span!("read"), Phase::Parse => info_span!("parse") } }
}

impl OpMarker for Subscription {
    const NAME: &'static str = "subscription";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("subscription") }
}
