use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Render;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Build, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Build => "build", Phase::Write => "write" } }
    fn span(&self) -> Span { match self { Phase::Build => info_span!("build"), Phase::Write => info_span!("write") } }
}

impl OpMarker for Render {
    const NAME: &'static str = "render";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("render") }
}
