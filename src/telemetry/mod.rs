pub mod config;
pub mod ctx;
pub mod emit;
pub mod ops;

use ctx::LogCtx;

fn ctx<O: ctx::OpMarker>() -> LogCtx<O> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }

pub fn subscription() -> LogCtx<ops::subscription::Subscription> { ctx() }
pub fn fetch() -> LogCtx<ops::fetch::Fetch> { ctx() }
pub fn enrich() -> LogCtx<ops::enrich::Enrich> { ctx() }
pub fn render() -> LogCtx<ops::render::Render> { ctx() }
pub fn organize() -> LogCtx<ops::organize::Organize> { ctx() }
