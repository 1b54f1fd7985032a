use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;

mod config;
mod enrich;
mod fetch;
mod llm;
mod organize;
mod output;
mod render;
mod store;
mod subscription;
mod telemetry;

#[derive(Parser)]
#[command(name = "podcast-organizer", about = "Organize podcast subscriptions from an OPML export into Markdown")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(flatten)]
    organize: organize::OrganizeCmd,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // stderr logging; respects RUST_LOG and PODCAST_LOG_FORMAT
    telemetry::config::init_tracing(cli.verbose);

    organize::run(cli.organize).await
}
