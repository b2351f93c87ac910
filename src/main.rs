use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

mod closet;
mod config;
mod dedup;
mod detail;
mod inspect;
mod invoke;
mod listing;
mod output;
mod pipeline;
mod scrape;
mod sink;
mod source;
mod store;
mod telemetry;
mod util;

#[derive(Parser)]
#[command(name = "closet", about = "Closet listing scraper and backup CLI")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a closet to local files and/or a bucket
    Scrape(scrape::ScrapeCmd),
    /// Run one function-style invocation from a JSON event
    Invoke(invoke::InvokeCmd),
    /// Write a structure report for a closet page
    Inspect(inspect::InspectCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // logs go to stderr. Respect RUST_LOG and CLOSET_LOG_FORMAT
    telemetry::config::init_tracing();

    match cli.command {
        Commands::Scrape(args) => scrape::run(args).await?,
        Commands::Invoke(args) => invoke::run(args).await?,
        Commands::Inspect(args) => inspect::run(args).await?,
    }

    Ok(())
}
