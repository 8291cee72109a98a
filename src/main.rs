use clap::Parser;
use weather_load_bench::cli::{run, Cli};
use weather_load_bench::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
