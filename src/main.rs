use clap::Parser;
use pricewatch_core::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let exit_code = cli::run(cli).await?;
    std::process::exit(exit_code);
}
