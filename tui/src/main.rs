use clap::Parser;
use wangr_tui::Cli;
use wangr_tui::run_main;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    run_main(cli).await
}
