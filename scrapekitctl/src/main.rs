use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = scrapekitctl::Cli::parse();
    scrapekitctl::init_tracing(cli.verbose);
    if let Err(err) = scrapekitctl::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
