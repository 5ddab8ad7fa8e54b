//! # jobwarden entry point

use clap::Parser;
use jobwarden::{cli, config::ConfigLoader, telemetry};

#[tokio::main]
async fn main() {
    // Parse first so `--help`/`--version` work without any environment.
    let invocation = cli::Cli::parse();

    let config = match ConfigLoader::new().load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(cli::EXIT_FATAL);
        }
    };

    if let Err(err) = telemetry::init_tracing(&config) {
        eprintln!("telemetry error: {err}");
        std::process::exit(cli::EXIT_FATAL);
    }

    let code = cli::run(invocation, &config).await;
    std::process::exit(code);
}
