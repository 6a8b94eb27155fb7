#![allow(non_snake_case)]

use std::env;
use std::process::ExitCode;

use clap::Parser;
use rotationCalendar::cli::Cli;
use rotationCalendar::config::{AppConfig, Settings};
use rotationCalendar::runtime;
use rotationCalendar::shutdown;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Usage errors exit here with clap's own status.
    let cli = Cli::parse();

    let config = match env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path, error = %e, "ignoring unreadable config file");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    };
    let settings = Settings::load(&config);

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nAborted...");
            trigger.cancel();
        }
    });

    match runtime::run(cli, settings, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
