//! chanperm command-line runner.
//!
//! Applies the channel permission migrations to a SQLite database, runs the
//! backfill on its own, and reports migration status.

mod commands;
mod config;
mod error;
mod formatter;

use clap::Parser;
use config::Args;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chanperm=info,chanperm_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match commands::run(args) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
