//! topicguard CLI
//!
//! # Usage
//!
//! ```bash
//! # Check one text
//! topicguard check --config guard.yaml --text "Who won the match last night?"
//!
//! # Check stdin, JSON output
//! echo "The senate passed the bill" | topicguard check --config guard.yaml --format json
//!
//! # Validate a configuration without calling any model
//! topicguard lint --config guard.yaml
//! ```
//!
//! # Exit Codes
//!
//! - 0: text passed (or configuration valid)
//! - 1: text failed validation
//! - 2: configuration or input error
//! - 3: model service error

mod commands;
mod output;

use clap::Parser;
use commands::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = commands::run(cli).await;
    std::process::exit(exit_code.into());
}
