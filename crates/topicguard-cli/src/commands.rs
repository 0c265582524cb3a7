//! Command definitions and execution.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use topicguard_runtime::{ClientArgs, GuardConfig, GuardError};

use crate::output::{render_assessment, render_lint, LintReport, OutputFormat};

/// Check that text stays on allowed topics.
#[derive(Parser, Debug)]
#[command(name = "topicguard", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate one text against a guard configuration
    Check(CheckArgs),

    /// Validate a guard configuration without calling any model
    Lint(LintArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Guard configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Text to check; read from stdin when omitted
    #[arg(short, long)]
    pub text: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// API key for the hosted LLM
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API base URL for the hosted LLM
    #[arg(long, env = "OPENAI_API_BASE")]
    pub api_base: Option<String>,
}

impl CheckArgs {
    fn client_args(&self) -> ClientArgs {
        let mut args = ClientArgs::new();
        if let Some(key) = &self.api_key {
            args = args.with_api_key(key.as_str());
        }
        if let Some(base) = &self.api_base {
            args = args.with_api_base(base.as_str());
        }
        args
    }
}

#[derive(Args, Debug)]
pub struct LintArgs {
    /// Guard configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// The text passed, or the configuration is valid
    Pass = 0,
    /// The text failed validation
    Fail = 1,
    /// The configuration or input is unusable
    ConfigError = 2,
    /// A model service failed
    ServiceError = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Exit code for an error that stopped a command.
    pub fn for_error(err: &anyhow::Error) -> Self {
        if let Some(guard_err) = err.downcast_ref::<GuardError>() {
            return if guard_err.is_configuration() {
                ExitCode::ConfigError
            } else {
                ExitCode::ServiceError
            };
        }
        ExitCode::ConfigError
    }
}

pub async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Check(args) => match execute_check(&args).await {
            Ok(code) => code,
            Err(err) => {
                eprintln!("error: {:#}", err);
                ExitCode::for_error(&err)
            }
        },
        Command::Lint(args) => execute_lint(&args),
    }
}

pub async fn execute_check(args: &CheckArgs) -> anyhow::Result<ExitCode> {
    let config = GuardConfig::from_file(&args.config)?;
    let guard = config
        .guard_builder()?
        .client_args(args.client_args())
        .build()?;

    let text = match &args.text {
        Some(text) => text.clone(),
        None => read_stdin().await?,
    };

    let assessment = guard.assess(&text).await?;
    println!("{}", render_assessment(&assessment, args.format)?);

    Ok(if assessment.verdict.is_pass() {
        ExitCode::Pass
    } else {
        ExitCode::Fail
    })
}

async fn read_stdin() -> anyhow::Result<String> {
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    Ok(buf.trim_end_matches(['\n', '\r']).to_string())
}

pub fn execute_lint(args: &LintArgs) -> ExitCode {
    let report = lint(&args.config);
    match render_lint(&report, args.format) {
        Ok(rendered) => println!("{}", rendered),
        Err(err) => eprintln!("error: {}", err),
    }
    if report.valid {
        ExitCode::Pass
    } else {
        ExitCode::ConfigError
    }
}

/// Load and check a configuration without building any client.
pub fn lint(path: &std::path::Path) -> LintReport {
    let config = match GuardConfig::from_file(path) {
        Ok(config) => config,
        Err(err) => return LintReport::failed(err.to_string()),
    };

    let topics = match config.policy.to_configuration() {
        Ok(topics) => topics,
        Err(err) => return LintReport::failed(err.to_string()),
    };

    let mut report = LintReport {
        valid: true,
        mode: None,
        valid_topics: topics.valid_topics().iter().cloned().collect(),
        invalid_topics: topics.invalid_topics().iter().cloned().collect(),
        threshold: Some(topics.threshold().value()),
        errors: Vec::new(),
    };

    match config.check() {
        Ok(mode) => report.mode = Some(mode),
        Err(err) => {
            tracing::debug!(error = %err, "Configuration check failed");
            report.valid = false;
            report.errors.push(err.to_string());
        }
    }

    report
}
