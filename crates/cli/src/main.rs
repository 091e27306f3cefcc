//! Committee registry command-line client.
//!
//! Reads and writes the committee kept in a local JSON ledger file.
//!
//! # Usage
//!
//! ```bash
//! # Join as the configured account
//! committee-ledger --account 0xAA11 join --role Delegate --reputation 50
//!
//! # Same, configured through the environment
//! COMMITTEE_LEDGER__DATA=/var/lib/committee.json \
//! COMMITTEE_LEDGER__ACCOUNT=0xAA11 \
//! committee-ledger members
//!
//! # Committee size and mean reputation
//! committee-ledger stats
//! ```

mod account;
mod config;
mod file_store;

use std::{fmt::Write as _, io::IsTerminal, process::ExitCode};

use account::FixedAccount;
use chrono::DateTime;
use clap::Parser;
use committee_ledger_sdk::{
    CommitteeMember, CommitteeSession, CommitteeStats, SdkError, SortitionOutcome, SortitionSeed,
    TransactionStatus,
};
use committee_ledger_types::Role;
use config::{Cli, Command, LogFormat};
use file_store::FileLedgerStore;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level error type for the binary.
#[derive(Debug)]
enum CliError {
    /// An operation failed before anything was submitted.
    Sdk(SdkError),
    /// A submitted operation ended in the lifecycle's error state.
    Failed(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Sdk(SdkError::NotConnected) => {
                write!(f, "{}; set --account or COMMITTEE_LEDGER__ACCOUNT", SdkError::NotConnected)
            },
            CliError::Sdk(e @ SdkError::Validation { .. }) => {
                let roles: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
                write!(f, "{e} (roles: {})", roles.join(", "))
            },
            CliError::Sdk(e) => write!(f, "{e}"),
            CliError::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<SdkError> for CliError {
    fn from(err: SdkError) -> Self {
        CliError::Sdk(err)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let store = FileLedgerStore::open(&cli.data);
    tracing::debug!(data = %store.path().display(), "opened ledger file");
    let session = CommitteeSession::builder(store).build();

    let result = run(&session, &cli).await;
    session.shutdown();

    match result {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    }
}

async fn run(
    session: &CommitteeSession<FileLedgerStore>,
    cli: &Cli,
) -> Result<String, CliError> {
    match &cli.command {
        Command::Members => {
            let members = session.refresh().await?;
            Ok(render_members(&members))
        },
        Command::Stats => {
            session.refresh().await?;
            Ok(render_stats(&session.stats()))
        },
        Command::Join { role, reputation } => {
            let provider = FixedAccount::new(cli.account.clone());
            session.connect(&provider).await?;
            match session.join(role, *reputation).await {
                Ok(member) => Ok(format!(
                    "{}\n{}",
                    status_line(&session.status()),
                    render_members(std::slice::from_ref(&member))
                )),
                Err(e) => Err(lifecycle_failure(session.status(), e)),
            }
        },
        Command::Sortition { seed } => {
            let provider = FixedAccount::new(cli.account.clone());
            session.connect(&provider).await?;
            let seed = SortitionSeed::new(
                seed.clone().unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            );
            match session.run_sortition(seed).await {
                Ok(outcome) => {
                    Ok(format!("{}\n{}", status_line(&session.status()), render_outcome(&outcome)))
                },
                Err(e) => Err(lifecycle_failure(session.status(), e)),
            }
        },
    }
}

/// Prefers the lifecycle's user-facing message when the failure went through it.
fn lifecycle_failure(status: TransactionStatus, err: SdkError) -> CliError {
    match status {
        TransactionStatus::Error(message) => CliError::Failed(message),
        _ => CliError::Sdk(err),
    }
}

fn status_line(status: &TransactionStatus) -> String {
    status.message().unwrap_or_default().to_owned()
}

fn format_date(unix_secs: i64) -> String {
    DateTime::from_timestamp(unix_secs, 0)
        .map_or_else(|| unix_secs.to_string(), |d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn render_members(members: &[CommitteeMember]) -> String {
    if members.is_empty() {
        return "No committee members\n".to_owned();
    }
    let mut out = String::new();
    for m in members {
        let _ = writeln!(
            out,
            "{:<20} {:<12} {:>3}  {:<23}  {}",
            m.id,
            m.role,
            m.reputation,
            format_date(m.joined_date),
            m.address
        );
    }
    out
}

fn render_stats(stats: &CommitteeStats) -> String {
    format!(
        "Total members: {}\nAverage reputation: {:.1}\n",
        stats.total_members, stats.average_reputation
    )
}

fn render_outcome(outcome: &SortitionOutcome) -> String {
    let mut out = format!(
        "Seed: {}\nCommittee size: {}\nSelected: {}\n",
        outcome.seed,
        outcome.committee_size,
        outcome.selected.len()
    );
    for id in &outcome.selected {
        let _ = writeln!(out, "  {id}");
    }
    out
}

/// Initializes the tracing subscriber. Logs go to stderr so stdout carries only
/// command output.
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stdout().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
