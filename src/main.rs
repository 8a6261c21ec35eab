//! Ledger Verification CLI
//!
//! Verifies the hash chain of a JSON-lines audit ledger, one chunk at a
//! time, and extracts anomaly signals from record text.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ledger_verify::config::LedgerConfig;
use ledger_verify::ledger::{
    signals, ChainHasher, ChunkedVerifier, ColumnMap, DigestMode, JsonlRowSource, LedgerRecord,
    RowSource, SecretProvider, SessionState, VerificationReport, VerificationSession,
    FIRST_DATA_ROW,
};
use ledger_verify::LedgerError;

#[derive(Parser)]
#[command(name = "ledger-verify")]
#[command(about = "Verify the hash chain of a tamper-evident audit ledger")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./ledger-verify.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger file, overriding `ledger_path` from the configuration
    #[arg(short, long, global = true)]
    ledger: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the whole ledger, or the rest of it from a cursor
    Verify {
        /// Row to start from (resume point printed by a cancelled run)
        #[arg(long, default_value_t = FIRST_DATA_ROW)]
        cursor: usize,

        /// Rows per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Fail instead of degrading to continuity-only checks
        #[arg(long)]
        require_secret: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify a single chunk and print its result as JSON
    Step {
        #[arg(long, default_value_t = FIRST_DATA_ROW)]
        cursor: usize,

        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// List every anomaly signal in the ledger
    Signals {
        #[arg(long)]
        json: bool,
    },

    /// Recompute the digest of one data row
    Digest {
        /// Storage row position (first data row is 2)
        row: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = LedgerConfig::load(cli.config.as_deref())?;

    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("ledger_verify=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ledger_path = cli
        .ledger
        .clone()
        .or_else(|| config.ledger_path.clone())
        .ok_or_else(|| anyhow!("No ledger given; pass --ledger or set ledger_path"))?;
    let source = JsonlRowSource::open(&ledger_path)?;

    match cli.command {
        Commands::Verify {
            cursor,
            chunk_size,
            require_secret,
            json,
        } => {
            let chunk_size = chunk_size.unwrap_or(config.chunk_size);
            let (report, resume) =
                run_verify(&config, source, cursor, chunk_size, require_secret).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if !cli.quiet {
                print_report(&report);
            }
            if let Some(cursor) = resume {
                println!("Verification cancelled; resume with --cursor {}", cursor);
            }
            if !report.is_intact() {
                error!("Ledger verification found tampering");
                std::process::exit(1);
            }
        }
        Commands::Step { cursor, chunk_size } => {
            let chunk_size = chunk_size.unwrap_or(config.chunk_size);
            let secret = config.secret_provider().secret();
            let verifier = ChunkedVerifier::new(source);
            let result = verifier.verify_chunk(cursor, chunk_size, secret.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Signals { json } => {
            let found = signals::scan_source(&source, config.chunk_size)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                for signal in &found {
                    println!("row {:>6}  {:<22} {}", signal.row, signal.signal_type, signal.record_uuid);
                }
                info!("{} signals found", found.len());
            }
        }
        Commands::Digest { row } => {
            let provider = config.secret_provider();
            let secret = provider.secret().ok_or_else(|| {
                LedgerError::SecretUnavailable(format!("environment variable {} is not set", provider.var()))
            })?;
            let record = load_record(&source, row)?;
            let computed = ChainHasher::digest(&record, &secret);

            println!("variant:  {:?}", record.variant());
            println!("stored:   {}", record.record_hash);
            println!("computed: {}", computed);
            if computed != record.record_hash {
                warn!("Digest mismatch at row {}", row);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_verify(
    config: &LedgerConfig,
    source: JsonlRowSource,
    cursor: usize,
    chunk_size: usize,
    require_secret: bool,
) -> Result<(VerificationReport, Option<usize>)> {
    let provider = config.secret_provider();
    if require_secret {
        DigestMode::for_secret(provider.secret().as_ref()).require_keyed()?;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    info!("Verifying ledger: {}", source.path().display());
    let verifier = ChunkedVerifier::new(source);
    let mut session = VerificationSession::resume(cursor, chunk_size)?;
    session
        .run_until_complete(&verifier, &provider, &cancel)
        .await?;

    let resume = match session.state() {
        SessionState::Cancelled => session.resume_cursor(),
        _ => None,
    };
    Ok((session.into_report(), resume))
}

fn load_record(source: &JsonlRowSource, row: usize) -> Result<LedgerRecord> {
    let columns = ColumnMap::from_header(&source.header()?)?;
    let cells = source
        .rows(row, 1)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Row {} does not exist", row))?;
    Ok(LedgerRecord::from_row(&columns, &cells, row)?)
}

fn print_report(report: &VerificationReport) {
    println!("{}", report.summary());

    for link in &report.broken {
        println!(
            "  broken   row {:>6} {}: expected prev_hash {}, found {}",
            link.row, link.uuid, link.expected, link.found
        );
    }
    for mismatch in &report.mismatches {
        println!(
            "  mismatch row {:>6} {}: stored {}, computed {}",
            mismatch.row, mismatch.uuid, mismatch.stored, mismatch.computed
        );
    }
    for malformed in &report.malformed {
        println!(
            "  malformed row {:>5} {}: {}",
            malformed.row, malformed.uuid, malformed.reason
        );
    }

    let counts = report.signal_counts();
    if !counts.is_empty() {
        println!("\nSignals:");
        for (signal_type, count) in counts {
            println!("  {}: {}", signal_type, count);
        }
    }
}
