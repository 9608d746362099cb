use clap::{Parser, ValueEnum};
use fluxpay::application::engine::{BillingEngine, Stores};
use fluxpay::config::EngineConfig;
use fluxpay::infrastructure::in_memory::{
    InMemoryLedger, InMemoryPaymentStore, InMemoryPolicyStore, InMemorySubscriptionStore,
    ManualClock,
};
use fluxpay::interfaces::csv::command_reader::CommandReader;
use fluxpay::interfaces::csv::report_writer::ReportWriter;
use fluxpay::interfaces::script::ScriptSession;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input script CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Fee owner account [env: FLUXPAY_FEE_OWNER, default: deployer]
    #[arg(long)]
    fee_owner: Option<String>,

    /// Initial fee rate in basis points [env: FLUXPAY_FEE_BPS, default: 100]
    #[arg(long)]
    fee_bps: Option<u16>,

    /// Tick the logical clock starts at [env: FLUXPAY_START_TICK, default: 0]
    #[arg(long)]
    start_tick: Option<u64>,

    /// Report format written to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

fn in_memory_stores() -> Stores {
    Stores {
        payments: Box::new(InMemoryPaymentStore::new()),
        subscriptions: Box::new(InMemorySubscriptionStore::new()),
        policy: Box::new(InMemoryPolicyStore::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use fluxpay::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Stores {
                payments: Box::new(store.clone()),
                subscriptions: Box::new(store.clone()),
                policy: Box::new(store),
            })
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    let config =
        EngineConfig::from_env().with_overrides(cli.fee_owner, cli.fee_bps, cli.start_tick);

    let ledger = InMemoryLedger::new();
    let clock = Arc::new(ManualClock::new(config.start_tick));
    let engine = BillingEngine::open(
        open_stores(cli.db_path)?,
        Arc::new(ledger.clone()),
        clock.clone(),
        config.fee_policy().into_diagnostic()?,
    )
    .await
    .into_diagnostic()?;
    let session = ScriptSession::new(engine, ledger, clock);

    // Replay the script; a rejected row is logged and does not stop the run
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for (index, request) in reader.requests().enumerate() {
        let row = index + 1;
        match request {
            Ok(request) => {
                if let Err(e) = session.apply(request).await {
                    warn!(row, code = ?e.code(), "Error processing command: {}", e);
                }
            }
            Err(e) => {
                warn!(row, "Error reading command: {}", e);
            }
        }
    }

    let report = session.report().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    match cli.format {
        OutputFormat::Csv => writer.write_csv(&report),
        OutputFormat::Json => writer.write_json(&report),
    }
    .into_diagnostic()?;

    Ok(())
}
