//! txkv CLI
//!
//! Offline inspection of a transaction log. Never run it against a log that
//! a live server is writing to.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};
use txkv::config::SyncStrategy;
use txkv::txlog::{FileTransactionLogger, Recovery, SqliteTransactionLogger};
use txkv::{Result, TransactionLogger, TxkvError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    File,
    Sqlite,
}

/// txkv CLI
#[derive(Parser, Debug)]
#[command(name = "txkv-cli")]
#[command(about = "Inspect txkv transaction logs")]
struct Args {
    /// Backend the log was written with
    #[arg(short, long, env = "TXKV_BACKEND", value_enum, default_value = "file")]
    backend: Backend,

    /// Log file or database file
    #[arg(short, long)]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every event, one per line
    Dump,

    /// Replay-check the log and report what it holds
    Verify,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    if !args.path.is_file() {
        return Err(TxkvError::Config(format!(
            "no log at {}",
            args.path.display()
        )));
    }

    let logger: Box<dyn TransactionLogger> = match args.backend {
        Backend::File => Box::new(FileTransactionLogger::open_file(
            &args.path,
            SyncStrategy::EveryWrite,
        )?),
        Backend::Sqlite => Box::new(SqliteTransactionLogger::open_sqlite(&args.path)?),
    };

    match args.command {
        Commands::Dump => {
            let (events, errors) = logger.read_events();
            Recovery::drain(&events, &errors, |event| {
                println!(
                    "{}\t{:?}\t{}\t{:?}",
                    event.sequence, event.event_type, event.key, event.value
                );
                Ok(())
            })?;
        }
        Commands::Verify => {
            let result = Recovery::verify(logger.as_ref())?;
            println!(
                "ok: {} events ({} puts, {} deletes), last sequence {}",
                result.events_replayed, result.puts, result.deletes, result.last_sequence
            );
        }
    }

    logger.close()
}
