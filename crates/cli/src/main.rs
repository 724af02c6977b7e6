//! docsync command-line entry point.
//!
//! Results go to stdout; logs go to stderr.

mod cli;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use docsync_client::retriever_for;
use docsync_core::{AppConfig, CacheStore, SyncResult, Synchronizer};

use cli::{Cli, Commands, SyncArgs};

/// Exit status for command-line usage errors, shared with configuration failures.
const USAGE_EXIT: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(USAGE_EXIT) } else { ExitCode::SUCCESS };
        }
    };

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let outcome = match cli.command {
        Commands::Sync(args) => run_sync(&args).await,
        Commands::Sources { json } => run_sources(json),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Exit status for a failure, taken from the core error class when there is one.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<docsync_core::Error>()
        .map(|e| e.exit_code() as u8)
        .unwrap_or(1)
}

fn load_config() -> Result<AppConfig> {
    AppConfig::load()
        .map_err(docsync_core::Error::from)
        .context("failed to load configuration")
}

async fn run_sync(args: &SyncArgs) -> Result<()> {
    let config = load_config()?;
    let source = config.source(&args.source).map_err(docsync_core::Error::from)?;
    let root = args.path.clone().unwrap_or_else(|| config.store_root(&args.source, source));
    let request = args.request();

    tracing::debug!("{} {} at {}", request.as_str(), args.source, root.display());

    let retriever = retriever_for(&config, source)?;
    let sync = Synchronizer::new(CacheStore::new(&root), retriever);

    match sync.execute(request).await {
        Ok(result) => {
            output::print(&result, args.json)?;
            Ok(())
        }
        Err(e) => {
            if args.json {
                output::print(&SyncResult::failure(request, &root, &e), true)?;
            }
            Err(anyhow::Error::new(e).context(format!("{} of {} failed", request.as_str(), root.display())))
        }
    }
}

fn run_sources(as_json: bool) -> Result<()> {
    let config = load_config()?;

    if as_json {
        let sources: Vec<_> = config
            .sources
            .iter()
            .map(|(name, source)| {
                json!({
                    "name": name,
                    "kind": source.kind,
                    "url": source.url,
                    "path": config.store_root(name, source),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    for (name, source) in &config.sources {
        println!(
            "{:<12} {:<6} {}  ->  {}",
            name,
            source.kind.as_str(),
            source.url,
            config.store_root(name, source).display()
        );
    }
    Ok(())
}
