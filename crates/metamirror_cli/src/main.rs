//! `metamirror`: shadow-tree mirroring from the command line.

mod cli;
mod observer;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use metamirror_fs::MetaMirror;

use crate::cli::Args;
use crate::observer::ConsoleObserver;

fn init_tracing(log_level: tracing::Level) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();
}

fn run(args: &Args) -> Result<()> {
    let mirror = MetaMirror::with_os_backend(args.to_options());
    let mut observer = ConsoleObserver::new(args.verbose, io::stdout(), io::stderr());

    if args.single {
        mirror.mirror_item(&args.source, &args.destination, &mut observer)?;
        return Ok(());
    }

    let report = mirror.mirror_tree(&args.source, &args.destination, &mut observer)?;
    tracing::debug!(counts = ?report.to_dict(), "run finished");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("metamirror: {e}");
            ExitCode::FAILURE
        }
    }
}
