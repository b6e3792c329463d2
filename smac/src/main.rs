mod cli;
mod compile;
mod config;
mod report;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Command;
use std::sync::Arc;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.verbose);

    let reporter = Arc::new(report::Reporter::new(args.color.choice(), args.echo));

    match &args.command {
        Command::Compile(compile) => compile::compile_one(compile, reporter).await,
        Command::Build(build) => compile::build(build, reporter).await,
    }
}
