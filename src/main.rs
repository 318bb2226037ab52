//! paperchat binary entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paperchat::cli::{Cli, execute};

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "paperchat=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    let status = execute(cli, &mut stdout)?;
    writeln!(stdout)?;
    if !status.is_empty() {
        writeln!(stdout, "{status}")?;
    }
    Ok(())
}
