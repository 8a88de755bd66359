use anyhow::Context;
use jobsh::builtins::HELP_TEXT;
use jobsh::config::{LOG_ENV, USAGE};
use jobsh::reader::LineReader;
use jobsh::shell::run_loop;
use jobsh::signals::OsSignals;
use jobsh::terminal::PrinterTerminal;
use jobsh::{CliAction, Flow, OsSpawner, Shell, ShellConfig, ShellState};
use std::env;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Diagnostics go to stderr; stdout belongs to the jobs
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let action = match ShellConfig::from_args(env::args().skip(1), |key| env::var(key).ok()) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("jobsh: {}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    let config = match action {
        CliAction::Run(config) => config,
        CliAction::Help => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        CliAction::Version => {
            println!("jobsh {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
    };

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: ShellConfig) -> anyhow::Result<()> {
    // One thread: every handler runs to completion before the next event
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let (mut reader, printer) = LineReader::spawn(config.history_path.clone())?;

    let flow = runtime.block_on(async {
        let mut os_signals = OsSignals::install().context("Failed to install signal handlers")?;
        let (job_tx, mut job_rx) = mpsc::unbounded_channel();
        let mut shell = Shell::new(
            ShellState::new(),
            OsSpawner::new(job_tx),
            PrinterTerminal::new(printer),
        );

        if !config.quiet {
            println!("{}", HELP_TEXT);
        }

        let flow = run_loop(
            &mut shell,
            &mut reader.events,
            &mut reader.prompter,
            &mut job_rx,
            &mut os_signals,
        )
        .await;
        anyhow::Ok(flow)
    })?;

    match flow {
        Flow::ForceQuit => std::process::exit(1),
        Flow::Exit | Flow::Continue => {
            reader.join();
            Ok(())
        }
    }
}
