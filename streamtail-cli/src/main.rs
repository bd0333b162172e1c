use std::io::{BufRead, IsTerminal};

use clap::Parser;
use config::ProgramConfig;
use error::AppError;
use futures::StreamExt;
use streamtail_engine::{Session, SessionEnd, StopHandle, build_token_source, create_client};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

mod cli;
mod config;
mod error;
mod output;
mod utils;

use cli::CliArgs;
use utils::progress::ProgressManager;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    match bootstrap() {
        Ok(end) if end.is_clean() => {}
        Ok(end) => {
            eprintln!("Error: {end}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            error!(error = ?e, "Application failed");
            std::process::exit(1);
        }
    }
}

fn init_logging(args: &CliArgs) -> Result<(), AppError> {
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout may carry the stream itself, so logs always go to stderr
    let writer = match &args.log_file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            BoxMakeWriter::new(MakeWriterExt::and(std::io::stderr, log_file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(writer)
        .with_ansi(args.log_file.is_none() && std::io::stderr().is_terminal())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))
}

/// Stop the session when `q` is entered on an interactive stdin.
fn spawn_quit_key(stop: StopHandle) {
    if !std::io::stdin().is_terminal() {
        return;
    }
    info!("Press q<enter> to exit.");
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim() == "q" => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        stop.stop();
    });
}

#[tokio::main]
async fn bootstrap() -> Result<SessionEnd, AppError> {
    let args = CliArgs::parse();
    init_logging(&args)?;

    let program_config = ProgramConfig::from_args(&args)?;
    info!(
        channel = program_config.identity.channel(),
        variant = program_config.identity.variant(),
        output = %program_config.output,
        auth = ?program_config.auth.mode(),
        "Starting streamtail"
    );

    let auth_client = create_client(&program_config.session.http)?;
    let token_source = build_token_source(
        &program_config.auth,
        auth_client,
        &program_config.session.endpoints.oauth_token_url,
    );

    let sink = program_config.output.open_sink().await?;
    let (mut session, mut status) = Session::spawn(
        program_config.session,
        program_config.identity,
        token_source,
        sink,
    )?;

    let progress = if program_config.show_progress {
        ProgressManager::new()
    } else {
        ProgressManager::new_disabled()
    };

    spawn_quit_key(session.stop_handle());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = status.next() => match event {
                Some(event) => progress.handle_event(&event),
                None => break,
            },
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(e) = result {
                    warn!(error = %e, "Could not listen for Ctrl-C");
                    continue;
                }
                info!("Interrupted, stopping");
                session.stop();
            }
        }
    }

    let end = session.wait().await?;
    progress.finish(format!("Finished: {end}"));
    if end.is_clean() {
        info!(reason = %end, "Session ended");
    } else {
        error!(reason = %end, "Session ended");
    }
    Ok(end)
}
