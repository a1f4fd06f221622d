mod config;
mod controller;
mod normalize;
mod palette;
mod summary;
mod timeline;
mod viewer;

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use dwelltrace_backend::{
    install_interrupt_handler, native_probe, parse_duration, SessionConfig, SystemClock,
    TrackingSession,
};

use crate::config::{Config, Mode};

fn main() -> Result<()> {
    init_tracing();
    let config = Config::from_args()?;

    match &config.mode {
        Mode::Render(path) => viewer::show(path, config.title_limit),
        Mode::Track => track(&config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn track(config: &Config) -> Result<()> {
    let answer = prompt("How long do you want to track? (30s, 10m, 2h, 1d, etc.): ")?;
    let seconds = parse_duration(&answer)?;

    println!("Starting tracker on {}...", std::env::consts::OS);
    let shutdown = install_interrupt_handler();
    let mut session = TrackingSession::new(
        native_probe(),
        SystemClock,
        SessionConfig {
            log_path: config.log_path.clone(),
            poll_interval: config.poll_interval,
            show_progress: true,
        },
        shutdown,
    );

    let title_limit = config.title_limit;
    let mut visualizer = |path: &Path| viewer::show(path, title_limit);
    let report = session.run(seconds, &mut visualizer)?;

    if let Some(archived) = &report.archived_to {
        println!("Saved {} intervals to {}", report.records_written, archived.display());
    }
    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush().context("failed to flush prompt")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read duration from stdin")?;
    Ok(answer.trim().to_owned())
}
