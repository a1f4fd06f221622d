use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::normalize::DEFAULT_TITLE_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Show an existing activity log.
    Render(PathBuf),
    /// Ask for a duration, track, then show and archive the log.
    Track,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub log_path: PathBuf,
    pub poll_interval: Duration,
    pub title_limit: usize,
}

impl Config {
    pub fn from_args() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut render_path: Option<PathBuf> = None;
        let mut log_path = default_log_path();
        let mut poll_ms: u64 = 1000;
        let mut title_limit = DEFAULT_TITLE_LIMIT;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--log" => {
                    let value = args.next().context("missing value for --log")?;
                    log_path = PathBuf::from(value);
                }
                "--poll-ms" => {
                    let value = args.next().context("missing value for --poll-ms")?;
                    poll_ms = value
                        .parse::<u64>()
                        .with_context(|| format!("invalid --poll-ms value: {value}"))?;
                }
                "--title-limit" => {
                    let value = args.next().context("missing value for --title-limit")?;
                    title_limit = value
                        .parse::<usize>()
                        .with_context(|| format!("invalid --title-limit value: {value}"))?;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => bail!("unknown argument: {arg}"),
                _ => {
                    if render_path.is_some() {
                        bail!("unexpected extra argument: {arg}");
                    }
                    render_path = Some(PathBuf::from(&arg));
                }
            }
        }

        if poll_ms == 0 {
            bail!("--poll-ms must be greater than zero");
        }
        if title_limit == 0 {
            bail!("--title-limit must be greater than zero");
        }

        Ok(Self {
            mode: render_path.map_or(Mode::Track, Mode::Render),
            log_path,
            poll_interval: Duration::from_millis(poll_ms),
            title_limit,
        })
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("data").join("activity.csv")
}

fn print_help() {
    println!(
        "\
DwellTrace

Usage:
  dwelltrace [<log.csv>] [--log <path>] [--poll-ms <ms>] [--title-limit <n>]

With a log path, shows that log. Without one, asks how long to track,
records focus changes, then shows and archives the log.

Options:
  --log          Activity log written while tracking (default: data/activity.csv)
  --poll-ms      Sampling interval in milliseconds (default: 1000)
  --title-limit  Window title length before truncation (default: 30)
  -h, --help     Print this help"
    );
}
