use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::record::{parse_timestamp, ActivityRecord, LOG_HEADERS};

/// Append-only CSV store of closed focus intervals.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedLog {
    pub records: Vec<ActivityRecord>,
    pub total_rows: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone)]
struct LogColumns {
    app: usize,
    window: Option<usize>,
    start: usize,
    end: usize,
}

impl LogColumns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let app = find_header_index(headers, &["app", "app_name"]);
        let start = find_header_index(headers, &["start"]);
        let end = find_header_index(headers, &["end"]);
        let (Some(app), Some(start), Some(end)) = (app, start, end) else {
            bail!("activity log missing required columns. Need app, start and end.");
        };

        Ok(Self {
            app,
            window: find_header_index(headers, &["window", "title"]),
            start,
            end,
        })
    }
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Appends the interval `[start, end)` for `(app, window)`.
    ///
    /// Creates the parent directory and the header row on first use. Empty or
    /// reversed intervals are not written and yield `Ok(None)`.
    pub fn record(
        &self,
        app: &str,
        window: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Option<ActivityRecord>> {
        let Some(record) = ActivityRecord::new(app, window, start, end) else {
            tracing::debug!(app, window, %start, %end, "skipping empty interval");
            return Ok(None);
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create activity log directory: {}", parent.display())
            })?;
        }

        let is_new = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open activity log: {}", self.path.display()))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer
                .write_record(LOG_HEADERS)
                .with_context(|| format!("failed to write log header: {}", self.path.display()))?;
        }
        writer
            .write_record(record.to_row())
            .with_context(|| format!("failed to append to activity log: {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("failed to flush activity log: {}", self.path.display()))?;

        Ok(Some(record))
    }

    /// Moves the log aside under a name stamped with `completed_at`.
    /// Returns `None` when there is nothing to archive.
    pub fn archive(&self, completed_at: NaiveDateTime) -> Result<Option<PathBuf>> {
        if !self.exists() {
            return Ok(None);
        }

        let target = archived_path(&self.path, completed_at);
        fs::rename(&self.path, &target).with_context(|| {
            format!(
                "failed to archive activity log {} to {}",
                self.path.display(),
                target.display()
            )
        })?;
        Ok(Some(target))
    }

    pub fn load(&self) -> Result<LoadedLog> {
        load_records(&self.path)
    }
}

/// `data/activity.csv` at 2024-01-01 10:05:00 becomes
/// `data/activity_20240101_100500.csv`.
pub fn archived_path(path: &Path, completed_at: NaiveDateTime) -> PathBuf {
    let stamp = completed_at.format("%Y%m%d_%H%M%S");
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}_{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{stamp}"),
    };
    path.with_file_name(file_name)
}

pub fn load_records(path: &Path) -> Result<LoadedLog> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open activity log: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read log headers: {}", path.display()))?
        .clone();
    if headers.iter().all(|header| header.trim().is_empty()) {
        tracing::debug!(path = %path.display(), "activity log is empty");
        return Ok(LoadedLog::default());
    }
    let columns = LogColumns::from_headers(&headers)?;

    let mut loaded = LoadedLog::default();
    for (row_idx, row_result) in reader.records().enumerate() {
        loaded.total_rows += 1;
        let row = match row_result {
            Ok(row) => row,
            Err(err) => {
                loaded.skipped_rows += 1;
                tracing::warn!(row = row_idx + 2, "activity log row parse error: {err}");
                continue;
            }
        };

        match parse_log_row(&row, &columns) {
            Some(record) => loaded.records.push(record),
            None => {
                loaded.skipped_rows += 1;
                tracing::warn!(row = row_idx + 2, "skipping malformed activity log row");
            }
        }
    }

    Ok(loaded)
}

fn parse_log_row(row: &StringRecord, columns: &LogColumns) -> Option<ActivityRecord> {
    let app = row.get(columns.app).map(str::trim).filter(|v| !v.is_empty())?;
    let window = columns
        .window
        .and_then(|idx| row.get(idx))
        .unwrap_or_default();
    let start = row.get(columns.start).and_then(parse_timestamp)?;
    let end = row.get(columns.end).and_then(parse_timestamp)?;
    ActivityRecord::new(app, window, start, end)
}

fn find_header_index(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    let normalized_aliases: HashSet<String> =
        aliases.iter().map(|alias| normalize_header_key(alias)).collect();

    headers
        .iter()
        .position(|header| normalized_aliases.contains(&normalize_header_key(header)))
}

fn normalize_header_key(value: &str) -> String {
    value
        .trim_start_matches('\u{feff}')
        .trim()
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}
