use chrono::NaiveDateTime;

/// Column order of the activity log. Written once as the header row.
pub const LOG_HEADERS: [&str; 5] = ["app", "window", "start", "end", "duration_seconds"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One closed focus interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub app: String,
    pub window: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_seconds: f64,
}

impl ActivityRecord {
    /// Builds a record from its interval bounds. Returns `None` when the
    /// interval is empty or reversed.
    pub fn new(
        app: impl Into<String>,
        window: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Option<Self> {
        if end <= start {
            return None;
        }
        Some(Self {
            app: app.into(),
            window: window.into(),
            start,
            end,
            duration_seconds: interval_seconds(start, end),
        })
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds / 60.0
    }

    pub fn to_row(&self) -> [String; 5] {
        [
            self.app.clone(),
            self.window.clone(),
            format_timestamp(self.start),
            format_timestamp(self.end),
            format_seconds(self.duration_seconds),
        ]
    }
}

/// `(end - start)` in seconds, rounded to two decimals.
pub fn interval_seconds(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let delta = end - start;
    let seconds = match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    };
    round_hundredths(seconds)
}

pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    const FORMATS: [&str; 3] = [TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Shortest decimal form of an already rounded value, always carrying a
/// fractional part (`300.0`, `12.35`).
pub fn format_seconds(value: f64) -> String {
    let mut text = format!("{}", round_hundredths(value));
    if !text.contains('.') && !text.contains("inf") && !text.contains("NaN") {
        text.push_str(".0");
    }
    text
}
