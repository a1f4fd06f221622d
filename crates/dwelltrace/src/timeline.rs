use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;

use dwelltrace_backend::ActivityRecord;

use crate::normalize::WindowNameNormalizer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    #[default]
    Simple,
    Detailed,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Simple => Self::Detailed,
            Self::Detailed => Self::Simple,
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            Self::Simple => "Show windows",
            Self::Detailed => "Show apps",
        }
    }
}

/// One reconstructed interval. Geometry is in minutes from the first start.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineBar {
    pub row: usize,
    pub offset_minutes: f64,
    pub length_minutes: f64,
    pub app_color: usize,
    pub window_color: usize,
    pub record: usize,
}

impl TimelineBar {
    pub fn color(&self, mode: DisplayMode) -> usize {
        match mode {
            DisplayMode::Simple => self.app_color,
            DisplayMode::Detailed => self.window_color,
        }
    }

    pub fn end_minutes(&self) -> f64 {
        self.offset_minutes + self.length_minutes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
    pub columns: usize,
    pub label_size: f32,
}

/// Timeline geometry shared by both display modes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineLayout {
    origin: Option<NaiveDateTime>,
    rows: Vec<String>,
    window_keys: Vec<(String, String)>,
    bars: Vec<TimelineBar>,
}

impl TimelineLayout {
    pub fn build(records: &[ActivityRecord], normalizer: &WindowNameNormalizer) -> Self {
        let Some(origin) = records.iter().map(|r| r.start).min() else {
            return Self::default();
        };

        let mut rows: Vec<String> = Vec::new();
        let mut row_index: HashMap<&str, usize> = HashMap::new();
        let mut window_keys: Vec<(String, String)> = Vec::new();
        let mut window_index: HashMap<(String, String), usize> = HashMap::new();
        let mut bars = Vec::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            let row = *row_index.entry(record.app.as_str()).or_insert_with(|| {
                rows.push(record.app.clone());
                rows.len() - 1
            });

            let key = (record.app.clone(), normalizer.normalize(&record.app, &record.window));
            let window_color = match window_index.get(&key) {
                Some(color) => *color,
                None => {
                    window_keys.push(key.clone());
                    window_index.insert(key, window_keys.len() - 1);
                    window_keys.len() - 1
                }
            };

            bars.push(TimelineBar {
                row,
                offset_minutes: minutes_between(origin, record.start),
                length_minutes: minutes_between(record.start, record.end),
                app_color: row,
                window_color,
                record: idx,
            });
        }

        Self {
            origin: Some(origin),
            rows,
            window_keys,
            bars,
        }
    }

    pub fn origin(&self) -> Option<NaiveDateTime> {
        self.origin
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn bars(&self) -> &[TimelineBar] {
        &self.bars
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn span_minutes(&self) -> f64 {
        self.bars.iter().map(TimelineBar::end_minutes).fold(0.0, f64::max)
    }

    pub fn legend(&self, mode: DisplayMode) -> Legend {
        match mode {
            DisplayMode::Simple => Legend {
                entries: self
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(color, app)| LegendEntry {
                        label: app.clone(),
                        color,
                    })
                    .collect(),
                columns: 3,
                label_size: 11.0,
            },
            DisplayMode::Detailed => Legend {
                entries: self
                    .window_keys
                    .iter()
                    .enumerate()
                    .map(|(color, (app, window))| LegendEntry {
                        label: if window.is_empty() {
                            app.clone()
                        } else {
                            format!("{app}: {window}")
                        },
                        color,
                    })
                    .collect(),
                columns: 2,
                label_size: 8.0,
            },
        }
    }

    /// Tick offsets in minutes, spaced so the span shows roughly 4 to 12 ticks.
    pub fn ticks(&self) -> Vec<f64> {
        let span = self.span_minutes();
        if span <= 0.0 {
            return Vec::new();
        }
        let step = choose_tick_step_minutes(span);
        let count = (span / step).floor() as usize;
        (0..=count).map(|i| i as f64 * step).collect()
    }

    /// Wall-clock label for an offset from the first start.
    pub fn tick_label(&self, offset_minutes: f64) -> String {
        match self.origin {
            Some(origin) => {
                let at = origin + Duration::milliseconds((offset_minutes * 60_000.0).round() as i64);
                at.format("%H:%M").to_string()
            }
            None => "--:--".to_owned(),
        }
    }
}

fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

fn choose_tick_step_minutes(span_minutes: f64) -> f64 {
    const STEPS: [f64; 8] = [1.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 240.0];

    STEPS
        .iter()
        .copied()
        .find(|step| span_minutes / step <= 12.0)
        .unwrap_or_else(|| (span_minutes / 12.0 / 60.0).ceil() * 60.0)
}
