use chrono::Timelike;
use std::collections::{BTreeMap, HashMap};

use dwelltrace_backend::ActivityRecord;

/// One bar of an aggregate chart.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryBar {
    pub label: String,
    pub minutes: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub bars: Vec<SummaryBar>,
    pub x_label: &'static str,
    pub y_label: &'static str,
}

impl BarChart {
    pub fn max_minutes(&self) -> f64 {
        self.bars.iter().map(|bar| bar.minutes).fold(0.0, f64::max)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Total minutes per app, largest first. Ties keep first-seen order.
pub fn by_app(records: &[ActivityRecord]) -> BarChart {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for record in records {
        let total = totals.entry(record.app.as_str()).or_insert_with(|| {
            order.push(record.app.as_str());
            0.0
        });
        *total += record.duration_seconds;
    }

    let mut bars: Vec<SummaryBar> = order
        .into_iter()
        .map(|app| SummaryBar {
            label: app.to_owned(),
            minutes: totals[app] / 60.0,
        })
        .collect();
    bars.sort_by(|a, b| b.minutes.total_cmp(&a.minutes));

    BarChart {
        bars,
        x_label: "App",
        y_label: "Minutes",
    }
}

/// Total minutes per hour of day, keyed by the hour each record starts in.
pub fn by_hour(records: &[ActivityRecord]) -> BarChart {
    let mut totals: BTreeMap<u32, f64> = BTreeMap::new();
    for record in records {
        *totals.entry(record.start.hour()).or_insert(0.0) += record.duration_seconds;
    }

    BarChart {
        bars: totals
            .into_iter()
            .map(|(hour, seconds)| SummaryBar {
                label: hour.to_string(),
                minutes: seconds / 60.0,
            })
            .collect(),
        x_label: "Hour of Day",
        y_label: "Minutes",
    }
}
