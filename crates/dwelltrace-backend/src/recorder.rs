use anyhow::Result;
use chrono::NaiveDateTime;

use crate::activity_log::ActivityLog;
use crate::monitor::ActiveWindow;

/// Transient focus state of one tracking run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_focus: Option<ActiveWindow>,
    pub interval_start: Option<NaiveDateTime>,
}

/// Turns successive probes into closed intervals in the activity log.
pub struct Recorder {
    log: ActivityLog,
    state: SessionState,
    records_written: usize,
}

impl Recorder {
    pub fn new(log: ActivityLog) -> Self {
        Self {
            log,
            state: SessionState::default(),
            records_written: 0,
        }
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Feeds one probe taken at `now`. Returns `true` on a focus change.
    ///
    /// A change closes the previous interval at `now` and opens a new one;
    /// an unchanged pair keeps the open interval running.
    pub fn observe(&mut self, focus: ActiveWindow, now: NaiveDateTime) -> Result<bool> {
        if self.state.current_focus.as_ref() == Some(&focus) {
            return Ok(false);
        }

        self.close_open_interval(now)?;
        tracing::debug!(app = %focus.app_name, window = %focus.window_name, "focus changed");
        self.state.current_focus = Some(focus);
        self.state.interval_start = Some(now);
        Ok(true)
    }

    /// Writes the open interval up to `now` and clears the state.
    pub fn flush_and_close(&mut self, now: NaiveDateTime) -> Result<()> {
        let result = self.close_open_interval(now);
        self.state = SessionState::default();
        result
    }

    fn close_open_interval(&mut self, now: NaiveDateTime) -> Result<()> {
        if let (Some(focus), Some(start)) = (&self.state.current_focus, self.state.interval_start) {
            if self
                .log
                .record(&focus.app_name, &focus.window_name, start, now)?
                .is_some()
            {
                self.records_written += 1;
            }
        }
        Ok(())
    }
}
