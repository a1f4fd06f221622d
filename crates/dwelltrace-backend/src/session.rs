use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::activity_log::ActivityLog;
use crate::monitor::WindowProbe;
use crate::recorder::Recorder;

pub trait Clock {
    fn now(&self) -> NaiveDateTime;
    fn sleep(&self, duration: Duration);
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Shows a finished activity log. Runs after tracking, before archival.
pub trait Visualizer {
    fn visualize(&mut self, log_path: &Path) -> Result<()>;
}

impl<F> Visualizer for F
where
    F: FnMut(&Path) -> Result<()>,
{
    fn visualize(&mut self, log_path: &Path) -> Result<()> {
        self(log_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub log_path: PathBuf,
    pub poll_interval: Duration,
    pub show_progress: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub started_at: NaiveDateTime,
    pub stopped_at: NaiveDateTime,
    pub interrupted: bool,
    pub records_written: usize,
    pub archived_to: Option<PathBuf>,
}

/// Registers a Ctrl-C handler that raises the returned flag.
pub fn install_interrupt_handler() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = Arc::clone(&shutdown);
    if let Err(err) = ctrlc::set_handler(move || {
        shutdown_signal.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("ctrlc handler registration warning: {err}");
    }
    shutdown
}

/// One timed tracking run: poll, log focus changes, then show and archive
/// the log.
pub struct TrackingSession<C: Clock> {
    probe: Box<dyn WindowProbe>,
    clock: C,
    config: SessionConfig,
    shutdown: Arc<AtomicBool>,
    phase: SessionPhase,
    phase_listener: Option<Box<dyn FnMut(SessionPhase)>>,
}

impl<C: Clock> TrackingSession<C> {
    pub fn new(
        probe: Box<dyn WindowProbe>,
        clock: C,
        config: SessionConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            probe,
            clock,
            config,
            shutdown,
            phase: SessionPhase::Idle,
            phase_listener: None,
        }
    }

    /// Calls `listener` on every phase transition made by `run`.
    pub fn with_phase_listener(mut self, listener: impl FnMut(SessionPhase) + 'static) -> Self {
        self.phase_listener = Some(Box::new(listener));
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "session phase changed");
        self.phase = phase;
        if let Some(listener) = self.phase_listener.as_mut() {
            listener(phase);
        }
    }

    /// Tracks for `duration_secs` or until interrupted. The open interval is
    /// always written before returning, whatever ended the loop.
    pub fn run(
        &mut self,
        duration_secs: i64,
        visualizer: &mut dyn Visualizer,
    ) -> Result<SessionReport> {
        let started_at = self.clock.now();
        let deadline = chrono::Duration::try_seconds(duration_secs.max(0))
            .and_then(|span| started_at.checked_add_signed(span))
            .ok_or_else(|| anyhow!("tracking duration of {duration_secs}s is out of range"))?;
        let mut recorder = Recorder::new(ActivityLog::new(&self.config.log_path));

        self.set_phase(SessionPhase::Running);
        tracing::info!(
            log = %self.config.log_path.display(),
            poll_ms = self.config.poll_interval.as_millis() as u64,
            duration_secs,
            "tracking started"
        );
        let polled = self.poll_until(deadline, &mut recorder);

        self.set_phase(SessionPhase::Stopping);
        let stopped_at = self.clock.now();
        let interrupted = self.shutdown.load(Ordering::SeqCst);
        if self.config.show_progress {
            println!("\nTracking stopped.");
        }
        tracing::info!(interrupted, "tracking stopped");

        let flushed = recorder.flush_and_close(stopped_at);
        if let Err(err) = polled {
            if let Err(flush_err) = flushed {
                tracing::warn!("final flush after storage failure also failed: {flush_err:#}");
            }
            self.set_phase(SessionPhase::Idle);
            return Err(err);
        }
        if let Err(err) = flushed {
            self.set_phase(SessionPhase::Idle);
            return Err(err);
        }

        let log = recorder.log();
        let archived_to = if log.exists() {
            if self.config.show_progress {
                println!("Generating plot...");
            }
            if let Err(err) = visualizer.visualize(log.path()) {
                tracing::warn!("visualization failed: {err:#}");
            }
            let archived = log.archive(self.clock.now());
            self.set_phase(SessionPhase::Idle);
            archived?
        } else {
            tracing::info!("no activity recorded, nothing to show");
            self.set_phase(SessionPhase::Idle);
            None
        };

        Ok(SessionReport {
            started_at,
            stopped_at,
            interrupted,
            records_written: recorder.records_written(),
            archived_to,
        })
    }

    fn poll_until(&mut self, deadline: NaiveDateTime, recorder: &mut Recorder) -> Result<()> {
        loop {
            let now = self.clock.now();
            if now >= deadline || self.shutdown.load(Ordering::SeqCst) {
                return Ok(());
            }

            let focus = self.probe.probe();
            recorder.observe(focus, now)?;

            if self.config.show_progress {
                print_progress(deadline - now);
            }
            self.clock.sleep(self.config.poll_interval);
        }
    }
}

fn print_progress(remaining: chrono::Duration) {
    let remaining = remaining.num_seconds().max(0);
    let (mins, secs) = (remaining / 60, remaining % 60);
    print!("\rTracking... {mins:02}:{secs:02} remaining");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ActiveWindow;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[derive(Clone)]
    struct ManualClock {
        now: Rc<Cell<NaiveDateTime>>,
    }

    impl ManualClock {
        fn starting_at(start: NaiveDateTime) -> Self {
            Self {
                now: Rc::new(Cell::new(start)),
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            let step = chrono::Duration::from_std(duration).unwrap();
            self.now.set(self.now.get() + step);
        }
    }

    struct ScriptedProbe {
        script: Vec<ActiveWindow>,
        calls: usize,
        interrupt_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl ScriptedProbe {
        fn new(script: Vec<ActiveWindow>) -> Self {
            Self {
                script,
                calls: 0,
                interrupt_after: None,
            }
        }
    }

    impl WindowProbe for ScriptedProbe {
        fn probe(&mut self) -> ActiveWindow {
            let window = self.script[self.calls.min(self.script.len() - 1)].clone();
            self.calls += 1;
            if let Some((after, flag)) = &self.interrupt_after {
                if self.calls >= *after {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            window
        }
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    fn config(log_path: PathBuf) -> SessionConfig {
        SessionConfig {
            log_path,
            poll_interval: Duration::from_secs(1),
            show_progress: false,
        }
    }

    fn alternating() -> Vec<ActiveWindow> {
        let a = ActiveWindow::new("AppA", "Editor");
        let b = ActiveWindow::new("AppB", "Browser");
        vec![a.clone(), a.clone(), b.clone(), b, a]
    }

    #[test]
    fn alternating_focus_is_logged_then_shown_then_archived() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("data").join("activity.csv");
        let clock = ManualClock::starting_at(start());
        let mut session = TrackingSession::new(
            Box::new(ScriptedProbe::new(alternating())),
            clock.clone(),
            config(log_path.clone()),
            Arc::new(AtomicBool::new(false)),
        );

        let shown = RefCell::new(Vec::new());
        let mut visualizer = |path: &Path| -> Result<()> {
            shown.borrow_mut().push(ActivityLog::new(path).load()?.records);
            Ok(())
        };
        let report = session.run(5, &mut visualizer).unwrap();

        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(!report.interrupted);
        assert_eq!(report.records_written, 3);
        assert_eq!(report.stopped_at, start() + chrono::Duration::seconds(5));

        let shown = shown.into_inner();
        assert_eq!(shown.len(), 1);
        let records = &shown[0];
        assert!(records.len() >= 2);
        let apps: Vec<&str> = records.iter().map(|r| r.app.as_str()).collect();
        assert_eq!(apps, vec!["AppA", "AppB", "AppA"]);
        assert!(records.iter().all(|r| r.duration_seconds > 0.0));
        let total: f64 = records.iter().map(|r| r.duration_seconds).sum();
        assert!((total - 5.0).abs() <= 1.0);
        assert_eq!(records.last().unwrap().end, report.stopped_at);

        let archived = report.archived_to.unwrap();
        assert!(!log_path.exists());
        assert!(archived.is_file());
        assert_eq!(
            archived.file_name().unwrap().to_string_lossy(),
            "activity_20240502_140005.csv"
        );
    }

    #[test]
    fn interrupt_still_flushes_open_interval() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("activity.csv");
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut probe = ScriptedProbe::new(vec![ActiveWindow::new("AppA", "Editor")]);
        probe.interrupt_after = Some((3, Arc::clone(&shutdown)));

        let mut session = TrackingSession::new(
            Box::new(probe),
            ManualClock::starting_at(start()),
            config(log_path),
            shutdown,
        );

        let shown = Cell::new(0);
        let mut visualizer = |_: &Path| -> Result<()> {
            shown.set(shown.get() + 1);
            Ok(())
        };
        let report = session.run(3600, &mut visualizer).unwrap();

        assert!(report.interrupted);
        assert_eq!(report.records_written, 1);
        assert_eq!(shown.get(), 1);
        let records = ActivityLog::new(report.archived_to.unwrap()).load().unwrap().records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_seconds, 3.0);
    }

    #[test]
    fn zero_duration_session_records_nothing() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("activity.csv");
        let mut session = TrackingSession::new(
            Box::new(ScriptedProbe::new(alternating())),
            ManualClock::starting_at(start()),
            config(log_path.clone()),
            Arc::new(AtomicBool::new(false)),
        );

        let mut visualizer = |_: &Path| -> Result<()> { panic!("nothing to show") };
        let report = session.run(0, &mut visualizer).unwrap();

        assert_eq!(report.records_written, 0);
        assert_eq!(report.archived_to, None);
        assert!(!log_path.exists());
        assert_eq!(session.phase(), SessionPhase::Idle);

        let report = session.run(-10, &mut visualizer).unwrap();
        assert_eq!(report.records_written, 0);
    }

    #[test]
    fn visualization_failure_does_not_block_archival() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("activity.csv");
        let mut session = TrackingSession::new(
            Box::new(ScriptedProbe::new(alternating())),
            ManualClock::starting_at(start()),
            config(log_path.clone()),
            Arc::new(AtomicBool::new(false)),
        );

        let mut visualizer = |_: &Path| -> Result<()> { anyhow::bail!("no display") };
        let report = session.run(2, &mut visualizer).unwrap();

        assert!(report.archived_to.is_some());
        assert!(!log_path.exists());
    }

    #[test]
    fn deadline_past_calendar_range_is_an_error() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("activity.csv");
        let mut session = TrackingSession::new(
            Box::new(ScriptedProbe::new(alternating())),
            ManualClock::starting_at(start()),
            config(log_path.clone()),
            Arc::new(AtomicBool::new(false)),
        );

        let seconds = crate::parse_duration("100000000d").unwrap();
        let mut visualizer = |_: &Path| -> Result<()> { panic!("must not visualize") };
        let err = session.run(seconds, &mut visualizer).unwrap_err();

        assert!(err.to_string().contains("out of range"));
        assert!(!log_path.exists());
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn phase_listener_sees_every_transition() {
        let dir = tempdir().unwrap();
        let phases = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&phases);
        let mut session = TrackingSession::new(
            Box::new(ScriptedProbe::new(alternating())),
            ManualClock::starting_at(start()),
            config(dir.path().join("activity.csv")),
            Arc::new(AtomicBool::new(false)),
        )
        .with_phase_listener(move |phase| seen.borrow_mut().push(phase));

        let mut visualizer = |_: &Path| -> Result<()> { Ok(()) };
        session.run(2, &mut visualizer).unwrap();

        assert_eq!(
            *phases.borrow(),
            vec![SessionPhase::Running, SessionPhase::Stopping, SessionPhase::Idle]
        );
    }

    #[test]
    fn storage_failure_is_fatal_and_skips_archival() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file").unwrap();
        let mut session = TrackingSession::new(
            Box::new(ScriptedProbe::new(alternating())),
            ManualClock::starting_at(start()),
            config(blocker.join("activity.csv")),
            Arc::new(AtomicBool::new(false)),
        );

        let mut visualizer = |_: &Path| -> Result<()> { panic!("must not visualize") };
        assert!(session.run(5, &mut visualizer).is_err());
        assert_eq!(session.phase(), SessionPhase::Idle);
    }
}
