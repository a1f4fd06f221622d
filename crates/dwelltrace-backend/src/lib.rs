//! Foreground-window tracking: probes, the interval log and the timed
//! tracking session.

pub mod activity_log;
pub mod duration;
pub mod monitor;
pub mod record;
pub mod recorder;
pub mod session;

pub use activity_log::{archived_path, load_records, ActivityLog, LoadedLog};
pub use duration::{parse_duration, DurationParseError};
pub use monitor::{native_probe, ActiveWindow, UnknownProbe, WindowProbe};
pub use record::ActivityRecord;
pub use recorder::{Recorder, SessionState};
pub use session::{
    install_interrupt_handler, Clock, SessionConfig, SessionPhase, SessionReport, SystemClock,
    TrackingSession, Visualizer,
};
