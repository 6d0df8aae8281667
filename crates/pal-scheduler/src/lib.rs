//! # ProductivityPal Scheduler
//!
//! In-memory timers and file-based state. Nothing here is a job queue:
//! every timer is recomputed from the clock when it is armed, so a restart
//! simply arms everything again.
//!
//! ## Architecture
//! ```text
//! IntervalScheduler        every N hours         → reminder
//! RandomDailyScheduler     one random instant    → status check
//!   ├── window 00:00–03:00   slot task ─┐
//!   ├── window 03:00–06:00   slot task ─┼─ shared fire lock → callback
//!   └── …                    slot task ─┘
//! DailyScheduler           HH:MM every day       → job tracker
//!
//! StateStore               <data_dir>/<key>.json  (temp file + rename)
//! ```

pub mod clock;
pub mod daily;
pub mod interval;
pub mod job;
pub mod store;
pub mod windows;

pub use clock::{Clock, SystemClock, TokioClock};
pub use daily::DailyScheduler;
pub use interval::IntervalScheduler;
pub use job::{Callback, ScheduleHandle, callback};
pub use store::StateStore;
pub use windows::RandomDailyScheduler;
