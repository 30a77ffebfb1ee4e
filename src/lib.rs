//! pomotask - a Pomodoro timer that works through a queue of tasks.
//!
//! The [`timer`] module holds the state machine and knows nothing about
//! terminals or files. [`tasks`] and [`progress`] persist the task queue and
//! an in-progress timer; [`app`] and [`ui`] put a terminal front end on top.

pub mod app;
pub mod config;
pub mod error;
pub mod notify;
pub mod progress;
pub mod tasks;
pub mod timer;
pub mod ui;

pub use config::{Args, Config, Paths};
pub use error::{PomoError, Result};
pub use progress::{Prefs, ProgressSnapshot};
pub use tasks::{Task, TaskQueue};
pub use timer::{BreakOutcome, Completion, Phase, PhaseKind, Pomodoro, TaskOutcome};
