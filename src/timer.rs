//! The Pomodoro state machine.
//!
//! Five phases, one optional active task, one countdown. The active task only
//! exists inside the task phases, so "a running task without a task" cannot be
//! represented. Every transition reports whether it did anything; a transition
//! fired from the wrong phase is a silent no-op.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::tasks::{Task, TaskQueue};

pub const DEFAULT_TASK_MINUTES: i64 = 25;
pub const DEFAULT_BREAK_MINUTES: i64 = 5;

// ============================================================================
// Phase
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    TaskRunning { task: Task, remaining: Duration },
    TaskPaused { task: Task, remaining: Duration },
    BreakRunning { remaining: Duration },
    BreakPaused { remaining: Duration },
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Self::Idle => PhaseKind::Idle,
            Self::TaskRunning { .. } => PhaseKind::TaskRunning,
            Self::TaskPaused { .. } => PhaseKind::TaskPaused,
            Self::BreakRunning { .. } => PhaseKind::BreakRunning,
            Self::BreakPaused { .. } => PhaseKind::BreakPaused,
        }
    }

    pub fn active_task(&self) -> Option<&Task> {
        match self {
            Self::TaskRunning { task, .. } | Self::TaskPaused { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Remaining time. `None` while idle, where the countdown means nothing.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Idle => None,
            Self::TaskRunning { remaining, .. }
            | Self::TaskPaused { remaining, .. }
            | Self::BreakRunning { remaining }
            | Self::BreakPaused { remaining } => Some(*remaining),
        }
    }

    fn running_remaining_mut(&mut self) -> Option<&mut Duration> {
        match self {
            Self::TaskRunning { remaining, .. } | Self::BreakRunning { remaining } => Some(remaining),
            _ => None,
        }
    }
}

/// Fieldless view of [`Phase`], used for persistence and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Idle,
    TaskRunning,
    TaskPaused,
    BreakRunning,
    BreakPaused,
}

impl PhaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::TaskRunning => "TaskRunning",
            Self::TaskPaused => "TaskPaused",
            Self::BreakRunning => "BreakRunning",
            Self::BreakPaused => "BreakPaused",
        }
    }

    pub fn is_task(self) -> bool {
        matches!(self, Self::TaskRunning | Self::TaskPaused)
    }

    pub fn is_break(self) -> bool {
        matches!(self, Self::BreakRunning | Self::BreakPaused)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, Self::TaskPaused | Self::BreakPaused)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown phase: {0:?}")]
pub struct UnknownPhase(pub String);

impl FromStr for PhaseKind {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(Self::Idle),
            "TaskRunning" => Ok(Self::TaskRunning),
            "TaskPaused" => Ok(Self::TaskPaused),
            "BreakRunning" => Ok(Self::BreakRunning),
            "BreakPaused" => Ok(Self::BreakPaused),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

// ============================================================================
// Completion
// ============================================================================

/// A countdown that hit zero and is waiting for the user to decide what next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Task,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Drop the task.
    Finished,
    /// Requeue the task at the front of the pending queue.
    NotFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakOutcome {
    Done,
    NextTask,
}

// ============================================================================
// Decay
// ============================================================================

/// Subtract the wall-clock time between `previous` and `now` from `remaining`.
///
/// The result never goes below zero. A clock that moved backwards counts as
/// no elapsed time.
pub fn decay(remaining: Duration, now: DateTime<Utc>, previous: DateTime<Utc>) -> Duration {
    let elapsed = now.signed_duration_since(previous).max(Duration::zero());
    remaining
        .checked_sub(&elapsed)
        .unwrap_or_else(Duration::zero)
        .max(Duration::zero())
}

// ============================================================================
// State machine
// ============================================================================

#[derive(Debug, Clone)]
pub struct Pomodoro {
    phase: Phase,
    pending: TaskQueue,
    task_len: Duration,
    break_len: Duration,
    last_tick: Option<DateTime<Utc>>,
}

impl Pomodoro {
    pub fn new(pending: TaskQueue, task_len: Duration, break_len: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            pending,
            task_len,
            break_len,
            last_tick: None,
        }
    }

    pub fn with_default_lengths(pending: TaskQueue) -> Self {
        Self::new(
            pending,
            Duration::minutes(DEFAULT_TASK_MINUTES),
            Duration::minutes(DEFAULT_BREAK_MINUTES),
        )
    }

    /// Put a previously stashed phase and tick timestamp back in place.
    pub fn restore(&mut self, phase: Phase, last_tick: Option<DateTime<Utc>>) {
        info!("Restoring {} phase", phase.kind());
        self.phase = phase;
        self.last_tick = last_tick;
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.phase.active_task()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.phase.remaining()
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        self.last_tick
    }

    pub fn pending(&self) -> &TaskQueue {
        &self.pending
    }

    /// Task list edits. They never touch the active task.
    pub fn pending_mut(&mut self) -> &mut TaskQueue {
        &mut self.pending
    }

    /// Full length of the current phase's countdown.
    pub fn total(&self) -> Option<Duration> {
        match self.kind() {
            PhaseKind::Idle => None,
            PhaseKind::TaskRunning | PhaseKind::TaskPaused => Some(self.task_len),
            PhaseKind::BreakRunning | PhaseKind::BreakPaused => Some(self.break_len),
        }
    }

    /// Time spent so far in the current phase, within `0..=total`.
    pub fn elapsed(&self) -> Option<Duration> {
        let total = self.total()?;
        let remaining = self.remaining()?;
        Some((total - remaining).max(Duration::zero()).min(total))
    }

    /// Elapsed fraction of the current phase in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        match (self.elapsed(), self.total()) {
            (Some(elapsed), Some(total)) if total > Duration::zero() => {
                (elapsed.num_milliseconds() as f64 / total.num_milliseconds() as f64).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    // --- task transitions --------------------------------------------------

    pub fn start_task(&mut self) -> bool {
        if self.kind().is_task() {
            return false;
        }
        let Some(task) = self.pending.pop_front() else {
            debug!("No pending task to start");
            return false;
        };
        info!("Starting task {:?}", task.title);
        self.phase = Phase::TaskRunning { task, remaining: self.task_len };
        true
    }

    pub fn pause_task(&mut self) -> bool {
        match std::mem::take(&mut self.phase) {
            Phase::TaskRunning { task, remaining } => {
                debug!("Pausing task {:?}", task.title);
                self.phase = Phase::TaskPaused { task, remaining };
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    pub fn resume_task(&mut self) -> bool {
        match std::mem::take(&mut self.phase) {
            Phase::TaskPaused { task, remaining } => {
                debug!("Resuming task {:?}", task.title);
                self.phase = Phase::TaskRunning { task, remaining };
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    pub fn restart_task(&mut self) -> bool {
        match std::mem::take(&mut self.phase) {
            Phase::TaskRunning { task, .. } | Phase::TaskPaused { task, .. } => {
                debug!("Restarting task {:?}", task.title);
                self.phase = Phase::TaskRunning { task, remaining: self.task_len };
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    pub fn stop_task(&mut self) -> bool {
        if !self.kind().is_task() {
            return false;
        }
        info!("Stopping task");
        self.phase = Phase::Idle;
        true
    }

    // --- break transitions -------------------------------------------------

    /// Start a break. An active task is dropped, not requeued.
    pub fn start_break(&mut self) -> bool {
        if self.kind().is_break() {
            return false;
        }
        info!("Starting break");
        self.phase = Phase::BreakRunning { remaining: self.break_len };
        true
    }

    pub fn pause_break(&mut self) -> bool {
        match self.phase {
            Phase::BreakRunning { remaining } => {
                self.phase = Phase::BreakPaused { remaining };
                true
            }
            _ => false,
        }
    }

    pub fn resume_break(&mut self) -> bool {
        match self.phase {
            Phase::BreakPaused { remaining } => {
                self.phase = Phase::BreakRunning { remaining };
                true
            }
            _ => false,
        }
    }

    pub fn restart_break(&mut self) -> bool {
        if !self.kind().is_break() {
            return false;
        }
        self.phase = Phase::BreakRunning { remaining: self.break_len };
        true
    }

    pub fn stop_break(&mut self) -> bool {
        if !self.kind().is_break() {
            return false;
        }
        info!("Stopping break");
        self.phase = Phase::Idle;
        true
    }

    // --- ticking & completion ----------------------------------------------

    /// Advance the clock to `now`.
    ///
    /// The timestamp is recorded in every phase, but only a running countdown
    /// decays, so paused time is never charged.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Completion> {
        let previous = self.last_tick.replace(now).unwrap_or(now);
        if let Some(remaining) = self.phase.running_remaining_mut() {
            *remaining = decay(*remaining, now, previous);
        }
        self.completion()
    }

    /// The countdown that ran out and still needs a decision, if any.
    pub fn completion(&self) -> Option<Completion> {
        match &self.phase {
            Phase::TaskRunning { remaining, .. } if *remaining <= Duration::zero() => {
                Some(Completion::Task)
            }
            Phase::BreakRunning { remaining } if *remaining <= Duration::zero() => {
                Some(Completion::Break)
            }
            _ => None,
        }
    }

    /// Resolve a finished task countdown, then go on break unconditionally.
    pub fn finish_task(&mut self, outcome: TaskOutcome) -> bool {
        if self.completion() != Some(Completion::Task) {
            return false;
        }
        if let Phase::TaskRunning { task, .. } = std::mem::take(&mut self.phase) {
            info!("Task {:?} ended: {:?}", task.title, outcome);
            if outcome == TaskOutcome::NotFinished {
                self.pending.push_front(task);
            }
        }
        self.start_break()
    }

    /// Resolve a finished break. `NextTask` with an empty queue changes nothing.
    pub fn finish_break(&mut self, outcome: BreakOutcome) -> bool {
        if self.completion() != Some(Completion::Break) {
            return false;
        }
        match outcome {
            BreakOutcome::Done => self.stop_break(),
            BreakOutcome::NextTask => self.start_task(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn pomodoro(titles: &[&str]) -> Pomodoro {
        Pomodoro::with_default_lengths(titles.iter().copied().collect())
    }

    fn assert_invariant(p: &Pomodoro) {
        assert_eq!(p.active_task().is_some(), p.kind().is_task(), "phase {:?}", p.kind());
        if let Some(remaining) = p.remaining() {
            assert!(remaining >= Duration::zero());
        }
    }

    #[test]
    fn test_initial_state_is_idle() {
        let p = pomodoro(&["A"]);
        assert_eq!(p.kind(), PhaseKind::Idle);
        assert!(p.active_task().is_none());
        assert!(p.remaining().is_none());
    }

    #[test]
    fn test_start_task_pops_front() {
        let mut p = pomodoro(&["A", "B"]);
        assert!(p.start_task());
        assert_eq!(p.kind(), PhaseKind::TaskRunning);
        assert_eq!(p.active_task(), Some(&Task::new("A")));
        assert_eq!(p.pending().titles(), vec!["B"]);
        assert_eq!(p.remaining(), Some(Duration::minutes(25)));
    }

    #[test]
    fn test_start_task_empty_queue_is_noop() {
        let mut p = pomodoro(&[]);
        assert!(!p.start_task());
        assert_eq!(p.kind(), PhaseKind::Idle);

        let mut p = pomodoro(&[]);
        p.start_break();
        assert!(!p.start_task());
        assert_eq!(p.kind(), PhaseKind::BreakRunning);
        assert!(p.active_task().is_none());
    }

    #[test]
    fn test_start_task_ignored_during_task() {
        let mut p = pomodoro(&["A", "B"]);
        p.start_task();
        assert!(!p.start_task());
        assert_eq!(p.active_task(), Some(&Task::new("A")));
        assert_eq!(p.pending().len(), 1);
    }

    #[test]
    fn test_pause_and_resume_task() {
        let mut p = pomodoro(&["A"]);
        assert!(!p.pause_task());
        p.start_task();
        assert!(p.pause_task());
        assert_eq!(p.kind(), PhaseKind::TaskPaused);
        assert!(!p.pause_task());
        assert!(p.resume_task());
        assert_eq!(p.kind(), PhaseKind::TaskRunning);
        assert!(!p.resume_task());
    }

    #[test]
    fn test_paused_task_does_not_decay() {
        let mut p = pomodoro(&["A"]);
        p.tick(at(0));
        p.start_task();
        p.pause_task();
        p.tick(at(600));
        assert_eq!(p.remaining(), Some(Duration::minutes(25)));

        p.resume_task();
        p.tick(at(660));
        assert_eq!(p.remaining(), Some(Duration::minutes(24)));
    }

    #[test]
    fn test_restart_task_resets_length() {
        let mut p = pomodoro(&["A"]);
        p.tick(at(0));
        p.start_task();
        p.tick(at(300));
        p.pause_task();
        assert!(p.restart_task());
        assert_eq!(p.kind(), PhaseKind::TaskRunning);
        assert_eq!(p.remaining(), Some(Duration::minutes(25)));
    }

    #[test]
    fn test_stop_task_returns_to_idle() {
        let mut p = pomodoro(&["A", "B"]);
        assert!(!p.stop_task());
        p.start_task();
        assert!(p.stop_task());
        assert_eq!(p.kind(), PhaseKind::Idle);
        assert!(p.active_task().is_none());
        // the stopped task is gone, not requeued
        assert_eq!(p.pending().titles(), vec!["B"]);
    }

    #[test]
    fn test_start_break_drops_active_task() {
        let mut p = pomodoro(&["A"]);
        p.start_task();
        assert!(p.start_break());
        assert_eq!(p.kind(), PhaseKind::BreakRunning);
        assert!(p.active_task().is_none());
        assert!(p.pending().is_empty());
        assert_eq!(p.remaining(), Some(Duration::minutes(5)));
        assert!(!p.start_break());
    }

    #[test]
    fn test_break_transitions() {
        let mut p = pomodoro(&[]);
        assert!(!p.pause_break());
        assert!(!p.restart_break());
        assert!(!p.stop_break());

        p.tick(at(0));
        p.start_break();
        p.tick(at(120));
        assert!(p.pause_break());
        assert_eq!(p.kind(), PhaseKind::BreakPaused);
        assert_eq!(p.remaining(), Some(Duration::minutes(3)));
        assert!(p.resume_break());
        assert!(p.restart_break());
        assert_eq!(p.remaining(), Some(Duration::minutes(5)));
        assert!(p.stop_break());
        assert_eq!(p.kind(), PhaseKind::Idle);
    }

    #[test]
    fn test_decay_clamps_at_zero() {
        let remaining = decay(Duration::seconds(10), at(1_000_000), at(0));
        assert_eq!(remaining, Duration::zero());
    }

    #[test]
    fn test_decay_ignores_backwards_clock() {
        let remaining = decay(Duration::seconds(10), at(0), at(60));
        assert_eq!(remaining, Duration::seconds(10));
    }

    #[test]
    fn test_first_tick_has_no_elapsed_time() {
        let mut p = pomodoro(&["A"]);
        p.start_task();
        p.tick(at(0));
        assert_eq!(p.remaining(), Some(Duration::minutes(25)));
    }

    #[test]
    fn test_task_completion_finished() {
        let mut p = pomodoro(&["A", "B"]);
        p.tick(at(0));
        p.start_task();
        assert_eq!(p.tick(at(1500)), Some(Completion::Task));
        assert!(!p.finish_break(BreakOutcome::Done));
        assert!(p.finish_task(TaskOutcome::Finished));
        assert_eq!(p.kind(), PhaseKind::BreakRunning);
        assert_eq!(p.pending().titles(), vec!["B"]);
        assert_eq!(p.completion(), None);
    }

    #[test]
    fn test_finish_task_requires_completion() {
        let mut p = pomodoro(&["A"]);
        p.start_task();
        assert!(!p.finish_task(TaskOutcome::Finished));
        assert_eq!(p.kind(), PhaseKind::TaskRunning);
    }

    #[test]
    fn test_break_completion_next_task() {
        let mut p = pomodoro(&["A"]);
        p.tick(at(0));
        p.start_break();
        assert_eq!(p.tick(at(400)), Some(Completion::Break));
        assert!(p.finish_break(BreakOutcome::NextTask));
        assert_eq!(p.kind(), PhaseKind::TaskRunning);
        assert_eq!(p.active_task(), Some(&Task::new("A")));
    }

    #[test]
    fn test_break_completion_next_task_with_empty_queue() {
        let mut p = pomodoro(&[]);
        p.tick(at(0));
        p.start_break();
        p.tick(at(400));
        assert!(!p.finish_break(BreakOutcome::NextTask));
        assert_eq!(p.completion(), Some(Completion::Break));
        assert!(p.finish_break(BreakOutcome::Done));
        assert_eq!(p.kind(), PhaseKind::Idle);
    }

    #[test]
    fn test_ratio_and_elapsed() {
        let mut p = pomodoro(&["A"]);
        assert_eq!(p.ratio(), 0.0);
        p.tick(at(0));
        p.start_task();
        p.tick(at(750));
        assert_eq!(p.elapsed(), Some(Duration::seconds(750)));
        assert!((p.ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_invariant_over_all_transitions() {
        let mut p = pomodoro(&["A", "B", "C"]);
        let mut now = 0;
        // legal and illegal transitions mixed
        let steps: Vec<fn(&mut Pomodoro) -> bool> = vec![
            Pomodoro::pause_task,
            Pomodoro::start_task,
            Pomodoro::pause_task,
            Pomodoro::start_break,
            Pomodoro::pause_break,
            Pomodoro::resume_task,
            Pomodoro::start_task,
            Pomodoro::restart_break,
            Pomodoro::restart_task,
            Pomodoro::stop_break,
            Pomodoro::stop_task,
            Pomodoro::start_break,
            Pomodoro::resume_break,
            Pomodoro::stop_break,
            Pomodoro::start_task,
            Pomodoro::start_task,
            Pomodoro::stop_task,
        ];
        for step in steps {
            step(&mut p);
            now += 400;
            p.tick(at(now));
            assert_invariant(&p);
        }
    }

    #[test]
    fn test_phase_kind_round_trip_names() {
        for kind in [
            PhaseKind::Idle,
            PhaseKind::TaskRunning,
            PhaseKind::TaskPaused,
            PhaseKind::BreakRunning,
            PhaseKind::BreakPaused,
        ] {
            assert_eq!(kind.as_str().parse::<PhaseKind>(), Ok(kind));
        }
        let err = "Stopped".parse::<PhaseKind>().unwrap_err();
        assert_eq!(err, UnknownPhase("Stopped".into()));
        assert_eq!(err.to_string(), "unknown phase: \"Stopped\"");
    }
}
