//! Stashing an in-progress timer across restarts.
//!
//! [`ProgressSnapshot`] is the record; [`Prefs`] is a flat key-value store
//! kept as a JSON object of strings. Durations and timestamps are stored as
//! 100 ns ticks, timestamps counted from the Unix epoch.

use std::{collections::BTreeMap, fs, path::Path};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{PomoError, Result},
    tasks::Task,
    timer::{Phase, PhaseKind, Pomodoro},
};

pub const KEY_ENABLE: &str = "pomodoro.enable";
pub const KEY_PHASE: &str = "pomodoro.phase";
pub const KEY_TASK: &str = "pomodoro.task";
pub const KEY_DURATION: &str = "pomodoro.duration";
pub const KEY_LAST_TICK: &str = "pomodoro.last_tick";

const ALL_KEYS: [&str; 5] = [KEY_ENABLE, KEY_PHASE, KEY_TASK, KEY_DURATION, KEY_LAST_TICK];

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

// ============================================================================
// Ticks
// ============================================================================

pub fn duration_to_ticks(d: Duration) -> i64 {
    match d.num_nanoseconds() {
        Some(nanos) => nanos / NANOS_PER_TICK,
        None if d < Duration::zero() => i64::MIN,
        None => i64::MAX,
    }
}

pub fn ticks_to_duration(ticks: i64) -> Duration {
    Duration::nanoseconds(ticks.saturating_mul(NANOS_PER_TICK))
}

pub fn timestamp_to_ticks(t: DateTime<Utc>) -> i64 {
    t.timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(t.timestamp_subsec_nanos()) / NANOS_PER_TICK)
}

/// `None` for zero or for values outside the representable range.
pub fn ticks_to_timestamp(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks == 0 {
        return None;
    }
    let secs = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;
    DateTime::from_timestamp(secs, nanos as u32)
}

// ============================================================================
// Preference store
// ============================================================================

/// String key-value store persisted as one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prefs {
    values: BTreeMap<String, String>,
}

impl Prefs {
    /// Load the store. A missing or unreadable file yields an empty store.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring corrupt prefs file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| PomoError::io(path, e))
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_string(key).and_then(|v| v.parse().ok())
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set_string(key, value.to_string());
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn delete_key(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything needed to put a running or paused timer back where it was.
///
/// Fields that were missing or unparsable come back as their zero default:
/// no phase, no task, zero ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub phase: Option<PhaseKind>,
    pub task: Option<String>,
    pub duration_ticks: i64,
    pub last_tick_ticks: i64,
}

impl ProgressSnapshot {
    /// Capture the timer. Idle has nothing worth stashing.
    pub fn capture(pomodoro: &Pomodoro) -> Option<Self> {
        let kind = pomodoro.kind();
        if kind == PhaseKind::Idle {
            return None;
        }
        Some(Self {
            phase: Some(kind),
            task: pomodoro.active_task().map(|t| t.title.clone()),
            duration_ticks: pomodoro.remaining().map(duration_to_ticks).unwrap_or_default(),
            last_tick_ticks: pomodoro.last_tick().map(timestamp_to_ticks).unwrap_or_default(),
        })
    }

    pub fn write_to(&self, prefs: &mut Prefs) {
        prefs.set_bool(KEY_ENABLE, true);
        prefs.set_string(KEY_PHASE, self.phase.map(PhaseKind::as_str).unwrap_or_default());
        prefs.set_string(KEY_TASK, self.task.clone().unwrap_or_default());
        prefs.set_string(KEY_DURATION, self.duration_ticks.to_string());
        prefs.set_string(KEY_LAST_TICK, self.last_tick_ticks.to_string());
    }

    /// Read a snapshot back. `None` unless the enable flag is present.
    pub fn read_from(prefs: &Prefs) -> Option<Self> {
        if !prefs.has_key(KEY_ENABLE) {
            return None;
        }
        let parse_ticks = |key: &str| {
            prefs
                .get_string(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or_default()
        };
        Some(Self {
            phase: prefs.get_string(KEY_PHASE).and_then(|v| v.parse().ok()),
            task: prefs
                .get_string(KEY_TASK)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            duration_ticks: parse_ticks(KEY_DURATION),
            last_tick_ticks: parse_ticks(KEY_LAST_TICK),
        })
    }

    /// Delete every progression key.
    pub fn clear(prefs: &mut Prefs) {
        for key in ALL_KEYS {
            prefs.delete_key(key);
        }
    }

    /// Rebuild the phase. Task phases without a task title fall back to idle,
    /// and a negative stored countdown comes back as zero.
    pub fn phase(&self) -> Phase {
        let remaining = ticks_to_duration(self.duration_ticks).max(Duration::zero());
        let task = self.task.as_deref().map(Task::from);
        match (self.phase, task) {
            (Some(PhaseKind::TaskRunning), Some(task)) => Phase::TaskRunning { task, remaining },
            (Some(PhaseKind::TaskPaused), Some(task)) => Phase::TaskPaused { task, remaining },
            (Some(PhaseKind::BreakRunning), _) => Phase::BreakRunning { remaining },
            (Some(PhaseKind::BreakPaused), _) => Phase::BreakPaused { remaining },
            (Some(kind), None) if kind.is_task() => {
                debug!("Stashed {} phase has no task; restoring as idle", kind);
                Phase::Idle
            }
            _ => Phase::Idle,
        }
    }

    pub fn last_tick(&self) -> Option<DateTime<Utc>> {
        ticks_to_timestamp(self.last_tick_ticks)
    }

    pub fn apply_to(&self, pomodoro: &mut Pomodoro) {
        pomodoro.restore(self.phase(), self.last_tick());
    }
}
