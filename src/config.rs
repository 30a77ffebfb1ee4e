//! Command-line arguments, the JSON config file and where files live.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Duration;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PomoError, Result};

pub const DEFAULT_TASK_FILE: &str = "PomodoroTasks.txt";
pub const DEFAULT_DATA_DIR: &str = ".pomotask";
pub const MAX_MINUTES: f64 = 24.0 * 60.0;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Clone, Debug, Default)]
#[command(author, version, about = "🍅 pomotask - Pomodoro timer for a queue of tasks")]
pub struct Args {
    /// Task length, e.g. 25, 25m, 1h30m, 90s
    #[arg(short, long, value_parser = parse_duration)]
    pub work: Option<f64>,
    /// Break length
    #[arg(short, long, value_parser = parse_duration)]
    pub rest: Option<f64>,
    /// Task file, one title per line
    #[arg(short, long)]
    pub tasks: Option<PathBuf>,
    /// Directory for config, stashed progress and the log
    #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,
    #[arg(long)]
    pub no_sound: bool,
    /// Discard any timer stashed by a previous run
    #[arg(long)]
    pub fresh: bool,
    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

/// Parse a duration into minutes. A bare number is minutes.
pub fn parse_duration(s: &str) -> std::result::Result<f64, String> {
    let s = s.trim().to_lowercase();
    let mut total = 0.0;
    let mut num = String::new();

    for c in s.chars() {
        match c {
            '0'..='9' | '.' => num.push(c),
            'h' => {
                total += num.parse::<f64>().map_err(|_| "Invalid hours")? * 60.0;
                num.clear();
            }
            'm' => {
                total += num.parse::<f64>().map_err(|_| "Invalid minutes")?;
                num.clear();
            }
            's' => {
                total += num.parse::<f64>().map_err(|_| "Invalid seconds")? / 60.0;
                num.clear();
            }
            ' ' => {}
            _ => return Err(format!("Invalid character '{}'", c)),
        }
    }

    if !num.is_empty() {
        total += num.parse::<f64>().map_err(|_| "Invalid number")?;
    }

    if total > 0.0 { Ok(total) } else { Err("Duration must be > 0".into()) }
}

// ============================================================================
// Config file
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub work_duration: f64,
    pub rest_duration: f64,
    pub task_file: PathBuf,
    pub notifications: bool,
    pub sound_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_duration: 25.0,
            rest_duration: 5.0,
            task_file: PathBuf::from(DEFAULT_TASK_FILE),
            notifications: true,
            sound_enabled: true,
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults if it is missing or bad.
    pub fn load(path: &Path) -> Self {
        let mut config = match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring corrupt config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        config.validate();
        config
    }

    /// Replace lengths that are not positive and finite with the defaults and
    /// cap the rest at [`MAX_MINUTES`].
    pub fn validate(&mut self) {
        let defaults = Self::default();
        for (name, value, default) in [
            ("work_duration", &mut self.work_duration, defaults.work_duration),
            ("rest_duration", &mut self.rest_duration, defaults.rest_duration),
        ] {
            let valid = valid_minutes(*value, default);
            if valid != *value {
                warn!("Invalid {} {}, using {}", name, value, valid);
                *value = valid;
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?).map_err(|e| PomoError::io(path, e))
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(w) = args.work { self.work_duration = w; }
        if let Some(r) = args.rest { self.rest_duration = r; }
        if let Some(t) = &args.tasks { self.task_file = t.clone(); }
        if args.no_sound { self.sound_enabled = false; }
        self.validate();
    }

    pub fn task_len(&self) -> Duration {
        minutes(valid_minutes(self.work_duration, Self::default().work_duration))
    }

    pub fn break_len(&self) -> Duration {
        minutes(valid_minutes(self.rest_duration, Self::default().rest_duration))
    }
}

fn valid_minutes(m: f64, default: f64) -> f64 {
    if m.is_finite() && m > 0.0 { m.min(MAX_MINUTES) } else { default }
}

fn minutes(m: f64) -> Duration {
    Duration::milliseconds((m * 60_000.0).round() as i64)
}

// ============================================================================
// Paths
// ============================================================================

#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub config: PathBuf,
    pub prefs: PathBuf,
    pub log: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config: data_dir.join("config.json"),
            prefs: data_dir.join("prefs.json"),
            log: data_dir.join("pomotask.log"),
            data_dir,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| PomoError::io(&self.data_dir, e))
    }
}
