//! Application state: the timer, the editing modes around it, and the files
//! it is loaded from and saved to.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, Paths},
    error::Result,
    notify,
    progress::{Prefs, ProgressSnapshot},
    tasks::TaskQueue,
    timer::{BreakOutcome, Completion, PhaseKind, Pomodoro, TaskOutcome},
};

const AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Help,
    Adding(String),
    Editing { index: usize, input: String },
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit { keep_progress: bool },
}

/// One phase-dependent action shown in the button bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub key: &'static str,
    pub label: &'static str,
}

const fn action(key: &'static str, label: &'static str) -> Action {
    Action { key, label }
}

/// Task buttons available in `kind`.
pub fn task_actions(kind: PhaseKind) -> Vec<Action> {
    match kind {
        PhaseKind::Idle | PhaseKind::BreakRunning | PhaseKind::BreakPaused => {
            vec![action("S", "START TASK")]
        }
        PhaseKind::TaskRunning => vec![
            action("Space", "PAUSE TASK"),
            action("R", "RESTART TASK"),
            action("X", "STOP TASK"),
        ],
        PhaseKind::TaskPaused => vec![
            action("Space", "RESUME TASK"),
            action("R", "RESTART TASK"),
            action("X", "STOP TASK"),
        ],
    }
}

/// Break buttons available in `kind`.
pub fn break_actions(kind: PhaseKind) -> Vec<Action> {
    match kind {
        PhaseKind::Idle | PhaseKind::TaskRunning | PhaseKind::TaskPaused => {
            vec![action("B", "START BREAK")]
        }
        PhaseKind::BreakRunning => vec![
            action("Space", "PAUSE BREAK"),
            action("R", "RESTART BREAK"),
            action("X", "STOP BREAK"),
        ],
        PhaseKind::BreakPaused => vec![
            action("Space", "RESUME BREAK"),
            action("R", "RESTART BREAK"),
            action("X", "STOP BREAK"),
        ],
    }
}

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub pomodoro: Pomodoro,
    pub selected: usize,
    pub mode: Mode,
    pub status: Option<String>,
    task_file: PathBuf,
    prefs_path: PathBuf,
    prefs: Prefs,
    notifications: bool,
    sound_enabled: bool,
    needs_save: bool,
    last_save: Instant,
    notified: Option<Completion>,
}

impl AppState {
    /// Load the task file and, unless `fresh`, pick up a stashed timer.
    pub fn open(config: &Config, paths: &Paths, fresh: bool) -> Result<Self> {
        let pending = TaskQueue::load(&config.task_file)?;
        info!("Loaded {} pending tasks from {}", pending.len(), config.task_file.display());

        let mut pomodoro = Pomodoro::new(pending, config.task_len(), config.break_len());
        let mut prefs = Prefs::load(&paths.prefs);

        if fresh {
            info!("Discarding stashed progress");
            ProgressSnapshot::clear(&mut prefs);
            if let Err(e) = prefs.save(&paths.prefs) {
                warn!("Failed to save prefs: {}", e);
            }
        } else if let Some(snapshot) = ProgressSnapshot::read_from(&prefs) {
            snapshot.apply_to(&mut pomodoro);
        }

        let status = match pomodoro.kind() {
            PhaseKind::Idle => "Press ? for help".to_string(),
            kind => format!("Resumed {}", kind),
        };

        Ok(Self {
            pomodoro,
            selected: 0,
            mode: Mode::Normal,
            status: Some(status),
            task_file: config.task_file.clone(),
            prefs_path: paths.prefs.clone(),
            prefs,
            notifications: config.notifications,
            sound_enabled: config.sound_enabled,
            needs_save: false,
            last_save: Instant::now(),
            notified: None,
        })
    }

    pub fn prefs(&self) -> &Prefs {
        &self.prefs
    }

    /// Advance the timer to `now`, notify on a fresh completion and autosave.
    pub fn update(&mut self, now: DateTime<Utc>) {
        let completion = self.pomodoro.tick(now);
        if completion.is_some() && completion != self.notified {
            info!("{:?} countdown finished", completion);
            if let Some(which) = completion.filter(|_| self.notifications) {
                notify::completion(which, self.sound_enabled);
            }
        }
        self.notified = completion;

        if self.needs_save && self.last_save.elapsed() >= AUTO_SAVE_INTERVAL {
            self.save_tasks();
        }
    }

    pub fn save_tasks(&mut self) {
        match self.pomodoro.pending().save(&self.task_file) {
            Ok(()) => self.needs_save = false,
            Err(e) => warn!("Failed to save tasks: {}", e),
        }
        self.last_save = Instant::now();
    }

    /// Save everything on the way out. With `keep_progress` a running or
    /// paused timer is stashed for the next start; otherwise it is dropped.
    pub fn close(&mut self, keep_progress: bool) {
        self.save_tasks();
        match ProgressSnapshot::capture(&self.pomodoro).filter(|_| keep_progress) {
            Some(snapshot) => {
                info!("Stashing {:?} for next start", snapshot.phase);
                snapshot.write_to(&mut self.prefs);
                self.save_prefs();
            }
            None => self.clear_progression(),
        }
    }

    fn clear_progression(&mut self) {
        ProgressSnapshot::clear(&mut self.prefs);
        self.save_prefs();
    }

    fn save_prefs(&self) {
        if let Err(e) = self.prefs.save(&self.prefs_path) {
            warn!("Failed to save prefs: {}", e);
        }
    }

    fn transitioned(&mut self, changed: bool, what: &str) {
        if !changed {
            debug!("{} ignored in {}", what, self.pomodoro.kind());
            return;
        }
        self.status = Some(what.to_string());
        if self.pomodoro.kind() == PhaseKind::Idle {
            self.clear_progression();
        }
        // the queue may have shifted under an open rename
        if matches!(self.mode, Mode::Editing { .. }) {
            debug!("Cancelling rename after {}", what);
            self.mode = Mode::Normal;
        }
        self.clamp_selection();
    }

    fn edited(&mut self) {
        self.needs_save = true;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.pomodoro.pending().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    // --- timer actions -----------------------------------------------------

    pub fn start_task(&mut self) {
        let changed = self.pomodoro.start_task();
        if !changed && self.pomodoro.pending().is_empty() {
            self.status = Some("No pending task. Press A to add one".into());
        }
        self.needs_save |= changed;
        self.transitioned(changed, "Task started");
    }

    pub fn start_break(&mut self) {
        let changed = self.pomodoro.start_break();
        self.transitioned(changed, "Break started");
    }

    pub fn toggle_pause(&mut self) {
        let (changed, what) = match self.pomodoro.kind() {
            PhaseKind::TaskRunning => (self.pomodoro.pause_task(), "Task paused"),
            PhaseKind::TaskPaused => (self.pomodoro.resume_task(), "Task resumed"),
            PhaseKind::BreakRunning => (self.pomodoro.pause_break(), "Break paused"),
            PhaseKind::BreakPaused => (self.pomodoro.resume_break(), "Break resumed"),
            PhaseKind::Idle => (false, "Pause"),
        };
        self.transitioned(changed, what);
    }

    pub fn restart(&mut self) {
        let kind = self.pomodoro.kind();
        let (changed, what) = if kind.is_task() {
            (self.pomodoro.restart_task(), "Task restarted")
        } else {
            (self.pomodoro.restart_break(), "Break restarted")
        };
        self.transitioned(changed, what);
    }

    pub fn stop(&mut self) {
        let kind = self.pomodoro.kind();
        let (changed, what) = if kind.is_task() {
            (self.pomodoro.stop_task(), "Task stopped")
        } else {
            (self.pomodoro.stop_break(), "Break stopped")
        };
        self.transitioned(changed, what);
    }

    pub fn finish_task(&mut self, outcome: TaskOutcome) {
        let changed = self.pomodoro.finish_task(outcome);
        self.needs_save |= changed && outcome == TaskOutcome::NotFinished;
        let what = match outcome {
            TaskOutcome::Finished => "Task finished. Break started",
            TaskOutcome::NotFinished => "Task requeued. Break started",
        };
        self.transitioned(changed, what);
    }

    pub fn finish_break(&mut self, outcome: BreakOutcome) {
        let changed = self.pomodoro.finish_break(outcome);
        if !changed && outcome == BreakOutcome::NextTask {
            self.status = Some("No pending task to start".into());
        }
        self.needs_save |= changed && outcome == BreakOutcome::NextTask;
        let what = match outcome {
            BreakOutcome::Done => "Break over",
            BreakOutcome::NextTask => "Next task started",
        };
        self.transitioned(changed, what);
    }

    // --- task list edits ---------------------------------------------------

    pub fn add_task(&mut self, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        self.pomodoro.pending_mut().push(title);
        self.selected = self.pomodoro.pending().len() - 1;
        self.edited();
    }

    pub fn rename_selected(&mut self, index: usize, title: &str) {
        let title = title.trim();
        if !title.is_empty() && self.pomodoro.pending_mut().rename(index, title) {
            self.edited();
        }
    }

    pub fn remove_selected(&mut self) {
        if let Some(task) = self.pomodoro.pending_mut().remove(self.selected) {
            self.status = Some(format!("Removed {:?}", task.title));
            self.edited();
        }
    }

    pub fn move_selected_up(&mut self) {
        if self.pomodoro.pending_mut().move_up(self.selected) {
            self.selected -= 1;
            self.edited();
        }
    }

    pub fn move_selected_down(&mut self) {
        if self.pomodoro.pending_mut().move_down(self.selected) {
            self.selected += 1;
            self.edited();
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let len = self.pomodoro.pending().len();
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }
}

// ============================================================================
// Event Handlers
// ============================================================================

pub fn handle_input(key: KeyEvent, app: &mut AppState) -> Control {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Control::Quit { keep_progress: true };
    }

    if let Some(completion) = app.pomodoro.completion() {
        handle_completion(key, completion, app);
        return Control::Continue;
    }

    if app.mode == Mode::Normal {
        return handle_main_view(key, app);
    }

    match &mut app.mode {
        Mode::Adding(input) => {
            match key.code {
                KeyCode::Char(c) => input.push(c),
                KeyCode::Backspace => { input.pop(); }
                KeyCode::Enter => {
                    let title = std::mem::take(input);
                    app.mode = Mode::Normal;
                    app.add_task(&title);
                }
                KeyCode::Esc => app.mode = Mode::Normal,
                _ => {}
            }
        }
        Mode::Editing { index, input } => {
            match key.code {
                KeyCode::Char(c) => input.push(c),
                KeyCode::Backspace => { input.pop(); }
                KeyCode::Enter => {
                    let (index, title) = (*index, std::mem::take(input));
                    app.mode = Mode::Normal;
                    app.rename_selected(index, &title);
                }
                KeyCode::Esc => app.mode = Mode::Normal,
                _ => {}
            }
        }
        Mode::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.mode = Mode::Normal;
            }
        }
        Mode::Normal => {}
    }
    Control::Continue
}

fn handle_completion(key: KeyEvent, completion: Completion, app: &mut AppState) {
    match (completion, key.code) {
        (Completion::Task, KeyCode::Char('f' | 'y' | 'F' | 'Y') | KeyCode::Enter) => {
            app.finish_task(TaskOutcome::Finished)
        }
        (Completion::Task, KeyCode::Char('c' | 'n' | 'C' | 'N')) => {
            app.finish_task(TaskOutcome::NotFinished)
        }
        (Completion::Break, KeyCode::Char('d' | 'y' | 'D' | 'Y') | KeyCode::Enter) => {
            app.finish_break(BreakOutcome::Done)
        }
        (Completion::Break, KeyCode::Char('n' | 'N')) => app.finish_break(BreakOutcome::NextTask),
        _ => {}
    }
}

fn handle_main_view(key: KeyEvent, app: &mut AppState) -> Control {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Control::Quit { keep_progress: true },
        KeyCode::Char('Q') => return Control::Quit { keep_progress: false },
        KeyCode::Char('?') | KeyCode::Char('h') => app.mode = Mode::Help,

        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Char('K') => app.move_selected_up(),
        KeyCode::Char('J') => app.move_selected_down(),
        KeyCode::Char('a') => app.mode = Mode::Adding(String::new()),
        KeyCode::Char('e') | KeyCode::Enter => {
            if let Some(task) = app.pomodoro.pending().get(app.selected) {
                app.mode = Mode::Editing { index: app.selected, input: task.title.clone() };
            }
        }
        KeyCode::Char('d') | KeyCode::Delete => app.remove_selected(),

        KeyCode::Char('s') => app.start_task(),
        KeyCode::Char('b') => app.start_break(),
        KeyCode::Char(' ') => app.toggle_pause(),
        KeyCode::Char('r') => app.restart(),
        KeyCode::Char('x') => app.stop(),
        _ => {}
    }
    Control::Continue
}
