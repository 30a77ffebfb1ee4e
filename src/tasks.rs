//! The pending task queue and its plain-text file.
//!
//! The file holds one title per line. Blank lines are skipped on load.

use std::{collections::VecDeque, fs, path::Path};

use tracing::{debug, info};

use crate::error::{PomoError, Result};

/// A task is nothing more than its title. Duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub title: String,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

impl From<&str> for Task {
    fn from(title: &str) -> Self {
        Self::new(title)
    }
}

/// Ordered list of tasks that have not been started yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn titles(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.title.as_str()).collect()
    }

    /// Append a task at the tail.
    pub fn push(&mut self, task: impl Into<Task>) {
        self.tasks.push_back(task.into());
    }

    /// Put a task back at the head, ahead of everything else.
    pub fn push_front(&mut self, task: Task) {
        self.tasks.push_front(task);
    }

    pub fn pop_front(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub fn remove(&mut self, index: usize) -> Option<Task> {
        self.tasks.remove(index)
    }

    /// Replace the title of the task at `index`. Returns false if out of range.
    pub fn rename(&mut self, index: usize, title: impl Into<String>) -> bool {
        match self.tasks.get_mut(index) {
            Some(task) => {
                task.title = title.into();
                true
            }
            None => false,
        }
    }

    /// Swap with the previous task. No-op for the first task.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.tasks.len() {
            return false;
        }
        self.tasks.swap(index - 1, index);
        true
    }

    /// Swap with the next task. No-op for the last task.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.tasks.len() {
            return false;
        }
        self.tasks.swap(index, index + 1);
        true
    }

    /// Read the queue from `path`, creating an empty file if there is none.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Creating task file {}", path.display());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| PomoError::io(parent, e))?;
            }
            fs::write(path, "").map_err(|e| PomoError::io(path, e))?;
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| PomoError::io(path, e))?;
        let queue: Self = contents.lines().filter(|l| !l.is_empty()).map(Task::from).collect();
        debug!("Loaded {} tasks from {}", queue.len(), path.display());
        Ok(queue)
    }

    /// Rewrite `path` with one title per line, truncating whatever was there.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut contents = String::new();
        for task in &self.tasks {
            contents.push_str(&task.title);
            contents.push('\n');
        }
        fs::write(path, contents).map_err(|e| PomoError::io(path, e))?;
        debug!("Saved {} tasks to {}", self.len(), path.display());
        Ok(())
    }
}

impl FromIterator<Task> for TaskQueue {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self { tasks: iter.into_iter().collect() }
    }
}

impl<'a> FromIterator<&'a str> for TaskQueue {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(Task::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn queue(titles: &[&str]) -> TaskQueue {
        titles.iter().copied().collect()
    }

    #[test]
    fn test_push_appends_at_tail() {
        let mut q = queue(&["A"]);
        q.push("B");
        assert_eq!(q.titles(), vec!["A", "B"]);
    }

    #[test]
    fn test_duplicates_allowed() {
        let mut q = queue(&["A"]);
        q.push("A");
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_remove_arbitrary() {
        let mut q = queue(&["A", "B", "C"]);
        assert_eq!(q.remove(1), Some(Task::new("B")));
        assert_eq!(q.titles(), vec!["A", "C"]);
        assert_eq!(q.remove(5), None);
    }

    #[test]
    fn test_move_up_boundary() {
        let mut q = queue(&["A", "B", "C"]);
        assert!(!q.move_up(0));
        assert_eq!(q.titles(), vec!["A", "B", "C"]);
        assert!(q.move_up(2));
        assert_eq!(q.titles(), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_move_down_boundary() {
        let mut q = queue(&["A", "B", "C"]);
        assert!(!q.move_down(2));
        assert_eq!(q.titles(), vec!["A", "B", "C"]);
        assert!(q.move_down(0));
        assert_eq!(q.titles(), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_moves_preserve_membership() {
        let mut q = queue(&["A", "B", "C", "D"]);
        q.move_down(1);
        q.move_up(3);
        q.move_up(1);
        let mut titles = q.titles();
        assert_eq!(titles.len(), 4);
        titles.sort();
        assert_eq!(titles, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_move_out_of_range() {
        let mut q = queue(&["A"]);
        assert!(!q.move_up(3));
        assert!(!q.move_down(3));
        assert!(!TaskQueue::new().move_down(0));
    }

    #[test]
    fn test_rename() {
        let mut q = queue(&["A", "B"]);
        assert!(q.rename(1, "Bee"));
        assert!(!q.rename(2, "nope"));
        assert_eq!(q.titles(), vec!["A", "Bee"]);
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("PomodoroTasks.txt");

        let q = TaskQueue::load(&path).unwrap();
        assert!(q.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_load_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.txt");
        fs::write(&path, "\nWrite report\n\nReview PR\r\nWrite report\n").unwrap();

        let q = TaskQueue::load(&path).unwrap();
        assert_eq!(q.titles(), vec!["Write report", "Review PR", "Write report"]);
    }

    #[test]
    fn test_save_truncates_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.txt");
        fs::write(&path, "old\nold\nold\nold\n").unwrap();

        queue(&["one", "two"]).save(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        assert_eq!(TaskQueue::load(&path).unwrap().titles(), vec!["one", "two"]);
    }
}
