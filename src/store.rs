use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{TodoError, ValidationError};
use crate::models::{FilterMode, Task, TaskStats, Timestamp};

/// Ordered, in-memory task list. Index 0 is the top of the visible list.
#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<Mutex<Vec<Task>>>,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(dedupe_ids(tasks))),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        let guard = self.inner.lock().expect("store poisoned");
        guard.clone()
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        let guard = self.inner.lock().expect("store poisoned");
        guard.iter().find(|t| t.id == task_id).cloned()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("store poisoned");
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn replace(&self, tasks: Vec<Task>) {
        let mut guard = self.inner.lock().expect("store poisoned");
        *guard = dedupe_ids(tasks);
    }

    /// Empties the list and returns what was removed.
    pub fn clear(&self) -> Vec<Task> {
        let mut guard = self.inner.lock().expect("store poisoned");
        std::mem::take(&mut *guard)
    }

    /// Newest-first insertion.
    pub fn insert_front(&self, task: Task) -> Result<(), TodoError> {
        let mut guard = self.inner.lock().expect("store poisoned");
        if guard.iter().any(|t| t.id == task.id) {
            return Err(TodoError::DuplicateId(task.id));
        }
        guard.insert(0, task);
        Ok(())
    }

    pub fn toggle_complete(&self, task_id: &str) -> Option<Task> {
        self.update(task_id, |task| task.completed = !task.completed)
    }

    pub fn set_text(&self, task_id: &str, text: String) -> Option<Task> {
        self.update(task_id, move |task| task.text = text)
    }

    pub fn set_reminder(&self, task_id: &str, reminder_at: Option<Timestamp>) -> Option<Task> {
        self.update(task_id, |task| task.reminder_at = reminder_at)
    }

    pub fn remove(&self, task_id: &str) -> Option<Task> {
        let mut guard = self.inner.lock().expect("store poisoned");
        let index = guard.iter().position(|t| t.id == task_id)?;
        Some(guard.remove(index))
    }

    /// Array-move: the element at `from` ends up at `to`, everything else keeps its
    /// relative order.
    pub fn move_item(&self, from: usize, to: usize) -> Result<(), TodoError> {
        let mut guard = self.inner.lock().expect("store poisoned");
        let len = guard.len();
        for index in [from, to] {
            if index >= len {
                return Err(TodoError::IndexOutOfRange { index, len });
            }
        }
        if from != to {
            let task = guard.remove(from);
            guard.insert(to, task);
        }
        Ok(())
    }

    pub fn index_of(&self, task_id: &str) -> Option<usize> {
        let guard = self.inner.lock().expect("store poisoned");
        guard.iter().position(|t| t.id == task_id)
    }

    pub fn filtered_view(&self, search: &str, mode: FilterMode) -> Vec<Task> {
        let guard = self.inner.lock().expect("store poisoned");
        filter_tasks(&guard, search, mode)
    }

    pub fn stats(&self) -> TaskStats {
        let guard = self.inner.lock().expect("store poisoned");
        let finished = guard.iter().filter(|t| t.completed).count();
        TaskStats {
            total: guard.len(),
            active: guard.len() - finished,
            finished,
        }
    }

    fn update(&self, task_id: &str, apply: impl FnOnce(&mut Task)) -> Option<Task> {
        let mut guard = self.inner.lock().expect("store poisoned");
        let task = guard.iter_mut().find(|t| t.id == task_id)?;
        apply(task);
        Some(task.clone())
    }
}

/// Case-insensitive substring search on the text, then the completion filter.
pub fn filter_tasks(tasks: &[Task], search: &str, mode: FilterMode) -> Vec<Task> {
    let needle = search.to_lowercase();
    tasks
        .iter()
        .filter(|t| t.text.to_lowercase().contains(&needle))
        .filter(|t| mode.matches(t))
        .cloned()
        .collect()
}

/// Rejects empty or whitespace-only task text; returns the trimmed text.
pub fn validate_text(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(trimmed.to_string())
}

fn dedupe_ids(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| {
            let fresh = seen.insert(task.id.clone());
            if !fresh {
                log::warn!("dropping task with duplicate id={}", task.id);
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: &str, text: &str, completed: bool) -> Task {
        Task {
            id: id.to_string(),
            text: text.to_string(),
            completed,
            reminder_at: None,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn abcd() -> TaskStore {
        TaskStore::new(vec![
            make_task("A", "a", false),
            make_task("B", "b", false),
            make_task("C", "c", false),
            make_task("D", "d", false),
        ])
    }

    #[test]
    fn new_and_replace_drop_duplicate_ids() {
        let store = TaskStore::new(vec![
            make_task("a", "first", false),
            make_task("a", "second", false),
            make_task("b", "b", false),
        ]);
        let out = store.tasks();
        assert_eq!(ids(&out), vec!["a", "b"]);
        assert_eq!(out[0].text, "first");

        store.replace(vec![make_task("x", "x", false), make_task("x", "y", true)]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_front_puts_newest_first_and_rejects_duplicates() {
        let store = TaskStore::default();
        store.insert_front(make_task("a", "a", false)).unwrap();
        store.insert_front(make_task("b", "b", false)).unwrap();
        assert_eq!(ids(&store.tasks()), vec!["b", "a"]);

        let err = store.insert_front(make_task("a", "again", false)).unwrap_err();
        assert!(matches!(err, TodoError::DuplicateId(id) if id == "a"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn reorder_uses_array_move_semantics() {
        let store = abcd();
        store.move_item(0, 2).unwrap();
        assert_eq!(ids(&store.tasks()), vec!["B", "C", "A", "D"]);

        store.move_item(3, 0).unwrap();
        assert_eq!(ids(&store.tasks()), vec!["D", "B", "C", "A"]);

        store.move_item(1, 1).unwrap();
        assert_eq!(ids(&store.tasks()), vec!["D", "B", "C", "A"]);
    }

    #[test]
    fn reorder_out_of_range_leaves_list_unchanged() {
        let store = abcd();
        let err = store.move_item(0, 4).unwrap_err();
        assert!(matches!(err, TodoError::IndexOutOfRange { index: 4, len: 4 }));
        assert_eq!(ids(&store.tasks()), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn toggle_edit_and_reminder_touch_only_their_field() {
        let store = abcd();
        let toggled = store.toggle_complete("B").unwrap();
        assert!(toggled.completed);
        assert_eq!(toggled.text, "b");

        let edited = store.set_text("B", "bee".to_string()).unwrap();
        assert_eq!(edited.text, "bee");
        assert!(edited.completed);
        assert_eq!(edited.reminder_at, None);

        let reminded = store.set_reminder("B", Some(42)).unwrap();
        assert_eq!(reminded.reminder_at, Some(42));
        assert_eq!(store.index_of("B"), Some(1));

        assert!(store.toggle_complete("missing").is_none());
        assert!(store.set_text("missing", "x".to_string()).is_none());
    }

    #[test]
    fn remove_and_clear() {
        let store = abcd();
        assert_eq!(store.remove("C").map(|t| t.id), Some("C".to_string()));
        assert!(store.remove("C").is_none());
        assert_eq!(ids(&store.tasks()), vec!["A", "B", "D"]);

        let removed = store.clear();
        assert_eq!(removed.len(), 3);
        assert!(store.is_empty());
    }

    #[test]
    fn finished_filter_returns_only_completed_tasks() {
        let tasks = vec![make_task("done", "x", true), make_task("open", "y", false)];
        let view = filter_tasks(&tasks, "", FilterMode::Finished);
        assert_eq!(ids(&view), vec!["done"]);

        let view = filter_tasks(&tasks, "", FilterMode::Active);
        assert_eq!(ids(&view), vec!["open"]);
    }

    #[test]
    fn search_is_case_insensitive_and_preserves_order() {
        let store = TaskStore::new(vec![
            make_task("1", "Buy MILK", false),
            make_task("2", "walk dog", true),
            make_task("3", "milkshake", true),
        ]);
        let view = store.filtered_view("milk", FilterMode::All);
        assert_eq!(ids(&view), vec!["1", "3"]);

        let view = store.filtered_view("MILK", FilterMode::Finished);
        assert_eq!(ids(&view), vec!["3"]);

        // The underlying order is untouched.
        assert_eq!(ids(&store.tasks()), vec!["1", "2", "3"]);
    }

    #[test]
    fn stats_count_active_and_finished() {
        let store = TaskStore::new(vec![
            make_task("1", "a", true),
            make_task("2", "b", false),
            make_task("3", "c", false),
        ]);
        assert_eq!(
            store.stats(),
            TaskStats {
                total: 3,
                active: 2,
                finished: 1
            }
        );
    }

    #[test]
    fn validate_text_rejects_blank_and_trims() {
        assert_eq!(validate_text(""), Err(ValidationError::EmptyText));
        assert_eq!(validate_text("  \t "), Err(ValidationError::EmptyText));
        assert_eq!(validate_text("  call mom "), Ok("call mom".to_string()));
    }
}
