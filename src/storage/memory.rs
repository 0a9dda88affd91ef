//! In-memory task store

use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::Result;

use super::TaskStore;
use crate::domain::{Task, TaskId};

/// Task store kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RefCell<BTreeMap<TaskId, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let store = Self::new();
        store
            .tasks
            .borrow_mut()
            .extend(tasks.into_iter().map(|t| (t.id, t)));
        store
    }

    pub fn insert(&self, task: Task) {
        self.tasks.borrow_mut().insert(task.id, task);
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.borrow().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl TaskStore for MemoryTaskStore {
    fn read_all(&self) -> Result<BTreeMap<TaskId, Task>> {
        Ok(self.tasks.borrow().clone())
    }

    fn update_many(&self, tasks: &[Task]) -> Result<()> {
        let mut stored = self.tasks.borrow_mut();
        for task in tasks {
            stored.insert(task.id, task.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_by_id() {
        let store = MemoryTaskStore::with_tasks([Task::new(TaskId::new(1), "Old")]);

        store.update(&Task::new(TaskId::new(1), "New")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(TaskId::new(1)).unwrap().title, "New");
    }

    #[test]
    fn read_all_returns_a_snapshot() {
        let store = MemoryTaskStore::new();
        store.insert(Task::new(TaskId::new(2), "Two"));

        let mut snapshot = store.read_all().unwrap();
        snapshot.clear();

        assert!(!store.is_empty());
    }
}
