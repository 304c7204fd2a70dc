//! Process-wide to-do store shared by the todo tools.
//!
//! Mutations go through the store's mutex; PostToolUse hooks observe them
//! through the tool responses.

use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub status: TodoStatus,
    #[serde(default)]
    pub priority: Option<String>,
}

static STORE: Lazy<Mutex<Vec<TodoItem>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Handle to the process-wide to-do list.
pub struct TodoStore;

impl TodoStore {
    pub fn read() -> Vec<TodoItem> {
        STORE.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the whole list; todo_write is whole-list semantics.
    pub fn replace(items: Vec<TodoItem>) {
        *STORE.lock().unwrap_or_else(|e| e.into_inner()) = items;
    }

    pub fn clear() {
        STORE.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
