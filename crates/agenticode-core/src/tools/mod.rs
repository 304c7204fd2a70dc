//! Tool system: registry, built-in implementations, shared to-do store.

pub mod implementations;
pub mod registry;
pub mod todo_store;

pub use implementations::{default_tools, register_default_tools};
pub use registry::{parse_params, Tool, ToolContext, ToolRegistry, ToolResult};
pub use todo_store::{TodoItem, TodoStatus, TodoStore};
