//! Built-in tool implementations.

pub mod edit;
pub mod glob_tool;
pub mod grep_tool;
pub mod list_files;
pub mod read_file;
pub mod read_many_files;
pub mod run_shell;
pub mod todo;
pub mod write_file;

use std::sync::Arc;

use crate::tools::registry::{Tool, ToolRegistry};

pub use edit::EditTool;
pub use glob_tool::GlobTool;
pub use grep_tool::GrepTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use read_many_files::ReadManyFilesTool;
pub use run_shell::RunShellTool;
pub use todo::{TodoReadTool, TodoWriteTool};
pub use write_file::WriteFileTool;

/// The default built-in tool set.
pub fn default_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ReadFileTool),
        Arc::new(WriteFileTool),
        Arc::new(EditTool),
        Arc::new(ListFilesTool),
        Arc::new(GlobTool),
        Arc::new(GrepTool),
        Arc::new(ReadManyFilesTool),
        Arc::new(RunShellTool),
        Arc::new(TodoReadTool),
        Arc::new(TodoWriteTool),
    ]
}

/// Register every built-in tool on a registry.
pub async fn register_default_tools(registry: &ToolRegistry) {
    for tool in default_tools() {
        registry.register(tool).await;
    }
}
