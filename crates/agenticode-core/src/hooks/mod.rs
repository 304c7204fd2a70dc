//! User-configurable lifecycle hooks.
//!
//! External commands fire at named lifecycle points and can block, annotate,
//! or auto-approve tool calls. See `types` for the process contract and
//! `manager` for execution and aggregation.

pub mod manager;
pub mod types;

pub use manager::HookManager;
pub use types::{
    additional_context, should_auto_approve, should_block, Hook, HookConfig, HookEvent, HookInput,
    HookMatcher, HookOutput, HookSpecificOutput,
};
