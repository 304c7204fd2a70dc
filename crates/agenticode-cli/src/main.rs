//! agenticode — a self-driving coding agent.
//!
//! One-shot mode (`-p`) runs a single prompt and exits with 0 on success;
//! without a prompt the CLI loops, preserving the conversation across
//! inputs. Session commands (`clear`, `compact`, `history`, `todos`,
//! `init`, `exit`) are handled here and never reach the core.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agenticode_core::agent::{
    AgentTool, AutoApprover, InteractiveApprover, RiskClassifier, RiskLevel,
    SessionSubagentFactory, ToolApprover,
};
use agenticode_core::config::{ApprovalMode, SessionConfig};
use agenticode_core::hooks::HookManager;
use agenticode_core::mcp::{register_mcp_tools, ClientManager};
use agenticode_core::tools::{register_default_tools, ToolRegistry};

mod llm_http;
mod session;

use llm_http::HttpLlmClient;
use session::Session;

/// agenticode - a self-driving coding agent
#[derive(Parser)]
#[command(name = "agenticode")]
#[command(about = "A self-driving coding agent", version)]
struct Cli {
    /// Config file (default: $HOME/.agenticode.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Execute a single prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Maximum number of turns
    #[arg(long)]
    max_turns: Option<usize>,

    /// Comma-separated list of allowed tools
    #[arg(long = "allowed-tools")]
    allowed_tools: Option<String>,

    /// Permission mode: bypassPermissions
    #[arg(long = "permission-mode")]
    permission_mode: Option<String>,

    /// Skip all permission checks (use with caution)
    #[arg(long = "dangerously-skip-permissions")]
    dangerously_skip: bool,

    /// Model selection (e.g. 'default', 'summarize', 'openai/gpt-4o')
    #[arg(short, long)]
    model: Option<String>,

    /// Pause before each LLM call
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = if config_path.exists() {
        SessionConfig::load(&config_path)?
    } else {
        SessionConfig::default()
    };

    let working_dir = std::env::current_dir().context("cannot determine working directory")?;
    let session_id = uuid::Uuid::new_v4().to_string();

    let selection = cli.model.clone().unwrap_or_else(|| "default".to_string());
    let llm = Arc::new(HttpLlmClient::from_config(&config, &selection).with_context(|| {
        format!(
            "no usable provider for '{}'; add providers to {}",
            selection,
            config_path.display()
        )
    })?);
    // A cheaper transport for compaction when one is configured.
    let summarize_llm = HttpLlmClient::from_config(&config, "summarize")
        .ok()
        .map(|c| Arc::new(c) as Arc<dyn agenticode_core::ai::LlmClient>);

    let classifier = Arc::new(build_classifier(&config));
    let hooks = Arc::new(HookManager::new(
        config.hooks.clone(),
        working_dir.clone(),
        session_id.clone(),
    ));

    // Tool registry: built-ins, external tool servers, then the sub-agent tool.
    let registry = ToolRegistry::new();
    register_default_tools(&registry).await;

    let mcp_manager = Arc::new(ClientManager::new(working_dir.clone()));
    if !config.mcp.is_empty() {
        mcp_manager.initialize_all(&config.mcp).await;
        register_mcp_tools(mcp_manager.clone(), &registry).await;
    }

    let registry = Arc::new(apply_tool_filter(registry, cli.allowed_tools.as_deref()).await);

    let factory = Arc::new(SessionSubagentFactory::new(
        llm.clone(),
        registry.clone(),
        classifier.clone(),
        Some(hooks.clone()),
        working_dir.clone(),
    ));
    registry.register(Arc::new(AgentTool::new(factory))).await;

    let bypass = cli.dangerously_skip
        || cli.permission_mode.as_deref() == Some("bypassPermissions")
        || config.approval.mode == ApprovalMode::Auto;
    let approver: Arc<dyn ToolApprover> = if bypass {
        Arc::new(AutoApprover::approve_all())
    } else {
        Arc::new(
            InteractiveApprover::new()
                .with_auto_approve(config.approval.auto_approve.clone())
                .with_timeout(std::time::Duration::from_secs(config.approval.timeout)),
        )
    };

    let max_steps = cli.max_turns.unwrap_or(config.general.max_steps);

    let session = Session::new(
        llm,
        summarize_llm,
        registry,
        classifier,
        approver,
        hooks,
        mcp_manager.clone(),
        working_dir,
        max_steps,
        cli.debug,
    );

    let exit_code = match &cli.prompt {
        Some(prompt) => session.run_once(prompt).await,
        None => session.run_interactive().await,
    };

    mcp_manager.close_all().await;
    std::process::exit(exit_code);
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agenticode.yaml")
}

/// Risk overrides from the approval lists: auto-approved names drop to Low,
/// names that always require approval rise to High.
fn build_classifier(config: &SessionConfig) -> RiskClassifier {
    let mut overrides = HashMap::new();
    for name in &config.approval.auto_approve {
        overrides.insert(name.clone(), RiskLevel::Low);
    }
    for name in &config.approval.require_approval {
        overrides.insert(name.clone(), RiskLevel::High);
    }
    RiskClassifier::with_overrides(overrides)
}

async fn apply_tool_filter(registry: ToolRegistry, allowed: Option<&str>) -> ToolRegistry {
    let Some(allowed) = allowed else {
        return registry;
    };
    let names: Vec<&str> = allowed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        return registry;
    }
    registry.filtered(&names).await
}
