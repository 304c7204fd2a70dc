//! Interactive session loop and session commands.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use agenticode_core::agent::{
    compact_conversation, prompts, summarize_conversation, Agent, DisplaySink, NoOpDebugger,
    RiskClassifier, ToolApprover,
};
use agenticode_core::ai::types::ChatMessage;
use agenticode_core::ai::LlmClient;
use agenticode_core::hooks::{self, HookEvent, HookInput, HookManager};
use agenticode_core::mcp::ClientManager;
use agenticode_core::tools::{TodoStore, ToolRegistry};

use crate::llm_http::HttpLlmClient;

const SAMPLE_CONFIG: &str = r#"# ~/.agenticode.yaml
providers:
  openai:
    type: openai
    base_url: https://api.openai.com/v1
    api_key: ${OPENAI_API_KEY}
    models:
      - id: gpt-4o
        name: GPT-4o
        context_window: 128000
        max_tokens: 4096
models:
  default:
    provider: openai
    model: gpt-4o
general:
  max_steps: 15
approval:
  mode: interactive
  timeout: 60
"#;

pub struct Session {
    llm: Arc<HttpLlmClient>,
    summarize_llm: Option<Arc<dyn LlmClient>>,
    registry: Arc<ToolRegistry>,
    classifier: Arc<RiskClassifier>,
    approver: Arc<dyn ToolApprover>,
    hooks: Arc<HookManager>,
    _mcp: Arc<ClientManager>,
    working_dir: PathBuf,
    max_steps: usize,
    debug: bool,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<HttpLlmClient>,
        summarize_llm: Option<Arc<dyn LlmClient>>,
        registry: Arc<ToolRegistry>,
        classifier: Arc<RiskClassifier>,
        approver: Arc<dyn ToolApprover>,
        hooks: Arc<HookManager>,
        mcp: Arc<ClientManager>,
        working_dir: PathBuf,
        max_steps: usize,
        debug: bool,
    ) -> Self {
        Self {
            llm,
            summarize_llm,
            registry,
            classifier,
            approver,
            hooks,
            _mcp: mcp,
            working_dir,
            max_steps,
            debug,
        }
    }

    fn build_agent(&self) -> Agent {
        let display: DisplaySink = Arc::new(|text: &str| println!("{}", text));
        let mut agent = Agent::new(self.llm.clone(), self.registry.clone(), self.approver.clone())
            .with_classifier(self.classifier.clone())
            .with_hook_manager(self.hooks.clone())
            .with_working_dir(self.working_dir.clone())
            .with_max_steps(self.max_steps)
            .with_display(display);
        if self.debug {
            agent = agent.with_debugger(Arc::new(PromptDebugger));
        } else {
            agent = agent.with_debugger(Arc::new(NoOpDebugger));
        }
        agent
    }

    fn fresh_conversation(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(prompts::system_prompt(self.llm.model())),
            ChatMessage::developer(prompts::developer_prompt()),
        ]
    }

    /// Non-interactive invocation: exit code 0 on success, 1 otherwise.
    pub async fn run_once(&self, prompt: &str) -> i32 {
        let mut conversation = self.fresh_conversation();
        self.inject_session_start_context(&mut conversation).await;
        conversation.push(ChatMessage::user(prompt));

        let agent = self.build_agent();
        let (result, _) = agent.execute_with_history(conversation, false).await;

        if !result.message.is_empty() {
            println!("{}", result.message);
        }
        if result.success {
            0
        } else {
            1
        }
    }

    /// Interactive loop; conversation persists across inputs.
    pub async fn run_interactive(&self) -> i32 {
        let mut conversation = self.fresh_conversation();
        self.inject_session_start_context(&mut conversation).await;

        println!("agenticode interactive session. Type 'exit' to quit.");
        let stdin = std::io::stdin();

        loop {
            print!("> ");
            let _ = std::io::stdout().flush();

            let mut line = String::new();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    eprintln!("read error: {}", e);
                    break;
                }
            }
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input {
                "exit" | "quit" => break,
                "clear" => {
                    conversation = self.fresh_conversation();
                    println!("Conversation cleared.");
                }
                "compact" => {
                    self.compact(&mut conversation).await;
                }
                "history" => {
                    print_history(&conversation);
                }
                "todos" => {
                    print_todos();
                }
                "init" => {
                    println!("Sample configuration:\n\n{}", SAMPLE_CONFIG);
                }
                _ => {
                    conversation.push(ChatMessage::user(input));
                    let agent = self.build_agent();
                    let (result, updated) =
                        agent.execute_with_history(conversation.clone(), false).await;
                    conversation = updated;
                    if !result.success {
                        eprintln!("({})", result.message);
                    }
                }
            }
        }
        0
    }

    async fn compact(&self, conversation: &mut Vec<ChatMessage>) {
        // PreCompact hooks observe (and may veto) the compaction.
        if self.hooks.has_hooks_for(HookEvent::PreCompact) {
            let input = HookInput {
                trigger: Some("manual".to_string()),
                ..Default::default()
            };
            match self.hooks.run(HookEvent::PreCompact, input).await {
                Ok(outputs) => {
                    if let Some(reason) = hooks::should_block(&outputs) {
                        println!("Compaction blocked: {}", reason);
                        return;
                    }
                }
                Err(e) => eprintln!("PreCompact hook error: {}", e),
            }
        }

        match summarize_conversation(
            self.llm.clone(),
            conversation,
            self.summarize_llm.clone(),
        )
        .await
        {
            Ok(result) => {
                println!(
                    "Compacted: {} → {} tokens ({:.1}x, saved {})",
                    result.original_tokens,
                    result.summary_tokens,
                    result.compression_ratio,
                    result.tokens_saved
                );
                *conversation = compact_conversation(&result);
            }
            Err(e) => println!("Cannot compact: {}", e),
        }
    }

    async fn inject_session_start_context(&self, conversation: &mut Vec<ChatMessage>) {
        if !self.hooks.has_hooks_for(HookEvent::SessionStart) {
            return;
        }
        let input = HookInput {
            source: Some("startup".to_string()),
            ..Default::default()
        };
        match self.hooks.run(HookEvent::SessionStart, input).await {
            Ok(outputs) => {
                if let Some(context) = hooks::additional_context(&outputs) {
                    conversation.push(ChatMessage::system(context));
                }
            }
            Err(e) => eprintln!("SessionStart hook error: {}", e),
        }
    }
}

fn print_history(conversation: &[ChatMessage]) {
    for (i, message) in conversation.iter().enumerate() {
        let mut preview = message.content.replace('\n', " ");
        if preview.len() > 100 {
            preview.truncate(97);
            preview.push_str("...");
        }
        let tools = if message.tool_calls.is_empty() {
            String::new()
        } else {
            format!(
                " [tools: {}]",
                message
                    .tool_calls
                    .iter()
                    .map(|tc| tc.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        println!("[{}] {}: {}{}", i, message.role, preview, tools);
    }
}

fn print_todos() {
    let todos = TodoStore::read();
    if todos.is_empty() {
        println!("No todos.");
        return;
    }
    for todo in todos {
        println!("- [{:?}] {} {}", todo.status, todo.id, todo.content);
    }
}

/// Debug-mode gate: show the pending conversation and ask before each call.
struct PromptDebugger;

impl agenticode_core::agent::Debugger for PromptDebugger {
    fn should_continue(&self, messages: &[ChatMessage]) -> bool {
        println!("\n{}", "=".repeat(60));
        println!("DEBUG: about to call the LLM ({} messages)", messages.len());
        if let Some(last) = messages.last() {
            let mut preview = last.content.clone();
            if preview.len() > 200 {
                preview.truncate(197);
                preview.push_str("...");
            }
            println!("last ({}): {}", last.role, preview);
        }
        print!("Continue? (y/n): ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes" | "")
    }
}
