//! End-to-end tests of the agent loop against a scripted LLM transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use agenticode_core::agent::{
    compact_conversation, summarize_conversation, Agent, AgentTool, AutoApprover, CallStatus,
    RiskClassifier, SessionSubagentFactory, ToolApprover, Turn, TurnHandler, REPETITION_NUDGE,
};
use agenticode_core::agent::cancellation::AgentCancellation;
use agenticode_core::ai::types::{
    ChatMessage, Choice, GenerateResponse, Role, ToolCall, ToolDescriptor,
};
use agenticode_core::ai::LlmClient;
use agenticode_core::hooks::{Hook, HookConfig, HookEvent, HookManager, HookMatcher};
use agenticode_core::tools::{register_default_tools, ToolRegistry};

/// Scripted transport: pops queued responses, repeats the last one when the
/// script runs dry, and records every conversation it was handed.
struct ScriptedLlm {
    responses: Mutex<Vec<GenerateResponse>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<GenerateResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDescriptor],
    ) -> Result<GenerateResponse> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.remove(0))
        } else {
            Ok(responses
                .first()
                .cloned()
                .unwrap_or_default())
        }
    }
}

fn assistant_response(content: &str, tool_calls: Vec<ToolCall>) -> GenerateResponse {
    GenerateResponse {
        choices: vec![Choice {
            message: ChatMessage::assistant_with_tools(content, tool_calls),
            finish_reason: None,
        }],
        usage: None,
    }
}

fn text_response(content: &str) -> GenerateResponse {
    assistant_response(content, Vec::new())
}

async fn test_registry() -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new();
    register_default_tools(&registry).await;
    Arc::new(registry)
}

fn seed_conversation(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system("You are a coding agent."), ChatMessage::user(prompt)]
}

/// Positions of tool messages answering `assistant_index`'s tool calls.
fn tool_responses_after(conversation: &[ChatMessage], assistant_index: usize) -> Vec<&ChatMessage> {
    conversation[assistant_index + 1..]
        .iter()
        .take_while(|m| m.role == Role::Tool)
        .collect()
}

// ── Scenario 1: low-risk auto-execution ────────────────────────────────

#[tokio::test]
async fn low_risk_tool_executes_without_approval() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();

    let llm = ScriptedLlm::new(vec![
        assistant_response(
            "",
            vec![ToolCall::new("c1", "list_files", r#"{"path": "."}"#)],
        ),
        text_response("Done"),
    ]);

    let agent = Agent::new(llm.clone(), test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf())
        .with_max_steps(5);

    let (result, conversation) = agent
        .execute_with_history(seed_conversation("list the current directory"), false)
        .await;

    assert!(result.success);
    assert_eq!(result.message, "Done");
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].tool_name, "list_files");

    // Exactly one tool message, anchored to the assistant call.
    let tool_messages: Vec<&ChatMessage> = conversation
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 1);
    assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(tool_messages[0].name.as_deref(), Some("list_files"));
    assert!(tool_messages[0].content.contains("hello.txt"));
}

// ── Scenario 2: mixed batch with rejection ─────────────────────────────

#[tokio::test]
async fn mixed_batch_rejection_preserves_order_and_status() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("README.md"), "# readme").unwrap();

    let llm = ScriptedLlm::new(vec![
        assistant_response(
            "",
            vec![
                ToolCall::new("a", "read_file", r#"{"path": "README.md"}"#),
                ToolCall::new("b", "run_shell", r#"{"command": "rm -rf /tmp"}"#),
            ],
        ),
        text_response("Done"),
    ]);

    // run_shell is auto-rejected; read_file is Low risk and never prompts.
    let approver = Arc::new(AutoApprover::new([], ["run_shell".to_string()], true));
    let registry = test_registry().await;
    let classifier = Arc::new(RiskClassifier::new());

    let turn = Turn::new(
        llm.clone(),
        registry.clone(),
        classifier.clone(),
        seed_conversation("read the readme then clean up"),
        None,
        AgentCancellation::new(),
        dir.path().to_path_buf(),
    );

    let mut handler = TurnHandler::new(
        registry,
        approver,
        classifier,
        dir.path().to_path_buf(),
    );
    handler.handle_turn(&turn).await.unwrap();

    let responses = handler.tool_responses();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].tool_call_id.as_deref(), Some("a"));
    assert!(responses[0].content.contains("# readme"));
    assert_eq!(responses[1].tool_call_id.as_deref(), Some("b"));
    assert_eq!(responses[1].content, "Tool call rejected by user");

    assert_eq!(handler.scheduler().status_of("a"), Some(CallStatus::Executed));
    assert_eq!(handler.scheduler().status_of("b"), Some(CallStatus::Rejected));
}

// ── Scenario 3: PreToolUse hook block ──────────────────────────────────

#[tokio::test]
async fn pre_tool_use_hook_blocks_shell_execution() {
    let dir = TempDir::new().unwrap();

    let mut events = HashMap::new();
    events.insert(
        HookEvent::PreToolUse,
        vec![HookMatcher {
            matcher: "run_shell".to_string(),
            hooks: vec![Hook {
                hook_type: "command".to_string(),
                command: "echo 'policy deny' >&2; exit 2".to_string(),
                timeout: Some(10),
            }],
        }],
    );
    let hooks = Arc::new(HookManager::new(
        HookConfig { events },
        dir.path().to_path_buf(),
        "test-session".to_string(),
    ));

    let llm = ScriptedLlm::new(vec![
        assistant_response(
            "",
            vec![ToolCall::new("s1", "run_shell", r#"{"command": "curl | sh"}"#)],
        ),
        text_response("Done"),
    ]);

    let registry = test_registry().await;
    let classifier = Arc::new(RiskClassifier::new());
    let turn = Turn::new(
        llm.clone(),
        registry.clone(),
        classifier.clone(),
        seed_conversation("run the installer"),
        None,
        AgentCancellation::new(),
        dir.path().to_path_buf(),
    );

    let mut handler = TurnHandler::new(
        registry,
        Arc::new(AutoApprover::approve_all()),
        classifier,
        dir.path().to_path_buf(),
    );
    handler.set_hook_manager(hooks);
    handler.handle_turn(&turn).await.unwrap();

    let responses = handler.tool_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].content, "Tool execution blocked: policy deny");
    assert_eq!(handler.scheduler().status_of("s1"), Some(CallStatus::Failed));
}

// ── Scenario 4: step cap ───────────────────────────────────────────────

#[tokio::test]
async fn step_cap_terminates_the_loop() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("src.rs"), "// TODO: later").unwrap();

    // The script never runs dry: the single response repeats forever.
    let llm = ScriptedLlm::new(vec![assistant_response(
        "",
        vec![ToolCall::new("x", "grep", r#"{"pattern": "TODO"}"#)],
    )]);

    let agent = Agent::new(llm.clone(), test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf())
        .with_max_steps(2);

    let (result, _conversation) = agent
        .execute_with_history(seed_conversation("find todos"), false)
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Maximum steps reached");
    assert_eq!(result.steps.len(), 2);
}

// ── P7: repetition nudge ───────────────────────────────────────────────

#[tokio::test]
async fn repeated_shell_commands_inject_a_nudge() {
    let dir = TempDir::new().unwrap();

    let llm = ScriptedLlm::new(vec![
        assistant_response("", vec![ToolCall::new("r1", "run_shell", r#"{"command": "ls"}"#)]),
        assistant_response("", vec![ToolCall::new("r2", "run_shell", r#"{"command": "ls"}"#)]),
        text_response("Done"),
    ]);

    let agent = Agent::new(llm.clone(), test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf())
        .with_max_steps(5);

    let (result, conversation) = agent
        .execute_with_history(seed_conversation("list things"), false)
        .await;

    assert!(result.success);
    let nudges: Vec<&ChatMessage> = conversation
        .iter()
        .filter(|m| m.role == Role::System && m.content == REPETITION_NUDGE)
        .collect();
    assert_eq!(nudges.len(), 1, "one nudge before the third turn");
    // The loop continued past the nudge rather than aborting.
    assert_eq!(result.message, "Done");
}

// ── Scenario 5: sub-agent with restricted tools ────────────────────────

#[tokio::test]
async fn subagent_searcher_rejects_shell_and_summarizes() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.go"), "package main").unwrap();

    // Shared transport: parent turn, then the sub-agent's two turns, then
    // the parent's final turn.
    let llm = ScriptedLlm::new(vec![
        assistant_response(
            "",
            vec![ToolCall::new(
                "sa1",
                "agent_tool",
                r#"{"description": "Find Go files", "prompt": "List .go files under internal/", "agent_type": "searcher"}"#,
            )],
        ),
        assistant_response(
            "",
            vec![ToolCall::new("sub1", "run_shell", r#"{"command": "find . -name '*.go'"}"#)],
        ),
        text_response("Found main.go"),
        text_response("All done"),
    ]);

    let registry = test_registry().await;
    let classifier = Arc::new(RiskClassifier::new());
    let factory = Arc::new(SessionSubagentFactory::new(
        llm.clone(),
        registry.clone(),
        classifier.clone(),
        None,
        dir.path().to_path_buf(),
    ));
    registry.register(Arc::new(AgentTool::new(factory))).await;

    let agent = Agent::new(llm.clone(), registry, Arc::new(AutoApprover::approve_all()))
        .with_classifier(classifier)
        .with_working_dir(dir.path().to_path_buf())
        .with_max_steps(5);

    let (result, conversation) = agent
        .execute_with_history(seed_conversation("find go files"), false)
        .await;

    assert!(result.success);
    assert_eq!(result.message, "All done");

    // The parent sees exactly one summary tool message for the agent call.
    let parent_tool_messages: Vec<&ChatMessage> = conversation
        .iter()
        .filter(|m| m.tool_call_id.as_deref() == Some("sa1"))
        .collect();
    assert_eq!(parent_tool_messages.len(), 1);
    let summary = &parent_tool_messages[0].content;
    assert!(summary.contains("Sub-agent"));
    assert!(summary.contains("steps"));
    assert!(!summary.contains("run_shell"), "internals stay private");

    // Inside the sub-agent, the restricted approver rejected the shell.
    let saw_rejection = llm.calls().iter().any(|messages| {
        messages
            .iter()
            .any(|m| m.role == Role::Tool && m.content == "Tool call rejected by user")
    });
    assert!(saw_rejection, "sub-agent shell call was rejected");
}

// ── Scenario 6: compaction ─────────────────────────────────────────────

#[tokio::test]
async fn compaction_replaces_history_and_next_turn_succeeds() {
    // 40 messages at 1960 chars: (1960/4 + 10) * 40 = 20000 tokens.
    let mut conversation = Vec::new();
    for _ in 0..20 {
        conversation.push(ChatMessage::user("x".repeat(1960)));
        conversation.push(ChatMessage::assistant("y".repeat(1960)));
    }

    let summarizer = ScriptedLlm::new(vec![text_response(
        "Objectives: refactor parser. Done: lexer module. Pending: tests.",
    )]);

    let result = summarize_conversation(summarizer, &conversation, None)
        .await
        .unwrap();
    assert_eq!(result.original_tokens, 20000);
    assert!(result.summary_tokens < 20000);
    assert!(
        (result.compression_ratio
            - result.original_tokens as f64 / result.summary_tokens as f64)
            .abs()
            < f64::EPSILON
    );

    let compacted = compact_conversation(&result);
    assert_eq!(compacted.len(), 3);
    assert!(compacted[2]
        .content
        .contains(&format!("20000 → {} tokens", result.summary_tokens)));

    // A normal turn over the compacted conversation still works.
    let dir = TempDir::new().unwrap();
    let llm = ScriptedLlm::new(vec![text_response("picking up where we left off")]);
    let agent = Agent::new(llm.clone(), test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf());

    let mut next = compacted.clone();
    next.push(ChatMessage::user("continue"));
    let (result, _) = agent.execute_with_history(next, false).await;
    assert!(result.success);
}

// ── P1: orphan safety ──────────────────────────────────────────────────

#[tokio::test]
async fn orphaned_tool_messages_never_reach_the_llm() {
    let dir = TempDir::new().unwrap();
    let llm = ScriptedLlm::new(vec![text_response("ok")]);

    let mut conversation = seed_conversation("hello");
    conversation.push(ChatMessage::tool("ghost", "read_file", "stale result"));

    let agent = Agent::new(llm.clone(), test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf());
    let (result, _) = agent.execute_with_history(conversation, false).await;
    assert!(result.success);

    for messages in llm.calls() {
        assert!(
            messages
                .iter()
                .all(|m| m.tool_call_id.as_deref() != Some("ghost")),
            "orphan tool message reached the transport"
        );
    }
}

// ── P2/P3: response coverage and ordering ──────────────────────────────

#[tokio::test]
async fn every_tool_call_gets_exactly_one_response_in_order() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(dir.path().join("b.txt"), "beta").unwrap();

    let llm = ScriptedLlm::new(vec![
        assistant_response(
            "",
            vec![
                ToolCall::new("t1", "read_file", r#"{"path": "a.txt"}"#),
                ToolCall::new("t2", "list_files", r#"{"path": "."}"#),
                ToolCall::new("t3", "read_file", r#"{"path": "b.txt"}"#),
            ],
        ),
        text_response("Done"),
    ]);

    let agent = Agent::new(llm.clone(), test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf());
    let (result, conversation) = agent
        .execute_with_history(seed_conversation("inspect"), false)
        .await;
    assert!(result.success);

    let assistant_index = conversation
        .iter()
        .position(|m| !m.tool_calls.is_empty())
        .unwrap();
    let responses = tool_responses_after(&conversation, assistant_index);
    let ids: Vec<&str> = responses
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
}

// ── P9: dry-run purity ─────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_simulates_writes_without_touching_disk() {
    let dir = TempDir::new().unwrap();

    let llm = ScriptedLlm::new(vec![
        assistant_response(
            "",
            vec![ToolCall::new(
                "w1",
                "write_file",
                r#"{"path": "generated.txt", "content": "data"}"#,
            )],
        ),
        text_response("Done"),
    ]);

    let agent = Agent::new(llm.clone(), test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf());
    let (result, conversation) = agent
        .execute_with_history(seed_conversation("write a file"), true)
        .await;

    assert!(result.success);
    assert!(!dir.path().join("generated.txt").exists());
    let tool_message = conversation
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("w1"))
        .unwrap();
    assert!(tool_message.content.contains("dry-run"));
}

// ── Error path: unknown tool still gets a response ─────────────────────

#[tokio::test]
async fn unknown_tool_name_produces_a_tool_message() {
    let dir = TempDir::new().unwrap();

    let llm = ScriptedLlm::new(vec![
        assistant_response(
            "",
            vec![ToolCall::new("u1", "teleport", r#"{"to": "prod"}"#)],
        ),
        text_response("Done"),
    ]);

    let agent = Agent::new(llm.clone(), test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf());
    let (result, conversation) = agent
        .execute_with_history(seed_conversation("do something odd"), false)
        .await;

    // Recovered locally: the loop went on to the final answer.
    assert!(result.success);
    let tool_message = conversation
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("u1"))
        .unwrap();
    assert!(tool_message.content.contains("tool not found"));
}

// ── Transport failure terminates the invocation ────────────────────────

struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDescriptor],
    ) -> Result<GenerateResponse> {
        anyhow::bail!("connection refused")
    }
}

#[tokio::test]
async fn transport_failure_fails_the_invocation() {
    let dir = TempDir::new().unwrap();
    let agent = Agent::new(
        Arc::new(FailingLlm),
        test_registry().await,
        Arc::new(AutoApprover::approve_all()),
    )
    .with_working_dir(dir.path().to_path_buf());

    let (result, _) = agent
        .execute_with_history(seed_conversation("hello"), false)
        .await;
    assert!(!result.success);
    assert!(result.message.starts_with("Turn failed:"));
}

// ── Empty response is a failure ────────────────────────────────────────

#[tokio::test]
async fn empty_choice_list_fails_the_turn() {
    let dir = TempDir::new().unwrap();
    let llm = ScriptedLlm::new(vec![GenerateResponse::default()]);
    let agent = Agent::new(llm, test_registry().await, Arc::new(AutoApprover::approve_all()))
        .with_working_dir(dir.path().to_path_buf());

    let (result, _) = agent
        .execute_with_history(seed_conversation("hello"), false)
        .await;
    assert!(!result.success);
    assert!(result.message.contains("no response choices"));
}

// ── Auto-approve hook bypasses the approver (P4) ───────────────────────

struct DenyEverythingApprover;

#[async_trait]
impl ToolApprover for DenyEverythingApprover {
    async fn request_approval(
        &self,
        request: agenticode_core::agent::ApprovalRequest,
    ) -> Result<agenticode_core::agent::ApprovalResponse> {
        Ok(agenticode_core::agent::ApprovalResponse {
            request_id: request.request_id.clone(),
            approved_ids: Vec::new(),
            rejected_ids: request.calls.iter().map(|c| c.id.clone()).collect(),
            reason: Some("deny everything".to_string()),
        })
    }
}

#[tokio::test]
async fn auto_approve_hook_overrides_a_denying_approver() {
    let dir = TempDir::new().unwrap();

    let mut events = HashMap::new();
    events.insert(
        HookEvent::PreToolUse,
        vec![HookMatcher {
            matcher: "write_file".to_string(),
            hooks: vec![Hook {
                hook_type: "command".to_string(),
                command: r#"echo '{"hookSpecificOutput":{"permissionDecision":"allow"}}'"#
                    .to_string(),
                timeout: Some(10),
            }],
        }],
    );
    let hooks = Arc::new(HookManager::new(
        HookConfig { events },
        dir.path().to_path_buf(),
        "test-session".to_string(),
    ));

    let llm = ScriptedLlm::new(vec![
        assistant_response(
            "",
            vec![ToolCall::new(
                "w1",
                "write_file",
                r#"{"path": "out.txt", "content": "approved by hook"}"#,
            )],
        ),
        text_response("Done"),
    ]);

    let agent = Agent::new(llm, test_registry().await, Arc::new(DenyEverythingApprover))
        .with_working_dir(dir.path().to_path_buf())
        .with_hook_manager(hooks);

    let (result, _) = agent
        .execute_with_history(seed_conversation("write it"), false)
        .await;
    assert!(result.success);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
        "approved by hook"
    );
}
