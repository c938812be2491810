pub mod llm;
pub mod memory;
pub mod prompt;

use chrono::{DateTime, Utc};
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use llm::{ChatMessage, ChatModel, ModelProvider, ToolCall};
use memory::{ConversationThread, Role, ThreadStore, Turn};
use prompt::{build_system_prompt, SUMMARIZE_NOW};

use crate::aggregator::{Aggregator, DEFAULT_SECTION_LIMIT};
use crate::article::{truncate_chars, AggregatedResponse};
use crate::classifier::classify_in_context;
use crate::config::{parse_optional, AppConfig};
use crate::error::{AgentError, ConfigError, OrchestrationError, ValidationError};
use crate::speech::Transcriber;
use crate::tools::news::NewsSearchTool;
use crate::tools::transcribe::TranscribeAudioTool;
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;
pub const DEFAULT_THREAD_ID: &str = "default";
pub const DEFAULT_MAX_HISTORY_TURNS: usize = 20;
const MAX_REMEMBERED_TOOL_CHARS: usize = 4000;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AgentConfig {
    #[serde(rename = "max_tool_rounds", default, deserialize_with = "parse_optional")]
    pub max_tool_rounds: Option<usize>,
    #[serde(rename = "memory_enabled", default, deserialize_with = "parse_optional")]
    pub memory_enabled: Option<bool>,
    #[serde(rename = "default_thread_id")]
    pub default_thread_id: Option<String>,
    #[serde(rename = "max_history_turns", default, deserialize_with = "parse_optional")]
    pub max_history_turns: Option<usize>,
    #[serde(rename = "max_threads", default, deserialize_with = "parse_optional")]
    pub max_threads: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub question: String,
    pub thread_id: Option<String>,
    pub model_provider: Option<ModelProvider>,
}

impl TurnRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn on_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct TurnResponse {
    pub thread_id: String,
    pub answer: String,
    pub raw: AggregatedResponse,
    pub rounds: usize,
    pub generated_at: DateTime<Utc>,
}

/// Where a single turn is. Between turns the orchestrator holds no state
/// besides the thread store.
#[derive(Debug)]
enum TurnState {
    ToolSelection { round: usize },
    ToolExecution { round: usize, calls: Vec<ToolCall> },
    Summarization,
    Done(String),
}

/// Drives one conversational turn: the model picks tools, the orchestrator
/// runs them, and the model writes the final answer from their output.
pub struct Orchestrator {
    models: HashMap<ModelProvider, Arc<dyn ChatModel>>,
    default_provider: ModelProvider,
    tools: ToolRegistry,
    threads: ThreadStore,
    max_rounds: usize,
    max_history_turns: usize,
    section_limit: usize,
    memory_enabled: bool,
    default_thread_id: String,
}

impl Orchestrator {
    pub fn new(provider: ModelProvider, model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        let mut models = HashMap::new();
        models.insert(provider, model);
        Self {
            models,
            default_provider: provider,
            tools,
            threads: ThreadStore::new(),
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
            section_limit: DEFAULT_SECTION_LIMIT,
            memory_enabled: true,
            default_thread_id: DEFAULT_THREAD_ID.to_string(),
        }
    }

    pub fn with_model(mut self, provider: ModelProvider, model: Arc<dyn ChatModel>) -> Self {
        self.models.insert(provider, model);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Turns older than the last `max_turns` are neither replayed nor kept.
    pub fn with_history_limit(mut self, max_turns: usize) -> Self {
        self.max_history_turns = max_turns;
        self
    }

    /// Applies when several searches in one turn are merged.
    pub fn with_section_limit(mut self, section_limit: usize) -> Self {
        self.section_limit = section_limit.max(1);
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.threads = ThreadStore::with_max_threads(max_threads);
        self
    }

    pub fn with_memory(mut self, enabled: bool) -> Self {
        self.memory_enabled = enabled;
        self
    }

    pub fn with_default_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.default_thread_id = thread_id.into();
        self
    }

    pub fn from_config(
        config: &AppConfig,
        aggregator: Arc<Aggregator>,
        transcriber: Arc<Transcriber>,
    ) -> Result<Self, ConfigError> {
        let default_provider = config.llm.default_provider();
        let mut models: HashMap<ModelProvider, Arc<dyn ChatModel>> = HashMap::new();
        for provider in config.llm.configured_providers() {
            if let Some(endpoint) = config.llm.endpoint(provider) {
                let model =
                    llm::connect(&endpoint).map_err(|err| ConfigError::Invalid(err.to_string()))?;
                models.insert(provider, model);
            }
        }
        let model = models
            .remove(&default_provider)
            .ok_or_else(|| ConfigError::MissingCredential {
                provider: default_provider.to_string(),
                var: default_provider.key_var().to_string(),
            })?;

        let section_limit = aggregator.section_limit();
        let mut tools = ToolRegistry::new().with_tool(NewsSearchTool::new(aggregator));
        if transcriber.is_configured() {
            tools = tools.with_tool(TranscribeAudioTool::new(transcriber));
        }

        let mut orchestrator = Self::new(default_provider, model, tools)
            .with_max_rounds(
                config
                    .agent
                    .max_tool_rounds
                    .unwrap_or(DEFAULT_MAX_TOOL_ROUNDS),
            )
            .with_history_limit(
                config
                    .agent
                    .max_history_turns
                    .unwrap_or(DEFAULT_MAX_HISTORY_TURNS),
            )
            .with_section_limit(section_limit)
            .with_memory(config.agent.memory_enabled.unwrap_or(true));
        if let Some(max_threads) = config.agent.max_threads {
            orchestrator = orchestrator.with_max_threads(max_threads);
        }
        if let Some(thread_id) = config
            .agent
            .default_thread_id
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            orchestrator = orchestrator.with_default_thread(thread_id.trim());
        }
        for (provider, model) in models {
            orchestrator = orchestrator.with_model(provider, model);
        }
        Ok(orchestrator)
    }

    pub fn default_thread_id(&self) -> &str {
        &self.default_thread_id
    }

    pub fn default_provider(&self) -> ModelProvider {
        self.default_provider
    }

    pub fn memory_enabled(&self) -> bool {
        self.memory_enabled
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.names()
    }

    pub async fn history(&self, thread_id: &str) -> Vec<Turn> {
        self.threads.history(thread_id).await
    }

    pub async fn clear(&self, thread_id: &str) -> bool {
        self.threads.clear(thread_id).await
    }

    pub async fn respond(
        &self,
        question: &str,
        thread_id: Option<&str>,
    ) -> Result<TurnResponse, AgentError> {
        self.respond_with(TurnRequest {
            question: question.to_string(),
            thread_id: thread_id.map(str::to_string),
            model_provider: None,
        })
        .await
    }

    pub async fn respond_with(&self, request: TurnRequest) -> Result<TurnResponse, AgentError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        let provider = request.model_provider.unwrap_or(self.default_provider);
        let model = self
            .models
            .get(&provider)
            .cloned()
            .ok_or_else(|| ValidationError::ModelProviderUnavailable(provider.to_string()))?;
        let thread_id = request
            .thread_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.default_thread_id)
            .to_string();

        log::info!(
            "turn on thread '{}' with {} ({})",
            thread_id,
            provider,
            model.model_name()
        );

        if !self.memory_enabled {
            let mut scratch = ConversationThread::new(&thread_id);
            return self.run_turn(model.as_ref(), &mut scratch, question).await;
        }

        let handle = self.threads.thread(&thread_id);
        let mut thread = handle.lock().await;
        self.run_turn(model.as_ref(), &mut thread, question).await
    }

    async fn run_turn(
        &self,
        model: &dyn ChatModel,
        thread: &mut ConversationThread,
        question: &str,
    ) -> Result<TurnResponse, AgentError> {
        let definitions = self.tools.definitions().await;
        let mut messages = vec![ChatMessage::system(build_system_prompt(
            &self.tools.names(),
        ))];
        messages.extend(replay(thread.recent(self.max_history_turns)));
        messages.push(ChatMessage::user(question));

        let mut transcript = vec![Turn::new(Role::User, question)];
        let mut raw: Option<AggregatedResponse> = None;
        let mut rounds = 0;
        let mut state = TurnState::ToolSelection { round: 1 };

        let answer = loop {
            state = match state {
                TurnState::ToolSelection { round } => {
                    log::debug!("round {}: tool selection", round);
                    let reply = model
                        .complete(&messages, &definitions)
                        .await
                        .map_err(OrchestrationError::from)?;
                    if reply.tool_calls.is_empty() {
                        match reply.answer() {
                            Some(text) => TurnState::Done(text.to_string()),
                            None => TurnState::Summarization,
                        }
                    } else {
                        let calls = reply.tool_calls.clone();
                        messages.push(reply);
                        TurnState::ToolExecution { round, calls }
                    }
                }
                TurnState::ToolExecution { round, calls } => {
                    rounds = round;
                    for call in calls {
                        log::info!("round {}: running {}", round, call.function.name);
                        let output = self.execute(&call, &mut raw).await;
                        transcript.push(Turn::new(
                            Role::Tool,
                            format!(
                                "{}: {}",
                                call.function.name,
                                truncate_chars(&output, MAX_REMEMBERED_TOOL_CHARS)
                            ),
                        ));
                        messages.push(ChatMessage::tool_result(call.id, output));
                    }
                    if round >= self.max_rounds {
                        log::warn!("tool budget of {} rounds spent", self.max_rounds);
                        TurnState::Summarization
                    } else {
                        TurnState::ToolSelection { round: round + 1 }
                    }
                }
                TurnState::Summarization => {
                    log::debug!("summarizing after {} rounds", rounds);
                    messages.push(ChatMessage::user(SUMMARIZE_NOW));
                    let reply = model
                        .complete(&messages, &[])
                        .await
                        .map_err(OrchestrationError::from)?;
                    match reply.answer() {
                        Some(text) => TurnState::Done(text.to_string()),
                        None => {
                            return Err(OrchestrationError::ToolLoopExhausted { rounds }.into())
                        }
                    }
                }
                TurnState::Done(answer) => break answer,
            };
        };

        let raw = raw.unwrap_or_else(|| {
            AggregatedResponse::empty(question, classify_in_context(question, Some(&*thread)))
        });
        transcript.push(Turn::new(Role::Assistant, answer.clone()));
        thread.turns.extend(transcript);
        thread.retain_recent(self.max_history_turns);

        Ok(TurnResponse {
            thread_id: thread.thread_id.clone(),
            answer,
            raw,
            rounds,
            generated_at: Utc::now(),
        })
    }

    /// Tool failures are reported back to the model, never raised.
    async fn execute(&self, call: &ToolCall, raw: &mut Option<AggregatedResponse>) -> String {
        match self
            .tools
            .invoke(&call.function.name, &call.function.arguments)
            .await
        {
            Ok(value) => {
                if call.function.name == NewsSearchTool::NAME {
                    if let Ok(found) = serde_json::from_value::<AggregatedResponse>(value.clone()) {
                        match raw {
                            Some(existing) => existing.absorb(found, self.section_limit),
                            None => *raw = Some(found),
                        }
                    }
                }
                value.to_string()
            }
            Err(err) => {
                log::warn!("tool call failed: {}", err);
                serde_json::json!({ "error": err.to_string() }).to_string()
            }
        }
    }
}

fn replay(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|turn| match turn.role {
            Role::User => ChatMessage::user(turn.text.clone()),
            Role::Assistant => ChatMessage::assistant(turn.text.clone()),
            Role::Tool => {
                ChatMessage::system(format!("Tool result from an earlier turn: {}", turn.text))
            }
        })
        .collect()
}
