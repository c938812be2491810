use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::message::{AssistantContent, Message, ToolResultContent, UserContent};
use rig::completion::{CompletionError, CompletionModel, ToolDefinition};
use rig::providers::openai;
use rig::OneOrMany;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::parse_optional;
use crate::error::ConfigError;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Groq,
    OpenAi,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::Groq => "groq",
            ModelProvider::OpenAi => "openai",
        }
    }

    pub fn key_var(&self) -> &'static str {
        match self {
            ModelProvider::Groq => "NEWSROOM_GROQ_API_KEY",
            ModelProvider::OpenAi => "NEWSROOM_OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(ModelProvider::Groq),
            "openai" => Ok(ModelProvider::OpenAi),
            other => Err(format!("unknown model provider '{}'", other)),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LlmConfig {
    #[serde(rename = "llm_provider", default, deserialize_with = "parse_optional")]
    pub provider: Option<ModelProvider>,
    pub groq_api_key: Option<String>,
    pub groq_model: Option<String>,
    pub groq_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    #[serde(rename = "llm_timeout_secs", default, deserialize_with = "parse_optional")]
    pub timeout_secs: Option<u64>,
}

/// Everything needed to talk to one chat-completions deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmEndpoint {
    pub provider: ModelProvider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn default_provider(&self) -> ModelProvider {
        self.provider.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.default_provider();
        match self.endpoint(provider) {
            Some(_) => Ok(()),
            None => Err(ConfigError::MissingCredential {
                provider: provider.to_string(),
                var: provider.key_var().to_string(),
            }),
        }
    }

    /// `None` when the provider's key is missing.
    pub fn endpoint(&self, provider: ModelProvider) -> Option<LlmEndpoint> {
        let (key, model, base_url, default_model, default_base) = match provider {
            ModelProvider::Groq => (
                &self.groq_api_key,
                &self.groq_model,
                &self.groq_base_url,
                GROQ_MODEL,
                GROQ_BASE_URL,
            ),
            ModelProvider::OpenAi => (
                &self.openai_api_key,
                &self.openai_model,
                &self.openai_base_url,
                OPENAI_MODEL,
                OPENAI_BASE_URL,
            ),
        };
        let api_key = key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some(LlmEndpoint {
            provider,
            api_key: api_key.to_string(),
            base_url: non_blank(base_url).unwrap_or(default_base).to_string(),
            model: non_blank(model).unwrap_or(default_model).to_string(),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(60)),
        })
    }

    pub fn configured_providers(&self) -> Vec<ModelProvider> {
        [ModelProvider::Groq, ModelProvider::OpenAi]
            .into_iter()
            .filter(|p| self.endpoint(*p).is_some())
            .collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("response contained no choices")]
    NoChoices,
    #[error("no messages to send")]
    EmptyConversation,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    pub arguments: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

// Some deployments send `"tool_calls": null` on plain answers.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ToolCall>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ToolCall>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatMessage {
    fn text(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, content)
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Non-blank text content, if any.
    pub fn answer(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// A hosted language model that can optionally call tools.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// One completion round. With an empty `tools` slice the model is asked
    /// for plain text only.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError>;
}

/// Connects to the chat-completions API of `endpoint`. Groq serves the same
/// API as OpenAI under its own base URL, so both go through rig's OpenAI client.
pub fn connect(endpoint: &LlmEndpoint) -> Result<Arc<dyn ChatModel>, LlmError> {
    let client = openai::Client::builder(&endpoint.api_key)
        .base_url(endpoint.base_url.trim_end_matches('/'))
        .build()
        .map_err(|err| LlmError::Transport(err.to_string()))?;
    let model = client.completion_model(&endpoint.model).completions_api();
    Ok(Arc::new(RigChatModel::new(
        model,
        &endpoint.model,
        endpoint.timeout,
    )))
}

/// Adapts any rig [`CompletionModel`] to [`ChatModel`].
#[derive(Clone)]
pub struct RigChatModel<M> {
    model: M,
    name: String,
    timeout: Duration,
}

impl<M: CompletionModel> RigChatModel<M> {
    pub fn new(model: M, name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model,
            name: name.into(),
            timeout,
        }
    }
}

#[async_trait]
impl<M> ChatModel for RigChatModel<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError> {
        let (preamble, mut history) = to_rig_messages(messages);
        let prompt = history.pop().ok_or(LlmError::EmptyConversation)?;

        let mut request = self
            .model
            .completion_request(prompt)
            .messages(history)
            .temperature(0.2);
        if let Some(preamble) = preamble {
            request = request.preamble(preamble);
        }
        if !tools.is_empty() {
            request = request.tools(tools.to_vec());
        }

        log::debug!(
            "calling {} ({} messages, {} tools)",
            self.name,
            messages.len(),
            tools.len()
        );
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))??;
        Ok(from_rig_choice(response.choice))
    }
}

/// Leading system messages become the preamble. Later ones are replayed
/// context and are sent as user text.
fn to_rig_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Message>) {
    let leading = messages
        .iter()
        .take_while(|m| m.role == ChatRole::System)
        .count();
    let preamble: Vec<&str> = messages[..leading]
        .iter()
        .filter_map(|m| m.content.as_deref())
        .collect();
    let preamble = (!preamble.is_empty()).then(|| preamble.join("\n\n"));

    let history = messages[leading..]
        .iter()
        .filter_map(|message| {
            let text = message.content.clone().unwrap_or_default();
            match message.role {
                ChatRole::System | ChatRole::User => Some(Message::user(text)),
                ChatRole::Tool => Some(Message::User {
                    content: OneOrMany::one(UserContent::tool_result(
                        message.tool_call_id.clone().unwrap_or_default(),
                        OneOrMany::one(ToolResultContent::text(text)),
                    )),
                }),
                ChatRole::Assistant => {
                    let mut content: Vec<AssistantContent> = Vec::new();
                    if let Some(text) = message.answer() {
                        content.push(AssistantContent::text(text));
                    }
                    content.extend(message.tool_calls.iter().map(|call| {
                        AssistantContent::tool_call(
                            call.id.clone(),
                            call.function.name.clone(),
                            serde_json::from_str(&call.function.arguments).unwrap_or_else(
                                |_| serde_json::Value::String(call.function.arguments.clone()),
                            ),
                        )
                    }));
                    OneOrMany::many(content)
                        .ok()
                        .map(|content| Message::Assistant { id: None, content })
                }
            }
        })
        .collect();
    (preamble, history)
}

fn from_rig_choice(choice: OneOrMany<AssistantContent>) -> ChatMessage {
    let mut text = Vec::new();
    let mut tool_calls = Vec::new();
    for content in choice {
        match content {
            AssistantContent::Text(part) => text.push(part.text),
            AssistantContent::ToolCall(call) => tool_calls.push(ToolCall::new(
                call.id,
                call.function.name,
                call.function.arguments.to_string(),
            )),
            _ => {}
        }
    }
    let text = text.join("");
    ChatMessage {
        role: ChatRole::Assistant,
        content: (!text.is_empty()).then_some(text),
        tool_calls,
        tool_call_id: None,
    }
}
