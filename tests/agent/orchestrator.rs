#[path = "../common/mod.rs"]
mod common;

use common::{article, search_call, ScriptedModel, StubProvider};
use newsroom::agent::llm::{ChatMessage, ChatRole, LlmError, ModelProvider, ToolCall};
use newsroom::agent::memory::Role;
use newsroom::agent::{Orchestrator, TurnRequest};
use newsroom::aggregator::{Aggregator, RoutingTable};
use newsroom::article::Category;
use newsroom::error::{AgentError, OrchestrationError, ValidationError};
use newsroom::providers::ProviderId;
use newsroom::tools::news::NewsSearchTool;
use newsroom::tools::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

fn aggregator() -> Arc<Aggregator> {
    Arc::new(
        Aggregator::new(
            RoutingTable::empty()
                .with_route(Category::General, vec![ProviderId::WebSearch])
                .with_route(
                    Category::Technology,
                    vec![ProviderId::TechNews, ProviderId::WebSearch],
                ),
            5,
            Duration::from_secs(2),
        )
        .with_provider(Arc::new(StubProvider::returning(
            ProviderId::WebSearch,
            vec![
                article("https://web.test/1", "Web one"),
                article("https://shared.test/1", "Shared"),
            ],
        )))
        .with_provider(Arc::new(StubProvider::returning(
            ProviderId::TechNews,
            vec![
                article("https://shared.test/1", "Shared"),
                article("https://tech.test/1", "Tech one"),
            ],
        ))),
    )
}

fn orchestrator(model: Arc<ScriptedModel>) -> Orchestrator {
    Orchestrator::new(
        ModelProvider::Groq,
        model,
        ToolRegistry::new().with_tool(NewsSearchTool::new(aggregator())),
    )
}

fn contents(messages: &[ChatMessage]) -> Vec<String> {
    messages.iter().filter_map(|m| m.content.clone()).collect()
}

#[tokio::test]
async fn answers_after_one_search_round() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(search_call("call-1", "latest AI news")),
        Ok(ChatMessage::assistant("AI is moving fast.")),
    ]));
    let orchestrator = orchestrator(model.clone());

    let turn = orchestrator
        .respond("latest AI news", Some("abc"))
        .await
        .expect("turn failed");

    assert_eq!(turn.answer, "AI is moving fast.");
    assert_eq!(turn.thread_id, "abc");
    assert_eq!(turn.rounds, 1);
    assert_eq!(turn.raw.category, Category::Technology);
    let urls: Vec<&str> = turn.raw.urls().collect();
    assert_eq!(
        urls,
        vec!["https://shared.test/1", "https://tech.test/1", "https://web.test/1"]
    );

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].tool_names, vec!["search_news".to_string()]);
    let tool_reply = calls[1]
        .messages
        .iter()
        .find(|m| m.role == ChatRole::Tool)
        .expect("tool result sent back to the model");
    assert_eq!(tool_reply.tool_call_id.as_deref(), Some("call-1"));
}

#[tokio::test]
async fn thread_context_carries_into_the_next_turn() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(search_call("call-1", "latest AI news")),
        Ok(ChatMessage::assistant("AI is moving fast.")),
        Ok(ChatMessage::assistant("Mostly chip makers.")),
    ]));
    let orchestrator = orchestrator(model.clone());

    orchestrator
        .respond("latest AI news", Some("abc"))
        .await
        .expect("first turn failed");
    let second = orchestrator
        .respond("what about the companies involved?", Some("abc"))
        .await
        .expect("second turn failed");

    assert_eq!(second.answer, "Mostly chip makers.");
    assert_eq!(second.rounds, 0);
    // No search this turn: the empty result is classified with the thread.
    assert_eq!(second.raw.category, Category::Technology);
    assert!(second.raw.is_empty());

    let context = contents(&model.calls()[2].messages);
    assert!(context.iter().any(|c| c == "latest AI news"));
    assert!(context.iter().any(|c| c == "AI is moving fast."));
    assert!(context.iter().any(|c| c.contains("search_news")));

    let history = orchestrator.history("abc").await;
    let roles: Vec<Role> = history.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::User,
            Role::Tool,
            Role::Assistant,
            Role::User,
            Role::Assistant
        ]
    );
}

#[tokio::test]
async fn fresh_thread_has_no_prior_context() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(ChatMessage::assistant("First.")),
        Ok(ChatMessage::assistant("Second.")),
    ]));
    let orchestrator = orchestrator(model.clone());

    orchestrator
        .respond("harbour news", Some("abc"))
        .await
        .expect("first turn failed");
    orchestrator
        .respond("what about tomorrow?", Some("xyz"))
        .await
        .expect("second turn failed");

    let context = contents(&model.calls()[1].messages);
    assert!(!context.iter().any(|c| c == "harbour news"));
    assert!(!context.iter().any(|c| c == "First."));
    assert!(orchestrator.history("xyz").await.len() == 2);
}

#[tokio::test]
async fn default_thread_is_used_when_none_given() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(ChatMessage::assistant("Hi."))]));
    let orchestrator = orchestrator(model).with_default_thread("main");

    let turn = orchestrator
        .respond_with(TurnRequest::new("hello"))
        .await
        .expect("turn failed");

    assert_eq!(turn.thread_id, "main");
    assert_eq!(orchestrator.history("main").await.len(), 2);
}

#[tokio::test]
async fn exhausted_tool_budget_forces_a_summary() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(search_call("call-1", "rust")),
        Ok(search_call("call-2", "rust language")),
        Ok(ChatMessage::assistant("Here is what I found.")),
    ]));
    let orchestrator = orchestrator(model.clone()).with_max_rounds(2);

    let turn = orchestrator
        .respond("rust", Some("budget"))
        .await
        .expect("turn failed");

    assert_eq!(turn.answer, "Here is what I found.");
    assert_eq!(turn.rounds, 2);

    let calls = model.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[2].tool_names.is_empty());
    assert!(calls[2]
        .messages
        .last()
        .and_then(|m| m.content.as_deref())
        .is_some_and(|c| c.starts_with("Stop searching")));
}

#[tokio::test]
async fn silent_summary_is_an_orchestration_error() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(search_call("call-1", "rust")),
        Ok(ChatMessage::assistant("   ")),
    ]));
    let orchestrator = orchestrator(model).with_max_rounds(1);

    let err = orchestrator
        .respond("rust", Some("quiet"))
        .await
        .expect_err("expected failure");

    assert!(matches!(
        err,
        AgentError::Orchestration(OrchestrationError::ToolLoopExhausted { rounds: 1 })
    ));
    assert!(orchestrator.history("quiet").await.is_empty());
}

#[tokio::test]
async fn llm_failure_leaves_the_thread_untouched() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(ChatMessage::assistant("First answer.")),
        Err(LlmError::Transport("connection reset".to_string())),
    ]));
    let orchestrator = orchestrator(model);

    orchestrator
        .respond("harbour news", Some("abc"))
        .await
        .expect("first turn failed");
    let err = orchestrator
        .respond("and tomorrow?", Some("abc"))
        .await
        .expect_err("expected failure");

    assert!(matches!(
        err,
        AgentError::Orchestration(OrchestrationError::Llm(_))
    ));
    let history = orchestrator.history("abc").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].text, "First answer.");
}

#[tokio::test]
async fn tool_errors_are_fed_back_to_the_model() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(ChatMessage::assistant_tool_calls(vec![
            ToolCall::new("call-1", "search_news", "{\"query\": \"rust\", \"category\": \"sports\"}"),
            ToolCall::new("call-2", "stock_ticker", "{}"),
        ])),
        Ok(ChatMessage::assistant("I could not search that.")),
    ]));
    let orchestrator = orchestrator(model.clone());

    let turn = orchestrator
        .respond("rust", Some("errs"))
        .await
        .expect("turn failed");

    assert_eq!(turn.answer, "I could not search that.");
    assert!(turn.raw.is_empty());

    let tool_messages: Vec<String> = model.calls()[1]
        .messages
        .iter()
        .filter(|m| m.role == ChatRole::Tool)
        .filter_map(|m| m.content.clone())
        .collect();
    assert_eq!(tool_messages.len(), 2);
    assert!(tool_messages[0].contains("Unknown category: sports"));
    assert!(tool_messages[1].contains("Unknown tool: stock_ticker"));
}

#[tokio::test]
async fn validation_happens_before_the_model_is_called() {
    let model = Arc::new(ScriptedModel::default());
    let orchestrator = orchestrator(model.clone());

    let err = orchestrator
        .respond("  ", None)
        .await
        .expect_err("expected failure");
    assert!(matches!(
        err,
        AgentError::Validation(ValidationError::EmptyQuery)
    ));

    let err = orchestrator
        .respond_with(TurnRequest {
            question: "news".to_string(),
            thread_id: None,
            model_provider: Some(ModelProvider::OpenAi),
        })
        .await
        .expect_err("expected failure");
    assert!(matches!(
        err,
        AgentError::Validation(ValidationError::ModelProviderUnavailable(_))
    ));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn disabled_memory_stores_nothing() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(ChatMessage::assistant("One.")),
        Ok(ChatMessage::assistant("Two.")),
    ]));
    let orchestrator = orchestrator(model.clone()).with_memory(false);

    orchestrator.respond("first", Some("abc")).await.unwrap();
    orchestrator.respond("second", Some("abc")).await.unwrap();

    assert!(orchestrator.history("abc").await.is_empty());
    assert!(!contents(&model.calls()[1].messages)
        .iter()
        .any(|c| c == "first"));
}

#[tokio::test]
async fn clear_forgets_a_thread() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(ChatMessage::assistant("One."))]));
    let orchestrator = orchestrator(model);

    orchestrator.respond("first", Some("abc")).await.unwrap();

    assert!(orchestrator.clear("abc").await);
    assert!(orchestrator.history("abc").await.is_empty());
    assert!(!orchestrator.clear("never-used").await);
}

#[tokio::test]
async fn long_threads_replay_only_recent_turns() {
    let model = Arc::new(ScriptedModel::default());
    for i in 0..12 {
        model.push(Ok(ChatMessage::assistant(format!("Answer {i}."))));
    }
    let orchestrator = orchestrator(model.clone()).with_history_limit(4);

    for i in 0..12 {
        orchestrator
            .respond(&format!("question {i}"), Some("long"))
            .await
            .expect("turn failed");
    }

    let last = &model.calls()[11].messages;
    assert_eq!(last.len(), 1 + 4 + 1);
    assert_eq!(
        contents(&last[1..]),
        vec![
            "question 9",
            "Answer 9.",
            "question 10",
            "Answer 10.",
            "question 11"
        ]
    );
    assert!(model
        .calls()
        .iter()
        .all(|call| call.messages.len() <= 1 + 4 + 1));
    assert_eq!(orchestrator.history("long").await.len(), 4);
}
