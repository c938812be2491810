#[path = "../common/mod.rs"]
mod common;

use common::{article, StubProvider};
use newsroom::aggregator::{Aggregator, RoutingTable};
use newsroom::article::Category;
use newsroom::error::ValidationError;
use newsroom::providers::ProviderId;
use newsroom::tools::news::{NewsSearchArgs, NewsSearchTool, NewsSearchToolError};
use newsroom::tools::ToolRegistry;
use rig::tool::Tool;
use std::sync::Arc;
use std::time::Duration;

fn tool() -> (NewsSearchTool, Arc<StubProvider>, Arc<StubProvider>) {
    let web = Arc::new(StubProvider::returning(
        ProviderId::WebSearch,
        vec![article("https://web.test/1", "Web")],
    ));
    let business = Arc::new(StubProvider::returning(
        ProviderId::BusinessNews,
        vec![article("https://biz.test/1", "Biz")],
    ));
    let aggregator = Aggregator::new(
        RoutingTable::empty()
            .with_route(Category::General, vec![ProviderId::WebSearch])
            .with_route(Category::Business, vec![ProviderId::BusinessNews]),
        5,
        Duration::from_secs(2),
    )
    .with_provider(web.clone())
    .with_provider(business.clone());
    (NewsSearchTool::new(Arc::new(aggregator)), web, business)
}

#[tokio::test]
async fn classifies_when_no_category_given() {
    let (tool, web, business) = tool();

    let output = tool
        .call(NewsSearchArgs {
            query: "bank earnings".to_string(),
            category: None,
        })
        .await
        .expect("News tool call failed");

    assert_eq!(output.category, Category::Business);
    assert_eq!(output.sections[0].name, "financial_sources");
    assert_eq!(business.calls(), 1);
    assert_eq!(web.calls(), 0);
}

#[tokio::test]
async fn explicit_category_overrides_classification() {
    let (tool, web, business) = tool();

    let output = tool
        .call(NewsSearchArgs {
            query: "bank earnings".to_string(),
            category: Some("general".to_string()),
        })
        .await
        .expect("News tool call failed");

    assert_eq!(output.category, Category::General);
    assert_eq!(web.calls(), 1);
    assert_eq!(business.calls(), 0);
}

#[tokio::test]
async fn rejects_unknown_category_and_empty_query() {
    let (tool, _, _) = tool();

    let err = tool
        .call(NewsSearchArgs {
            query: "anything".to_string(),
            category: Some("sports".to_string()),
        })
        .await
        .expect_err("Expected unknown category");
    match err {
        NewsSearchToolError::Validation(ValidationError::UnknownCategory(c)) => {
            assert_eq!(c, "sports")
        }
        other => panic!("Unexpected error: {other:?}"),
    }

    let err = tool
        .call(NewsSearchArgs {
            query: " ".to_string(),
            category: None,
        })
        .await
        .expect_err("Expected empty query");
    assert!(matches!(
        err,
        NewsSearchToolError::Validation(ValidationError::EmptyQuery)
    ));
}

#[tokio::test]
async fn registry_invokes_with_model_arguments() {
    let (tool, _, _) = tool();
    let registry = ToolRegistry::new().with_tool(tool);

    assert_eq!(registry.names(), vec!["search_news"]);
    let definitions = registry.definitions().await;
    assert_eq!(definitions[0].parameters["required"][0], "query");

    let value = registry
        .invoke("search_news", r#"{"query": "harbour"}"#)
        .await
        .expect("invoke failed");
    assert_eq!(value["sections"][0]["articles"][0]["url"], "https://web.test/1");

    let err = registry
        .invoke("search_news", r#"{"topic": "harbour"}"#)
        .await
        .expect_err("missing query must be rejected");
    assert!(err.to_string().starts_with("Invalid arguments for search_news"));
}
