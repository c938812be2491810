use newsroom::article::Category;
use newsroom::error::ProviderFailure;
use newsroom::providers::tavily::TavilySearchClient;
use newsroom::providers::{NewsProvider, ProviderConfig, ProviderId};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        api_key: Some("tvly-key".to_string()),
        base_url: server.uri(),
        enabled: true,
    }
}

#[tokio::test]
async fn web_search_rewrites_query_and_normalizes_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("authorization", "Bearer tvly-key"))
        .and(body_partial_json(json!({
            "query": "latest news about open source",
            "topic": "news",
            "max_results": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "latest news about open source",
            "results": [
                {
                    "title": "  Open source wins  ",
                    "url": "https://www.example.org/oss",
                    "content": "Details.",
                    "published_date": "Tue, 05 Mar 2024 14:00:00 GMT"
                },
                {
                    "title": "",
                    "url": "https://news.example.net/untitled",
                    "content": "More."
                },
                {
                    "title": "No link",
                    "url": ""
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        TavilySearchClient::web(&config(&server), Duration::from_secs(5)).expect("client");
    let articles = client
        .fetch("open source", Category::General, 10)
        .await
        .expect("fetch failed");

    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title, "Open source wins");
    assert_eq!(articles[0].source, "example.org");
    assert!(articles[0].published_at.is_some());
    assert_eq!(articles[0].category, Category::General);
    assert_eq!(articles[1].title, "No title");
    assert_eq!(articles[1].source, "news.example.net");
}

#[tokio::test]
async fn linkedin_results_are_professional_and_capped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({
            "query": "site:linkedin.com fintech news insights",
            "max_results": 5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "title": "Post", "url": "https://www.linkedin.com/pulse/post" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        TavilySearchClient::linkedin(&config(&server), Duration::from_secs(5)).expect("client");
    assert_eq!(client.id(), ProviderId::Linkedin);

    let articles = client
        .fetch("fintech", Category::Business, 10)
        .await
        .expect("fetch failed");

    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].category, Category::Professional);
    assert_eq!(articles[0].source, "linkedin.com");
}

#[tokio::test]
async fn error_detail_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": { "error": "Unauthorized: missing or invalid API key." } })),
        )
        .mount(&server)
        .await;

    let client =
        TavilySearchClient::medium(&config(&server), Duration::from_secs(5)).expect("client");
    let err = client
        .fetch("rust", Category::General, 5)
        .await
        .expect_err("expected failure");

    assert_eq!(err.provider, ProviderId::Medium);
    assert_eq!(
        err.reason,
        ProviderFailure::Api("Unauthorized: missing or invalid API key.".to_string())
    );
}

#[test]
fn disabled_provider_is_not_built() {
    let config = ProviderConfig {
        api_key: Some("tvly-key".to_string()),
        base_url: "https://api.tavily.com".to_string(),
        enabled: false,
    };

    let err = TavilySearchClient::web(&config, Duration::from_secs(5))
        .expect_err("expected disabled provider");

    assert_eq!(
        err.reason,
        ProviderFailure::Disabled("disabled by configuration".to_string())
    );
}

#[tokio::test]
async fn slow_search_is_reported_as_a_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(200);
    let client = TavilySearchClient::web(&config(&server), timeout).expect("Failed to build client");

    let err = client
        .fetch("anything", Category::General, 5)
        .await
        .expect_err("expected a timeout");

    assert_eq!(err.reason, ProviderFailure::Timeout(timeout));
}
