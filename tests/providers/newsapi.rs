use newsroom::article::Category;
use newsroom::error::ProviderFailure;
use newsroom::providers::newsapi::NewsApiClient;
use newsroom::providers::{NewsProvider, ProviderConfig, ProviderId};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        api_key: Some("news-key".to_string()),
        base_url: server.uri(),
        enabled: true,
    }
}

#[tokio::test]
async fn normalizes_articles_and_drops_removed_ones() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .and(header("X-Api-Key", "news-key"))
        .and(query_param("q", "quantum computing"))
        .and(query_param("language", "en"))
        .and(query_param("sortBy", "publishedAt"))
        .and(query_param("pageSize", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {
                    "source": { "id": null, "name": "Wired" },
                    "title": "Qubits at scale",
                    "description": "A new chip.",
                    "url": "https://wired.com/qubits",
                    "publishedAt": "2024-03-05T14:00:00Z"
                },
                {
                    "source": { "id": null, "name": "[Removed]" },
                    "title": "[Removed]",
                    "description": null,
                    "url": "https://removed.com",
                    "publishedAt": "1970-01-01T00:00:00Z"
                },
                {
                    "source": null,
                    "title": "No source given",
                    "description": null,
                    "url": "https://example.com/story",
                    "publishedAt": "not a date"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = NewsApiClient::general(&config(&server), Duration::from_secs(5))
        .expect("Failed to create client");
    let articles = client
        .fetch("quantum computing", Category::Technology, 10)
        .await
        .expect("fetch failed");

    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title, "Qubits at scale");
    assert_eq!(articles[0].source, "Wired");
    assert_eq!(articles[0].summary, "A new chip.");
    assert_eq!(articles[0].category, Category::Technology);
    assert!(articles[0].published_at.is_some());
    assert_eq!(articles[1].source, "Unknown");
    assert!(articles[1].published_at.is_none());
}

#[tokio::test]
async fn tech_client_restricts_domains() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .and(query_param(
            "domains",
            "techcrunch.com,arstechnica.com,theverge.com,wired.com,engadget.com,venturebeat.com",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "ok", "articles": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = NewsApiClient::technology(&config(&server), Duration::from_secs(5))
        .expect("Failed to create client");
    assert_eq!(client.id(), ProviderId::TechNews);

    let articles = client
        .fetch("chips", Category::Technology, 5)
        .await
        .expect("fetch failed");
    assert!(articles.is_empty());
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "error",
            "code": "apiKeyInvalid",
            "message": "Your API key is invalid."
        })))
        .mount(&server)
        .await;

    let client = NewsApiClient::business(&config(&server), Duration::from_secs(5))
        .expect("Failed to create client");
    let err = client
        .fetch("earnings", Category::Business, 5)
        .await
        .expect_err("expected failure");

    assert_eq!(err.provider, ProviderId::BusinessNews);
    assert_eq!(
        err.reason,
        ProviderFailure::Api("Your API key is invalid.".to_string())
    );
}

#[tokio::test]
async fn non_json_error_keeps_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = NewsApiClient::general(&config(&server), Duration::from_secs(5))
        .expect("Failed to create client");
    let err = client
        .fetch("anything", Category::General, 5)
        .await
        .expect_err("expected failure");

    assert_eq!(
        err.reason,
        ProviderFailure::Status {
            status: 502,
            body: "bad gateway".to_string()
        }
    );
}

#[test]
fn missing_key_disables_the_provider() {
    let config = ProviderConfig {
        api_key: None,
        base_url: "https://newsapi.org".to_string(),
        enabled: true,
    };

    let err = NewsApiClient::general(&config, Duration::from_secs(5))
        .expect_err("expected disabled provider");

    assert_eq!(err.provider, ProviderId::NewsApi);
    assert_eq!(
        err.to_string(),
        "news_api disabled: NEWSROOM_NEWS_API_KEY is not set"
    );
}

#[tokio::test]
async fn slow_response_is_reported_as_a_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "ok", "articles": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(200);
    let client =
        NewsApiClient::general(&config(&server), timeout).expect("Failed to build client");

    let err = client
        .fetch("anything", Category::General, 5)
        .await
        .expect_err("expected a timeout");

    assert_eq!(err.provider, ProviderId::NewsApi);
    assert_eq!(err.reason, ProviderFailure::Timeout(timeout));
}
