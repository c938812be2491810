use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;
use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::article::{AggregatedResponse, Category};
use crate::classifier::classify;
use crate::error::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum NewsSearchToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Clone)]
pub struct NewsSearchTool {
    aggregator: Arc<Aggregator>,
}

#[derive(Deserialize, Debug)]
pub struct NewsSearchArgs {
    /// Topic or keywords to search for.
    pub query: String,
    /// Optional category forcing provider selection.
    #[serde(default)]
    pub category: Option<String>,
}

impl Tool for NewsSearchTool {
    const NAME: &'static str = "search_news";

    type Error = NewsSearchToolError;
    type Args = NewsSearchArgs;
    type Output = AggregatedResponse;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search news across news APIs, web search, LinkedIn and Medium. Returns articles grouped by source section with titles, summaries, sources, links and publication dates."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The topic or keywords to search for."
                    },
                    "category": {
                        "type": "string",
                        "enum": ["general", "technology", "business"],
                        "description": "Optional category. When omitted it is inferred from the query."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let category = match args.category.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(category) => category.parse::<Category>()?,
            None => classify(&args.query),
        };
        log::info!("search_news '{}' as {}", args.query, category);
        Ok(self
            .aggregator
            .aggregate_category(&args.query, category)
            .await?)
    }
}

impl NewsSearchTool {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}
