use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Topic buckets used both to route queries and to tag articles.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Technology,
    Business,
    Professional,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Technology => "technology",
            Category::Business => "business",
            Category::Professional => "professional",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    /// Parses a query category. `professional` only tags articles and is not
    /// accepted here.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Category::General),
            "technology" | "tech" => Ok(Category::Technology),
            "business" | "finance" => Ok(Category::Business),
            other => Err(ValidationError::UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub category: Category,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub articles: Vec<ArticleRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AggregatedResponse {
    pub query: String,
    pub category: Category,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl AggregatedResponse {
    pub fn empty(query: &str, category: Category) -> Self {
        Self {
            query: query.to_string(),
            category,
            sections: Vec::new(),
            warnings: Vec::new(),
            note: None,
            generated_at: Utc::now(),
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn article_count(&self) -> usize {
        self.sections.iter().map(|s| s.articles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.article_count() == 0
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|s| s.articles.iter().map(|a| a.url.as_str()))
    }

    /// Folds another response into this one. Sections with the same name are
    /// concatenated up to `section_limit` articles and URLs already present
    /// anywhere in `self` are dropped, so repeated searches in one turn keep
    /// the same guarantees as a single one.
    pub fn absorb(&mut self, other: AggregatedResponse, section_limit: usize) {
        let mut seen: HashSet<String> = self.urls().map(str::to_string).collect();
        for section in other.sections {
            let index = match self.sections.iter().position(|s| s.name == section.name) {
                Some(index) => index,
                None => {
                    self.sections.push(Section {
                        name: section.name,
                        articles: Vec::new(),
                    });
                    self.sections.len() - 1
                }
            };
            let target = &mut self.sections[index].articles;
            for article in section.articles {
                if target.len() >= section_limit {
                    break;
                }
                if seen.insert(article.url.clone()) {
                    target.push(article);
                }
            }
        }
        self.sections.retain(|s| !s.articles.is_empty());
        for warning in other.warnings {
            if !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
        }
        if !self.is_empty() {
            self.note = None;
        } else if self.note.is_none() {
            self.note = other.note;
        }
        self.generated_at = other.generated_at.max(self.generated_at);
    }
}

/// Cuts `text` to `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    } else {
        text.to_string()
    }
}
