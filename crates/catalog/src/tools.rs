//! The two retrieval tools offered to the model.
//!
//! Both serialize their result as a JSON object so the final-answer call
//! receives structured, groundable data rather than prose.

use async_trait::async_trait;
use shelftalk_core::error::ToolError;
use shelftalk_core::{BookCatalog, BookQuery, Tool, ToolOutput};
use std::sync::Arc;
use tracing::debug;

/// `get_book_recommendations` — query the catalog by genre/theme/author.
pub struct RecommendBooksTool {
    catalog: Arc<dyn BookCatalog>,
}

impl RecommendBooksTool {
    pub fn new(catalog: Arc<dyn BookCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for RecommendBooksTool {
    fn name(&self) -> &str {
        "get_book_recommendations"
    }

    fn description(&self) -> &str {
        "Recommend books from the catalog. Filter by genres, themes, authors or free-text \
         content, or request random picks."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "genres": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Genres to match, e.g. [\"fantasy\"]"
                },
                "themes": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Themes to match, e.g. [\"coming of age\"]"
                },
                "authors": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Author names to match"
                },
                "content": {
                    "type": "string",
                    "description": "Free text matched against book summaries"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of books to return (default 5)",
                    "default": 5
                },
                "random": {
                    "type": "boolean",
                    "description": "Ignore filters and pick arbitrary books",
                    "default": false
                }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let query: BookQuery = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let books = self
            .catalog
            .recommend(&query)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        debug!(count = books.len(), "Catalog recommendation query");

        let output = serde_json::json!({ "recommendations": books }).to_string();
        Ok(ToolOutput {
            call_id: String::new(),
            success: true,
            output,
        })
    }
}

/// `get_book_summaries` — look up stored summaries for specific titles.
pub struct BookSummariesTool {
    catalog: Arc<dyn BookCatalog>,
}

impl BookSummariesTool {
    pub fn new(catalog: Arc<dyn BookCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for BookSummariesTool {
    fn name(&self) -> &str {
        "get_book_summaries"
    }

    fn description(&self) -> &str {
        "Get short and full summaries for specific book titles from the catalog."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "titles": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "The exact titles to look up"
                }
            },
            "required": ["titles"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let titles: Vec<String> = match arguments.get("titles") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?,
            None => return Err(ToolError::InvalidArguments("Missing 'titles' argument".into())),
        };

        let summaries = self
            .catalog
            .get_summaries(&titles)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        debug!(
            requested = titles.len(),
            found = summaries.len(),
            "Catalog summary lookup"
        );

        let output = serde_json::json!({ "summaries": summaries }).to_string();
        Ok(ToolOutput {
            call_id: String::new(),
            success: true,
            output,
        })
    }
}
