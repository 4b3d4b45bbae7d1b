//! BookCatalog trait — the retrieval collaborator.
//!
//! The catalog's indexing and embedding mechanics are external; the
//! pipeline only consumes this narrow query interface.

use crate::error::CatalogError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A recommendation query. All filter fields are optional — the model may
/// ask for random picks or filter by any combination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    /// Free-text content to match against summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Pick arbitrary titles instead of scoring the filters.
    #[serde(default)]
    pub random: bool,
}

fn default_limit() -> usize {
    5
}

impl BookQuery {
    /// A query with only a result cap set.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// A catalog entry returned by a recommendation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,

    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_summary: Option<String>,
}

/// A summary lookup result for one requested title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_summary: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<String>,
}

/// The retrieval collaborator.
#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// The catalog backend name (e.g., "static", "vector_store").
    fn name(&self) -> &str;

    /// Return up to `query.limit` matching books.
    async fn recommend(
        &self,
        query: &BookQuery,
    ) -> std::result::Result<Vec<BookRecord>, CatalogError>;

    /// Look up summaries for the given titles. Titles with no plausible
    /// match are simply absent from the result.
    async fn get_summaries(
        &self,
        titles: &[String],
    ) -> std::result::Result<Vec<BookSummary>, CatalogError>;
}
