//! Book catalog tools and backends for shelftalk.
//!
//! The model never queries the catalog directly — it requests one of the
//! two tools built here, and the dispatch loop executes them against a
//! [`BookCatalog`] implementation.

pub mod static_catalog;
pub mod tools;

pub use static_catalog::StaticCatalog;
pub use tools::{BookSummariesTool, RecommendBooksTool};

use shelftalk_core::{BookCatalog, ToolRegistry};
use std::sync::Arc;

/// Build the registry holding the two catalog tools.
pub fn default_registry(catalog: Arc<dyn BookCatalog>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RecommendBooksTool::new(catalog.clone())));
    registry.register(Box::new(BookSummariesTool::new(catalog)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_offers_both_tools() {
        let registry = default_registry(Arc::new(StaticCatalog::sample()));
        let defs = registry.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["get_book_recommendations", "get_book_summaries"]);
    }
}
