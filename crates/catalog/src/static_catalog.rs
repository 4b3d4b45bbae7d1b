//! A keyword-scoring in-memory catalog.
//!
//! The production catalog sits behind a vector store; this backend serves
//! tests and offline runs through the same [`BookCatalog`] seam. Matching
//! is plain lowercase keyword overlap, scored per filter hit.

use async_trait::async_trait;
use shelftalk_core::error::CatalogError;
use shelftalk_core::{BookCatalog, BookQuery, BookRecord, BookSummary};

pub struct StaticCatalog {
    books: Vec<BookRecord>,
}

impl StaticCatalog {
    pub fn new(books: Vec<BookRecord>) -> Self {
        Self { books }
    }

    /// A small built-in library for tests and demos.
    pub fn sample() -> Self {
        fn book(
            title: &str,
            author: &str,
            year: &str,
            genres: &[&str],
            themes: &[&str],
            short: &str,
        ) -> BookRecord {
            BookRecord {
                title: title.into(),
                author: author.into(),
                year: Some(year.into()),
                genres: genres.iter().map(|s| s.to_string()).collect(),
                themes: themes.iter().map(|s| s.to_string()).collect(),
                short_summary: Some(short.into()),
                full_summary: Some(format!("{short} A longer retelling with more detail.")),
            }
        }

        Self::new(vec![
            book(
                "The Hobbit",
                "J.R.R. Tolkien",
                "1937",
                &["fantasy", "adventure"],
                &["quest", "courage"],
                "Bilbo Baggins joins thirteen dwarves to reclaim a dragon-guarded treasure.",
            ),
            book(
                "A Wizard of Earthsea",
                "Ursula K. Le Guin",
                "1968",
                &["fantasy"],
                &["coming of age", "balance"],
                "A young mage's pride unleashes a shadow he must learn to name.",
            ),
            book(
                "Dune",
                "Frank Herbert",
                "1965",
                &["science fiction"],
                &["politics", "ecology"],
                "A noble family's fall entangles a desert planet's messianic prophecy.",
            ),
            book(
                "The Left Hand of Darkness",
                "Ursula K. Le Guin",
                "1969",
                &["science fiction"],
                &["gender", "diplomacy"],
                "An envoy navigates an icebound world whose people have no fixed sex.",
            ),
            book(
                "Pride and Prejudice",
                "Jane Austen",
                "1813",
                &["romance", "classic"],
                &["class", "marriage"],
                "Elizabeth Bennet spars with the proud Mr. Darcy across drawing rooms.",
            ),
            book(
                "The Name of the Wind",
                "Patrick Rothfuss",
                "2007",
                &["fantasy"],
                &["music", "legend"],
                "An innkeeper recounts how he became the most notorious wizard alive.",
            ),
            book(
                "Murder on the Orient Express",
                "Agatha Christie",
                "1934",
                &["mystery", "crime"],
                &["justice"],
                "Hercule Poirot untangles a killing aboard a snowbound train.",
            ),
            book(
                "The Martian",
                "Andy Weir",
                "2011",
                &["science fiction"],
                &["survival", "science"],
                "A stranded astronaut engineers his way through a Martian winter.",
            ),
        ])
    }

    fn score(book: &BookRecord, query: &BookQuery) -> usize {
        let mut score = 0;

        for genre in &query.genres {
            let needle = genre.to_lowercase();
            if book.genres.iter().any(|g| g.to_lowercase().contains(&needle)) {
                score += 2;
            }
        }
        for theme in &query.themes {
            let needle = theme.to_lowercase();
            if book.themes.iter().any(|t| t.to_lowercase().contains(&needle)) {
                score += 2;
            }
        }
        for author in &query.authors {
            let needle = author.to_lowercase();
            if book.author.to_lowercase().contains(&needle) {
                score += 3;
            }
        }
        if let Some(content) = &query.content {
            let haystack = format!(
                "{} {} {}",
                book.title,
                book.short_summary.as_deref().unwrap_or(""),
                book.full_summary.as_deref().unwrap_or("")
            )
            .to_lowercase();
            for word in content.to_lowercase().split_whitespace() {
                if word.len() > 3 && haystack.contains(word) {
                    score += 1;
                }
            }
        }

        score
    }

    fn has_filters(query: &BookQuery) -> bool {
        !query.genres.is_empty()
            || !query.themes.is_empty()
            || !query.authors.is_empty()
            || query.content.is_some()
    }
}

#[async_trait]
impl BookCatalog for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    async fn recommend(&self, query: &BookQuery) -> Result<Vec<BookRecord>, CatalogError> {
        if query.random || !Self::has_filters(query) {
            return Ok(self.books.iter().take(query.limit).cloned().collect());
        }

        let mut scored: Vec<(usize, &BookRecord)> = self
            .books
            .iter()
            .map(|b| (Self::score(b, query), b))
            .filter(|(s, _)| *s > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.title.cmp(&b.1.title)));

        Ok(scored
            .into_iter()
            .take(query.limit)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn get_summaries(&self, titles: &[String]) -> Result<Vec<BookSummary>, CatalogError> {
        let mut out = Vec::new();
        for title in titles {
            let needle = title.to_lowercase();
            let exact = self
                .books
                .iter()
                .find(|b| b.title.to_lowercase() == needle);
            let fuzzy = || {
                self.books.iter().find(|b| {
                    let t = b.title.to_lowercase();
                    t.contains(&needle) || needle.contains(&t)
                })
            };
            if let Some(book) = exact.or_else(fuzzy) {
                out.push(BookSummary {
                    title: book.title.clone(),
                    short_summary: book.short_summary.clone(),
                    full_summary: book.full_summary.clone(),
                    genres: book.genres.clone(),
                    themes: book.themes.clone(),
                });
            }
        }
        Ok(out)
    }
}
