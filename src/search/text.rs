//! Free-text matching against entry names and extracted text.

use super::query::SearchType;
use crate::model::Entry;

/// Pre-processed text query.
#[derive(Debug, Clone)]
pub enum TextMatcher {
    /// Empty query, matches everything.
    Any,
    Strict(String),
    Semistrict(String),
    /// Lowercase words, all required.
    Fuzzy(Vec<String>),
}

impl TextMatcher {
    #[must_use]
    pub fn new(query: &str, search_type: SearchType) -> Self {
        if query.trim().is_empty() {
            return Self::Any;
        }
        // Substring modes keep surrounding whitespace significant.
        match search_type {
            SearchType::Strict => Self::Strict(query.to_string()),
            SearchType::Semistrict => Self::Semistrict(query.to_lowercase()),
            SearchType::Fuzzy => Self::Fuzzy(
                query
                    .split_whitespace()
                    .map(str::to_lowercase)
                    .collect(),
            ),
        }
    }

    /// Whether `entry`'s name or extracted text matches.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Self::Any => true,
            _ => {
                self.matches_text(&entry.name)
                    || entry
                        .text_content
                        .as_deref()
                        .is_some_and(|text| self.matches_text(text))
            }
        }
    }

    fn matches_text(&self, haystack: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Strict(needle) => haystack.contains(needle.as_str()),
            Self::Semistrict(needle) => haystack.to_lowercase().contains(needle.as_str()),
            Self::Fuzzy(words) => {
                let haystack = haystack.to_lowercase();
                words.iter().all(|w| haystack.contains(w.as_str()))
            }
        }
    }
}
