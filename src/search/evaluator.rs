//! Query evaluation over an index snapshot.

use chrono::{DateTime, Local};

use super::query::{SearchBoxing, SearchQuery};
use super::text::TextMatcher;
use crate::error::SearchError;
use crate::model::{paths, Entry};
use crate::Result;

/// A query compiled for repeated matching.
#[derive(Debug, Clone)]
pub struct Criteria<'q> {
    query: &'q SearchQuery,
    text: TextMatcher,
    folder: Option<&'q str>,
    now: DateTime<Local>,
}

impl<'q> Criteria<'q> {
    /// Compile `query` against the evaluation time `now`.
    ///
    /// # Errors
    ///
    /// Returns an error for a folder-scoped query without a current
    /// directory.
    pub fn compile(query: &'q SearchQuery, now: DateTime<Local>) -> Result<Self> {
        let folder = match query.search_boxing {
            SearchBoxing::Folder => Some(
                query
                    .current_directory
                    .as_deref()
                    .map(paths::trim_trailing)
                    .ok_or(SearchError::MissingCurrentDirectory)?,
            ),
            SearchBoxing::Location | SearchBoxing::Global => None,
        };

        Ok(Self {
            query,
            text: TextMatcher::new(&query.text_query, query.search_type),
            folder,
            now,
        })
    }

    /// Whether `entry` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        let query = self.query;

        if let Some(folder) = self.folder {
            if !paths::is_descendant(&entry.path, folder) {
                return false;
            }
        }

        if !query.tags_and.iter().all(|t| entry.has_tag(t)) {
            return false;
        }
        if !query.tags_or.is_empty() && !query.tags_or.iter().any(|t| entry.has_tag(t)) {
            return false;
        }
        if query.tags_not.iter().any(|t| entry.has_tag(t)) {
            return false;
        }

        if !query.file_types.is_empty()
            && !(entry.is_file
                && query
                    .file_types
                    .iter()
                    .any(|ext| ext.eq_ignore_ascii_case(&entry.extension)))
        {
            return false;
        }

        if let Some(bucket) = query.file_size {
            if !bucket.contains(entry.size) {
                return false;
            }
        }
        if let Some(bucket) = query.last_modified {
            if !bucket.contains(entry.last_modified, self.now) {
                return false;
            }
        }
        if query.time_range_from.is_some_and(|from| entry.last_modified < from)
            || query.time_range_to.is_some_and(|to| entry.last_modified > to)
        {
            return false;
        }

        self.text.matches(entry)
    }
}

/// Evaluate `query` against `entries` using the local time.
///
/// # Errors
///
/// See [`evaluate_at`].
pub fn evaluate(entries: &[Entry], query: &SearchQuery) -> Result<Vec<Entry>> {
    evaluate_at(entries, query, Local::now())
}

/// Evaluate `query` against `entries` as of `now`.
///
/// Matches keep index order. At most `max_search_results` entries are
/// returned, all of them when it is 0.
///
/// # Errors
///
/// Returns an error for a folder-scoped query without a current directory.
pub fn evaluate_at(
    entries: &[Entry],
    query: &SearchQuery,
    now: DateTime<Local>,
) -> Result<Vec<Entry>> {
    let criteria = Criteria::compile(query, now)?;
    let limit = match query.max_search_results {
        0 => usize::MAX,
        max => max,
    };

    Ok(entries
        .iter()
        .filter(|entry| criteria.matches(entry))
        .take(limit)
        .cloned()
        .collect())
}
