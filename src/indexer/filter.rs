//! Path filtering with gitignore-style patterns.

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::IndexError;
use crate::model::paths;
use crate::Result;

/// Platform files that are never indexed.
const JUNK_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini", "._.DS_Store"];

/// Extensions whose content can be read as plain text.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "mdown", "csv", "tsv", "log", "json", "xml", "html", "htm", "yaml",
    "yml", "toml", "ini", "rtf", "tex", "org", "adoc", "rst", "url", "desktop", "website",
];

/// Path filter for indexing.
#[derive(Debug, Default)]
pub struct PathFilter {
    root: String,
    gitignore: Option<Gitignore>,
}

impl PathFilter {
    /// Filter that only drops platform junk.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Create a filter from gitignore-style patterns relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid.
    pub fn with_patterns(root: &str, patterns: &[String]) -> Result<Self> {
        let patterns: Vec<&str> = patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty() && !p.starts_with('#'))
            .collect();
        if patterns.is_empty() {
            return Ok(Self::none());
        }

        let root = paths::trim_trailing(root);
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| IndexError::Pattern(format!("{pattern}: {e}")))?;
        }
        let gitignore = builder
            .build()
            .map_err(|e| IndexError::Pattern(e.to_string()))?;

        Ok(Self {
            root: root.to_string(),
            gitignore: Some(gitignore),
        })
    }

    /// Whether `path` must be skipped (and, for a directory, not descended).
    #[must_use]
    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        if is_junk_name(paths::file_name(path)) {
            return true;
        }
        self.gitignore
            .as_ref()
            .is_some_and(|gi| gi.matched(path, is_dir).is_ignore())
    }

    /// Whether `path` is skipped itself or lies inside a skipped directory.
    ///
    /// Only directories strictly below the root are considered, so the
    /// answer matches what a walk from the root would have pruned.
    #[must_use]
    pub fn excludes(&self, path: &str, is_dir: bool) -> bool {
        if self.is_ignored(path, is_dir) {
            return true;
        }
        let Some(gitignore) = &self.gitignore else {
            return false;
        };
        let mut current = paths::parent(path);
        while let Some(dir) = current {
            if !paths::is_descendant(dir, &self.root) {
                break;
            }
            if gitignore.matched(dir, true).is_ignore() {
                return true;
            }
            current = paths::parent(dir);
        }
        false
    }
}

/// Whether `name` is a platform junk file.
#[must_use]
pub fn is_junk_name(name: &str) -> bool {
    JUNK_NAMES.contains(&name)
}

/// Whether a file qualifies for text extraction.
#[must_use]
pub fn is_text_extractable(extension: &str, size: u64, max_bytes: u64) -> bool {
    size <= max_bytes && TEXT_EXTENSIONS.contains(&extension)
}

/// First `max_chars` characters of `text`.
#[must_use]
pub fn excerpt(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_junk_always_ignored() {
        let filter = PathFilter::none();
        assert!(filter.is_ignored("/docs/.DS_Store", false));
        assert!(filter.is_ignored("/docs/sub/Thumbs.db", false));
        assert!(!filter.is_ignored("/docs/report.pdf", false));
    }

    #[test]
    fn test_patterns() {
        let patterns = vec![
            "*.tmp".to_string(),
            "node_modules/".to_string(),
            "# comment".to_string(),
            String::new(),
        ];
        let filter = PathFilter::with_patterns("/docs", &patterns).unwrap();

        assert!(filter.is_ignored("/docs/a.tmp", false));
        assert!(filter.is_ignored("/docs/web/node_modules", true));
        assert!(!filter.is_ignored("/docs/web/node_modules", false));
        assert!(!filter.is_ignored("/docs/a.txt", false));
    }

    #[test]
    fn test_excludes_descendants_of_ignored_dirs() {
        let patterns = vec!["node_modules/".to_string(), "*.tmp".to_string()];
        let filter = PathFilter::with_patterns("/docs", &patterns).unwrap();

        assert!(filter.excludes("/docs/node_modules/x.js", false));
        assert!(filter.excludes("/docs/web/node_modules/pkg", true));
        assert!(filter.excludes("/docs/a.tmp", false));
        assert!(!filter.excludes("/docs/web/index.js", false));
        assert!(!filter.excludes("/docs/notes", true));
    }

    #[test]
    fn test_excludes_without_patterns_only_drops_junk() {
        let filter = PathFilter::none();
        assert!(filter.excludes("/docs/.DS_Store", false));
        assert!(!filter.excludes("/docs/node_modules/x.js", false));
    }

    #[test]
    fn test_patterns_on_object_keys() {
        let filter = PathFilter::with_patterns("photos", &["raw/".to_string()]).unwrap();
        assert!(filter.is_ignored("photos/raw", true));
        assert!(!filter.is_ignored("photos/edited", true));
    }

    #[test]
    fn test_text_extractable() {
        assert!(is_text_extractable("md", 10, 100));
        assert!(!is_text_extractable("md", 101, 100));
        assert!(!is_text_extractable("jpg", 10, 100));
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo wörld".to_string(), 5), "héllo");
        assert_eq!(excerpt("short".to_string(), 50), "short");
    }
}
