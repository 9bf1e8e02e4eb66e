//! Search query value and its criteria enums.

use serde::{Deserialize, Serialize};

/// Which entries a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBoxing {
    /// The whole active location.
    #[default]
    Location,
    /// Descendants of the current directory.
    Folder,
    /// Every configured location.
    Global,
}

/// How the text query is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Case-insensitive, every word present in any order.
    #[default]
    Fuzzy,
    /// Case-insensitive substring.
    Semistrict,
    /// Case-sensitive substring.
    Strict,
}

/// File size ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SizeBucket {
    Empty,
    /// Under 10 KB.
    Tiny,
    /// Under 100 KB.
    VerySmall,
    /// Under 1 MB.
    Small,
    /// Under 50 MB.
    Medium,
    /// Under 1 GB.
    Large,
    /// 1 GB and more.
    Huge,
}

/// Last-modified ranges relative to the evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateBucket {
    Today,
    Yesterday,
    PastSevenDays,
    PastThirtyDays,
    PastSixMonths,
    PastYear,
    MoreThanYear,
}

/// Extension presets for the file type criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTypeGroup {
    Images,
    Documents,
    Notes,
    Audio,
    Video,
    Archives,
    Bookmarks,
    Ebooks,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jif", "jfif", "png", "gif", "svg", "tif", "tiff", "ico", "webp", "avif",
    "heic", "heif", "bmp", "psd", "raw", "arw", "cr2", "nef", "dng",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "pages", "numbers",
    "key", "rtf", "csv",
];

const NOTE_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "txt", "html", "htm", "org"];

const AUDIO_EXTENSIONS: &[&str] = &[
    "ogg", "mp3", "wav", "wave", "flac", "aac", "m4a", "opus", "wma", "aiff",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "ogv", "mp4", "webm", "m4v", "mkv", "avi", "mov", "wmv", "flv", "mpg", "mpeg", "3gp",
];

const ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "rar", "gz", "tgz", "tar", "7z", "bz2", "xz", "zst", "iso", "dmg",
];

const BOOKMARK_EXTENSIONS: &[&str] = &["url", "lnk", "sym", "desktop", "website", "webloc"];

const EBOOK_EXTENSIONS: &[&str] = &["epub", "mobi", "azw", "azw3", "fb2", "djvu", "cbr", "cbz"];

impl FileTypeGroup {
    /// Lowercase extensions of the group.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Images => IMAGE_EXTENSIONS,
            Self::Documents => DOCUMENT_EXTENSIONS,
            Self::Notes => NOTE_EXTENSIONS,
            Self::Audio => AUDIO_EXTENSIONS,
            Self::Video => VIDEO_EXTENSIONS,
            Self::Archives => ARCHIVE_EXTENSIONS,
            Self::Bookmarks => BOOKMARK_EXTENSIONS,
            Self::Ebooks => EBOOK_EXTENSIONS,
        }
    }

    /// Look up a group by its lowercase name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "images" | "pictures" => Some(Self::Images),
            "documents" => Some(Self::Documents),
            "notes" => Some(Self::Notes),
            "audio" => Some(Self::Audio),
            "video" | "videos" => Some(Self::Video),
            "archives" => Some(Self::Archives),
            "bookmarks" => Some(Self::Bookmarks),
            "ebooks" => Some(Self::Ebooks),
            _ => None,
        }
    }
}

/// Structured multi-criteria search.
///
/// Built once per search and never mutated while it runs. Serializes as
/// camelCase JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub text_query: String,
    /// Every tag must be present.
    pub tags_and: Vec<String>,
    /// At least one tag must be present.
    pub tags_or: Vec<String>,
    /// No tag may be present.
    pub tags_not: Vec<String>,
    pub search_boxing: SearchBoxing,
    pub search_type: SearchType,
    /// Lowercase extensions; non-empty restricts results to files.
    pub file_types: Vec<String>,
    pub last_modified: Option<DateBucket>,
    pub file_size: Option<SizeBucket>,
    /// Inclusive lower bound on `last_modified`, epoch milliseconds.
    pub time_range_from: Option<i64>,
    /// Inclusive upper bound on `last_modified`, epoch milliseconds.
    pub time_range_to: Option<i64>,
    /// Rebuild the index even if it is fresh.
    pub force_indexing: bool,
    /// Result cap, 0 for unlimited.
    pub max_search_results: usize,
    /// Required for folder scope.
    pub current_directory: Option<String>,
}

impl SearchQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>, search_type: SearchType) -> Self {
        self.text_query = text.into();
        self.search_type = search_type;
        self
    }

    #[must_use]
    pub fn with_tags_and<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_and = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_tags_or<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_or = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_tags_not<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_not = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_boxing(mut self, boxing: SearchBoxing) -> Self {
        self.search_boxing = boxing;
        self
    }

    /// Restrict to the extensions of `group`.
    #[must_use]
    pub fn with_file_types(mut self, group: FileTypeGroup) -> Self {
        self.file_types = group.extensions().iter().map(|e| (*e).to_string()).collect();
        self
    }

    #[must_use]
    pub const fn with_file_size(mut self, bucket: SizeBucket) -> Self {
        self.file_size = Some(bucket);
        self
    }

    #[must_use]
    pub const fn with_last_modified(mut self, bucket: DateBucket) -> Self {
        self.last_modified = Some(bucket);
        self
    }

    #[must_use]
    pub const fn with_max_results(mut self, max: usize) -> Self {
        self.max_search_results = max;
        self
    }

    #[must_use]
    pub const fn forced(mut self) -> Self {
        self.force_indexing = true;
        self
    }

    #[must_use]
    pub fn in_directory(mut self, dir: impl Into<String>) -> Self {
        self.search_boxing = SearchBoxing::Folder;
        self.current_directory = Some(dir.into());
        self
    }

    /// Whether any criterion restricts the results.
    ///
    /// A query without one is degenerate: the caller leaves search mode
    /// instead of evaluating it.
    #[must_use]
    pub fn has_search_filters(&self) -> bool {
        !self.text_query.trim().is_empty()
            || !self.tags_and.is_empty()
            || !self.tags_or.is_empty()
            || !self.tags_not.is_empty()
            || !self.file_types.is_empty()
            || self.last_modified.is_some()
            || self.file_size.is_some()
            || self.time_range_from.is_some()
            || self.time_range_to.is_some()
    }
}
