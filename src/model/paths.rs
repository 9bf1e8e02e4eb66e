//! Backend-neutral path helpers.
//!
//! Entry paths are plain strings so the same code handles local paths,
//! object-store keys and WebDAV hrefs. Both `/` and `\` count as separators.

/// Whether `c` separates path segments.
#[must_use]
pub const fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Separator used by `path` (`\` only for purely backslash paths).
#[must_use]
pub fn separator_of(path: &str) -> char {
    if !path.contains('/') && path.contains('\\') {
        '\\'
    } else {
        '/'
    }
}

/// Strip trailing separators, keeping a lone root separator.
#[must_use]
pub fn trim_trailing(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() && !path.is_empty() {
        &path[..1]
    } else {
        trimmed
    }
}

/// Last segment of `path`.
#[must_use]
pub fn file_name(path: &str) -> &str {
    let trimmed = trim_trailing(path);
    trimmed.rsplit(is_separator).next().unwrap_or(trimmed)
}

/// Parent directory of `path`, if it has one.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = trim_trailing(path);
    let idx = trimmed.rfind(is_separator)?;
    if idx == 0 {
        Some(&trimmed[..1])
    } else {
        Some(&trimmed[..idx])
    }
}

/// Join `name` onto `dir` using the separator `dir` already uses.
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    if dir.ends_with(is_separator) {
        format!("{dir}{name}")
    } else {
        format!("{dir}{}{name}", separator_of(dir))
    }
}

/// Whether `path` lies strictly below `dir`.
#[must_use]
pub fn is_descendant(path: &str, dir: &str) -> bool {
    let dir = trim_trailing(dir);
    let path = trim_trailing(path);
    if dir.is_empty() {
        return !path.is_empty();
    }
    path.strip_prefix(dir).is_some_and(|rest| {
        !rest.is_empty() && (rest.starts_with(is_separator) || dir.ends_with(is_separator))
    })
}

/// Whether `path` equals `dir` or lies below it.
#[must_use]
pub fn is_same_or_descendant(path: &str, dir: &str) -> bool {
    trim_trailing(path) == trim_trailing(dir) || is_descendant(path, dir)
}

/// Move `path` from under `old` to under `new`.
///
/// Returns `None` when `path` is neither `old` nor below it.
#[must_use]
pub fn rebase(path: &str, old: &str, new: &str) -> Option<String> {
    let old = trim_trailing(old);
    if trim_trailing(path) == old {
        return Some(new.to_string());
    }
    if !is_descendant(path, old) {
        return None;
    }
    let rest = path[old.len()..].trim_start_matches(is_separator);
    Some(join(trim_trailing(new), rest))
}

/// Non-empty segments of `path`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(is_separator).filter(|s| !s.is_empty())
}
