//! In-memory index of the active location.

use std::collections::{HashMap, HashSet};

use crate::model::{now_millis, paths, Entry, Tag};

/// Explicit field updates for one entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub tags: Option<Vec<Tag>>,
    pub description: Option<Option<String>>,
    pub size: Option<u64>,
    pub last_modified: Option<i64>,
    pub thumbnail_path: Option<Option<String>>,
    pub text_content: Option<Option<String>>,
}

impl EntryPatch {
    #[must_use]
    pub fn tags(tags: Vec<Tag>) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn last_modified(millis: i64) -> Self {
        Self {
            last_modified: Some(millis),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    fn apply(self, entry: &mut Entry) {
        if let Some(tags) = self.tags {
            entry.tags = tags;
        }
        if let Some(description) = self.description {
            entry.description = description;
        }
        if let Some(size) = self.size {
            entry.size = size;
        }
        if let Some(last_modified) = self.last_modified {
            entry.last_modified = last_modified;
        }
        if let Some(thumbnail_path) = self.thumbnail_path {
            entry.thumbnail_path = thumbnail_path;
        }
        if let Some(text_content) = self.text_content {
            entry.text_content = text_content;
        }
    }
}

/// Ordered entries of one location plus the time they were loaded.
///
/// Paths are looked up through a position map; order is insertion order.
#[derive(Debug, Default)]
pub struct IndexStore {
    location_id: Option<String>,
    entries: Vec<Entry>,
    positions: HashMap<String, usize>,
    loaded_on: Option<i64>,
}

impl IndexStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn get(&self) -> &[Entry] {
        &self.entries
    }

    /// Replace the entries, stamping `loaded_on` iff `entries` is non-empty.
    pub fn set(&mut self, entries: Vec<Entry>) {
        self.loaded_on = (!entries.is_empty()).then(now_millis);
        self.entries = entries;
        self.reindex_from(0);
    }

    /// Replace the entries and bind the store to `location_id`.
    pub fn load(&mut self, location_id: impl Into<String>, entries: Vec<Entry>) {
        self.location_id = Some(location_id.into());
        self.set(entries);
    }

    /// Epoch milliseconds of the last non-empty `set`.
    #[must_use]
    pub const fn loaded_on(&self) -> Option<i64> {
        self.loaded_on
    }

    /// Location the entries belong to.
    #[must_use]
    pub fn location_id(&self) -> Option<&str> {
        self.location_id.as_deref()
    }

    /// Drop all entries and the location binding.
    pub fn clear(&mut self) {
        self.location_id = None;
        self.entries.clear();
        self.positions.clear();
        self.loaded_on = None;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Entry> {
        self.positions.get(path).map(|&pos| &self.entries[pos])
    }

    /// Whether the store holds a usable index of `location_id` no older
    /// than `max_age_ms` at `now`.
    #[must_use]
    pub fn is_fresh(&self, location_id: &str, max_age_ms: u64, now: i64) -> bool {
        if self.location_id.as_deref() != Some(location_id) {
            return false;
        }
        self.loaded_on.is_some_and(|loaded| {
            let age = now.saturating_sub(loaded);
            age <= i64::try_from(max_age_ms).unwrap_or(i64::MAX)
        })
    }

    /// Append `entry` unless its path is already present.
    ///
    /// Returns `true` if the entry was inserted.
    pub fn upsert(&mut self, entry: Entry) -> bool {
        if self.positions.contains_key(&entry.path) {
            return false;
        }
        self.positions.insert(entry.path.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    /// Remove the entry at `path`; absent paths are a no-op.
    pub fn remove_by_path(&mut self, path: &str) -> Option<Entry> {
        let pos = self.positions.remove(path)?;
        let removed = self.entries.remove(pos);
        self.reindex_from(pos);
        Some(removed)
    }

    /// Remove `dir` and every entry below it.
    pub fn remove_subtree(&mut self, dir: &str) -> Vec<Entry> {
        let (removed, kept): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| paths::is_same_or_descendant(&e.path, dir));
        self.entries = kept;
        if !removed.is_empty() {
            self.reindex_from(0);
        }
        removed
    }

    /// Apply `patch` to the entry at `path`.
    ///
    /// Returns `false` if no entry has this path.
    pub fn patch_by_path(&mut self, path: &str, patch: EntryPatch) -> bool {
        let Some(&pos) = self.positions.get(path) else {
            return false;
        };
        patch.apply(&mut self.entries[pos]);
        true
    }

    /// Move the entry at `old` (and its descendants) to `new`.
    ///
    /// Entries already at the target are replaced. Returns the number of
    /// moved entries.
    pub fn rename_path(&mut self, old: &str, new: &str) -> usize {
        let moving: HashSet<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| paths::is_same_or_descendant(&e.path, old))
            .map(|(pos, _)| pos)
            .collect();
        if moving.is_empty() {
            return 0;
        }

        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .enumerate()
            .filter_map(|(pos, mut entry)| {
                if moving.contains(&pos) {
                    if let Some(target) = paths::rebase(&entry.path, old, new) {
                        entry.retarget(target);
                    }
                    Some(entry)
                } else if paths::is_same_or_descendant(&entry.path, new) {
                    None
                } else {
                    Some(entry)
                }
            })
            .collect();
        self.reindex_from(0);
        moving.len()
    }

    /// Recompute positions of the entries at `start` and after.
    fn reindex_from(&mut self, start: usize) {
        self.positions.retain(|_, pos| *pos < start);
        for (pos, entry) in self.entries.iter().enumerate().skip(start) {
            // First occurrence wins for duplicate paths.
            self.positions.entry(entry.path.clone()).or_insert(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> Entry {
        Entry::new(path, !path.ends_with("dir"))
    }

    fn paths_of(store: &IndexStore) -> Vec<&str> {
        store.get().iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_set_preserves_order_and_stamps() {
        let mut store = IndexStore::new();
        store.set(vec![entry("/b.txt"), entry("/a.txt")]);
        assert_eq!(paths_of(&store), vec!["/b.txt", "/a.txt"]);
        assert!(store.loaded_on().is_some());

        store.set(Vec::new());
        assert!(store.get().is_empty());
        assert!(store.loaded_on().is_none());
    }

    #[test]
    fn test_upsert_never_merges() {
        let mut store = IndexStore::new();
        assert!(store.upsert(entry("/a.txt").with_size(1)));
        assert!(!store.upsert(entry("/a.txt").with_size(2)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.find("/a.txt").unwrap().size, 1);
    }

    #[test]
    fn test_remove_by_path() {
        let mut store = IndexStore::new();
        store.set(vec![entry("/a.txt"), entry("/b.txt"), entry("/c.txt")]);

        assert!(store.remove_by_path("/missing").is_none());
        assert_eq!(store.len(), 3);

        assert!(store.remove_by_path("/a.txt").is_some());
        assert_eq!(paths_of(&store), vec!["/b.txt", "/c.txt"]);
        assert_eq!(store.find("/c.txt").unwrap().path, "/c.txt");
        assert!(store.remove_by_path("/c.txt").is_some());
        assert_eq!(paths_of(&store), vec!["/b.txt"]);
    }

    #[test]
    fn test_remove_subtree() {
        let mut store = IndexStore::new();
        store.set(vec![
            entry("/dir"),
            entry("/dir/a.txt"),
            entry("/dirty.txt"),
            entry("/dir/sub/b.txt"),
        ]);
        let removed = store.remove_subtree("/dir");
        assert_eq!(removed.len(), 3);
        assert_eq!(paths_of(&store), vec!["/dirty.txt"]);
        assert!(store.find("/dirty.txt").is_some());
    }

    #[test]
    fn test_patch_by_path() {
        let mut store = IndexStore::new();
        store.set(vec![entry("/a.txt")]);

        let patch = EntryPatch::tags(vec![Tag::sidecar("work")])
            .with_description(Some("notes".to_string()))
            .with_size(9);
        assert!(store.patch_by_path("/a.txt", patch));
        assert!(!store.patch_by_path("/b.txt", EntryPatch::last_modified(1)));

        let patched = store.find("/a.txt").unwrap();
        assert!(patched.has_tag("work"));
        assert_eq!(patched.description.as_deref(), Some("notes"));
        assert_eq!(patched.size, 9);
    }

    #[test]
    fn test_rename_directory_moves_descendants() {
        let mut store = IndexStore::new();
        store.set(vec![
            entry("/old_dir"),
            entry("/old_dir/photo[sunset].jpg"),
            entry("/other.txt"),
        ]);
        store.patch_by_path(
            "/old_dir/photo[sunset].jpg",
            EntryPatch::tags(vec![Tag::sidecar("keep"), Tag::plain("sunset")]),
        );

        assert_eq!(store.rename_path("/old_dir", "/new_dir"), 2);
        assert_eq!(
            paths_of(&store),
            vec!["/new_dir", "/new_dir/photo[sunset].jpg", "/other.txt"]
        );
        let moved = store.find("/new_dir/photo[sunset].jpg").unwrap();
        assert!(moved.has_tag("keep"));
        assert!(moved.has_tag("sunset"));
        assert_eq!(store.find("/new_dir").unwrap().name, "new_dir");
    }

    #[test]
    fn test_rename_file_rederives_name_tags() {
        let mut store = IndexStore::new();
        store.set(vec![entry("/a[red].txt"), entry("/b[blue].md")]);

        assert_eq!(store.rename_path("/a[red].txt", "/b[blue].md"), 1);
        assert_eq!(paths_of(&store), vec!["/b[blue].md"]);
        let renamed = store.find("/b[blue].md").unwrap();
        assert_eq!(renamed.extension, "md");
        assert!(renamed.has_tag("blue"));
        assert!(!renamed.has_tag("red"));
        assert_eq!(store.rename_path("/missing", "/x"), 0);
    }

    #[test]
    fn test_is_fresh() {
        let mut store = IndexStore::new();
        assert!(!store.is_fresh("loc", 1_000, 0));

        store.load("loc", vec![entry("/a.txt")]);
        let loaded = store.loaded_on().unwrap();

        assert!(store.is_fresh("loc", 1_000, loaded + 1_000));
        assert!(!store.is_fresh("loc", 1_000, loaded + 1_001));
        assert!(!store.is_fresh("other", 1_000, loaded));
        assert!(store.is_fresh("loc", 0, loaded));
        assert!(!store.is_fresh("loc", 0, loaded + 1));

        store.clear();
        assert!(store.location_id().is_none());
        assert!(!store.is_fresh("loc", u64::MAX, loaded));
    }
}
