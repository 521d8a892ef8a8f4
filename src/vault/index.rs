use crate::error::ArchiveError;
use crate::logging::Logger;
use crate::vault::store::{self, KeyValueStore};
use crate::vault::warn::{self, WarnEvent};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Every local materialization of one item, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(default, deserialize_with = "store::null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "store::null_as_default")]
    pub files: Vec<PathBuf>,
}

/// Cross-list item index for one archive root.
///
/// Recorded paths are never validated here; staleness is discovered by the
/// duplication step when a path is actually used.
#[derive(Debug, Clone)]
pub struct GlobalIndex {
    path: PathBuf,
    entries: BTreeMap<String, ItemRecord>,
}

impl GlobalIndex {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let entries = store::read_document(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Load the index, starting empty when the document is unreadable. The
    /// unreadable file is moved aside and a structured warning is emitted.
    pub fn load_or_recover(path: &Path, logger: &Logger) -> Result<Self> {
        match Self::load(path) {
            Ok(index) => Ok(index),
            Err(err @ ArchiveError::StoreCorruption { .. }) => {
                let moved = store::quarantine(path)?;
                warn::emit(
                    logger,
                    WarnEvent {
                        code: err.code().as_str(),
                        stage: "load",
                        action: "global-index-reset",
                        list: "all",
                        item: "all",
                        retry: "none",
                        reason: &format!("moved-to {}", moved.display()),
                        err: &err.to_string(),
                    },
                );
                Ok(Self::empty(path))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    /// First registered path for the item; first-registered wins.
    pub fn candidate_file(&self, item_id: &str) -> Option<&Path> {
        self.entries
            .get(item_id)
            .and_then(|record| record.files.first())
            .map(PathBuf::as_path)
    }

    pub fn files(&self, item_id: &str) -> &[PathBuf] {
        self.entries
            .get(item_id)
            .map(|record| record.files.as_slice())
            .unwrap_or_default()
    }

    /// Register a local copy. Returns `false` when the path was already on
    /// record for this item.
    pub fn record_new_file(&mut self, item_id: &str, title: &str, path: &Path) -> bool {
        match self.entries.get_mut(item_id) {
            Some(record) => {
                if record.files.iter().any(|known| known == path) {
                    return false;
                }
                record.files.push(path.to_path_buf());
                true
            }
            None => {
                self.entries.insert(
                    item_id.to_string(),
                    ItemRecord {
                        title: title.to_string(),
                        files: vec![path.to_path_buf()],
                    },
                );
                true
            }
        }
    }
}

impl KeyValueStore for GlobalIndex {
    type Value = ItemRecord;

    fn get(&self, key: &str) -> Option<&ItemRecord> {
        self.entries.get(key)
    }

    fn put(&mut self, key: &str, value: ItemRecord) {
        self.entries.insert(key.to_string(), value);
    }

    fn persist(&self) -> Result<()> {
        store::write_document(&self.path, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn record_new_file_creates_then_appends_without_duplicates() {
        let mut index = GlobalIndex::empty("/tmp/unused.json");
        assert!(!index.has("x"));

        assert!(index.record_new_file("x", "Video X", Path::new("/a/X.mp4")));
        assert!(index.record_new_file("x", "Video X", Path::new("/b/X.mp4")));
        assert!(!index.record_new_file("x", "Video X", Path::new("/a/X.mp4")));

        assert!(index.has("x"));
        assert_eq!(
            index.files("x"),
            &[PathBuf::from("/a/X.mp4"), PathBuf::from("/b/X.mp4")]
        );
        assert_eq!(index.candidate_file("x"), Some(Path::new("/a/X.mp4")));
        assert_eq!(index.candidate_file("missing"), None);
    }

    #[test]
    fn persist_uses_the_shared_document_format() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("global_video_index.json");
        let mut index = GlobalIndex::empty(&path);
        index.record_new_file("abc", "Title", Path::new("/v/Title.mp4"));
        index.persist().expect("persist");

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw["abc"]["title"], "Title");
        assert_eq!(raw["abc"]["files"][0], "/v/Title.mp4");

        let reloaded = GlobalIndex::load(&path).expect("load");
        assert_eq!(reloaded.get("abc"), index.get("abc"));
    }

    #[test]
    fn stale_paths_survive_load() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("global_video_index.json");
        fs::write(
            &path,
            r#"{"gone": {"title": "Gone", "files": ["/nowhere/Gone.mp4"]}}"#,
        )
        .expect("write");

        let index = GlobalIndex::load(&path).expect("load");
        assert_eq!(index.candidate_file("gone"), Some(Path::new("/nowhere/Gone.mp4")));
    }

    #[test]
    fn corrupt_index_recovers_empty_and_keeps_old_bytes() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("global_video_index.json");
        fs::write(&path, "[1, 2").expect("write");

        assert!(matches!(
            GlobalIndex::load(&path),
            Err(ArchiveError::StoreCorruption { .. })
        ));

        let index = GlobalIndex::load_or_recover(&path, &Logger::stderr_only()).expect("recover");
        assert!(index.is_empty());
        let quarantined = fs::read_dir(tmp.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(quarantined, 1);
    }

    #[test]
    fn legacy_null_titles_load_without_losing_entries() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("global_video_index.json");
        fs::write(
            &path,
            r#"{"a": {"title": "Kept", "files": ["/v/A.mp4"]},
                "b": {"title": null, "files": ["/v/B.mp4"]}}"#,
        )
        .expect("write");

        let index = GlobalIndex::load_or_recover(&path, &Logger::stderr_only()).expect("load");
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("b").map(|r| r.title.as_str()), Some(""));
        assert_eq!(index.candidate_file("b"), Some(Path::new("/v/B.mp4")));
        assert!(path.exists());
    }

    #[test]
    fn unreadable_index_is_an_error_not_a_reset() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("global_video_index.json");
        fs::create_dir_all(&path).expect("mkdir");

        let err = GlobalIndex::load_or_recover(&path, &Logger::stderr_only())
            .expect_err("unreadable");
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::StoreUnreadable { .. })
        ));
        assert!(path.is_dir());
        let quarantined = fs::read_dir(tmp.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(quarantined, 0);
    }
}
