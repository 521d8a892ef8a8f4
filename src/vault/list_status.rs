use crate::error::ArchiveError;
use crate::logging::Logger;
use crate::vault::paths::LIST_STATUS_FILE;
use crate::vault::source::ListDescriptor;
use crate::vault::store::{self, KeyValueStore};
use crate::vault::warn::{self, WarnEvent};
use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Downloaded,
    Failed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
        }
    }
}

/// How the local copy of an item came to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    File(PathBuf),
    CopiedFrom(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Downloaded {
        at: NaiveDateTime,
        provenance: Provenance,
    },
    Failed {
        at: NaiveDateTime,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct ListStatusRecord {
    pub title: String,
    pub url: String,
    pub outcome: Outcome,
}

impl ListStatusRecord {
    pub fn status(&self) -> ItemStatus {
        match self.outcome {
            Outcome::Downloaded { .. } => ItemStatus::Downloaded,
            Outcome::Failed { .. } => ItemStatus::Failed,
        }
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        match &self.outcome {
            Outcome::Downloaded { provenance, .. } => Some(provenance),
            Outcome::Failed { .. } => None,
        }
    }
}

/// On-disk shape: `downloaded_at`/`failed_at` follows the status and at most
/// one of `file`/`copied_from` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRecord {
    #[serde(default, deserialize_with = "store::null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "store::null_as_default")]
    url: String,
    status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    downloaded_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failed_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    copied_from: Option<PathBuf>,
}

impl TryFrom<RawRecord> for ListStatusRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let outcome = match raw.status {
            ItemStatus::Downloaded => {
                let at = raw
                    .downloaded_at
                    .ok_or_else(|| "downloaded record without downloaded_at".to_string())?;
                let provenance = match (raw.file, raw.copied_from) {
                    (Some(file), None) => Provenance::File(file),
                    (None, Some(source)) => Provenance::CopiedFrom(source),
                    (Some(_), Some(_)) => {
                        return Err("record has both file and copied_from".to_string());
                    }
                    (None, None) => {
                        return Err("downloaded record without file or copied_from".to_string());
                    }
                };
                Outcome::Downloaded { at, provenance }
            }
            ItemStatus::Failed => Outcome::Failed {
                at: raw
                    .failed_at
                    .ok_or_else(|| "failed record without failed_at".to_string())?,
            },
        };
        Ok(Self {
            title: raw.title,
            url: raw.url,
            outcome,
        })
    }
}

impl From<ListStatusRecord> for RawRecord {
    fn from(record: ListStatusRecord) -> Self {
        let mut raw = RawRecord {
            title: record.title,
            url: record.url,
            status: ItemStatus::Failed,
            downloaded_at: None,
            failed_at: None,
            file: None,
            copied_from: None,
        };
        match record.outcome {
            Outcome::Downloaded { at, provenance } => {
                raw.status = ItemStatus::Downloaded;
                raw.downloaded_at = Some(at);
                match provenance {
                    Provenance::File(path) => raw.file = Some(path),
                    Provenance::CopiedFrom(path) => raw.copied_from = Some(path),
                }
            }
            Outcome::Failed { at } => raw.failed_at = Some(at),
        }
        raw
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListStatusDocument {
    pub playlist_id: String,
    #[serde(default, deserialize_with = "store::null_as_default")]
    pub playlist_title: String,
    #[serde(default, deserialize_with = "store::null_as_default")]
    pub playlist_url: String,
    #[serde(default)]
    pub videos: BTreeMap<String, ListStatusRecord>,
}

impl ListStatusDocument {
    fn for_list(list: &ListDescriptor) -> Self {
        Self {
            playlist_id: list.id.clone(),
            playlist_title: list.title.clone(),
            playlist_url: list.url.clone(),
            videos: BTreeMap::new(),
        }
    }
}

/// Processing outcomes of one list, persisted in the list's directory.
#[derive(Debug, Clone)]
pub struct ListStatusStore {
    path: PathBuf,
    doc: ListStatusDocument,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl ListStatusStore {
    pub fn path_in(list_dir: &Path) -> PathBuf {
        list_dir.join(LIST_STATUS_FILE)
    }

    pub fn load(list_dir: &Path, list: &ListDescriptor) -> Result<Self, ArchiveError> {
        let path = Self::path_in(list_dir);
        let doc = store::read_document(&path)?.unwrap_or_else(|| ListStatusDocument::for_list(list));
        Ok(Self { path, doc })
    }

    /// Read-only load of an existing store, for reporting.
    pub fn open(list_dir: &Path) -> Result<Option<Self>, ArchiveError> {
        let path = Self::path_in(list_dir);
        Ok(store::read_document(&path)?.map(|doc| Self { path, doc }))
    }

    pub fn load_or_recover(list_dir: &Path, list: &ListDescriptor, logger: &Logger) -> Result<Self> {
        match Self::load(list_dir, list) {
            Ok(store) => Ok(store),
            Err(err @ ArchiveError::StoreCorruption { .. }) => {
                let path = Self::path_in(list_dir);
                let moved = store::quarantine(&path)?;
                warn::emit(
                    logger,
                    WarnEvent {
                        code: err.code().as_str(),
                        stage: "load",
                        action: "list-status-reset",
                        list: &list.id,
                        item: "all",
                        retry: "none",
                        reason: &format!("moved-to {}", moved.display()),
                        err: &err.to_string(),
                    },
                );
                Ok(Self {
                    path,
                    doc: ListStatusDocument::for_list(list),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &ListStatusDocument {
        &self.doc
    }

    pub fn status_of(&self, item_id: &str) -> Option<ItemStatus> {
        self.doc.videos.get(item_id).map(ListStatusRecord::status)
    }

    pub fn record_success(&mut self, item_id: &str, title: &str, url: &str, provenance: Provenance) {
        self.put(
            item_id,
            ListStatusRecord {
                title: title.to_string(),
                url: url.to_string(),
                outcome: Outcome::Downloaded {
                    at: now(),
                    provenance,
                },
            },
        );
    }

    pub fn record_failure(&mut self, item_id: &str, title: &str, url: &str) {
        self.put(
            item_id,
            ListStatusRecord {
                title: title.to_string(),
                url: url.to_string(),
                outcome: Outcome::Failed { at: now() },
            },
        );
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.doc
            .videos
            .values()
            .filter(|record| record.status() == status)
            .count()
    }
}

impl KeyValueStore for ListStatusStore {
    type Value = ListStatusRecord;

    fn get(&self, key: &str) -> Option<&ListStatusRecord> {
        self.doc.videos.get(key)
    }

    fn put(&mut self, key: &str, value: ListStatusRecord) {
        self.doc.videos.insert(key.to_string(), value);
    }

    fn persist(&self) -> Result<()> {
        store::write_document(&self.path, &self.doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn list() -> ListDescriptor {
        ListDescriptor {
            id: "PL1".to_string(),
            title: "Mix".to_string(),
            url: "https://www.youtube.com/playlist?list=PL1".to_string(),
        }
    }

    #[test]
    fn fresh_store_is_tagged_with_the_list() {
        let tmp = tempdir().expect("tempdir");
        let store = ListStatusStore::load(tmp.path(), &list()).expect("load");
        assert_eq!(store.document().playlist_id, "PL1");
        assert_eq!(store.document().playlist_title, "Mix");
        assert!(store.document().videos.is_empty());
        assert_eq!(store.status_of("x"), None);
    }

    #[test]
    fn records_serialize_with_exactly_one_provenance_field() {
        let tmp = tempdir().expect("tempdir");
        let mut store = ListStatusStore::load(tmp.path(), &list()).expect("load");
        store.record_success("a", "A", "u/a", Provenance::File(PathBuf::from("/v/A.mp4")));
        store.record_success(
            "b",
            "B",
            "u/b",
            Provenance::CopiedFrom(PathBuf::from("/w/B.mp4")),
        );
        store.record_failure("c", "C", "u/c");
        store.persist().expect("persist");

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).expect("read")).expect("json");
        let videos = &raw["videos"];
        assert_eq!(videos["a"]["status"], "downloaded");
        assert_eq!(videos["a"]["file"], "/v/A.mp4");
        assert!(videos["a"].get("copied_from").is_none());
        assert!(videos["a"].get("downloaded_at").is_some());
        assert_eq!(videos["b"]["copied_from"], "/w/B.mp4");
        assert!(videos["b"].get("file").is_none());
        assert_eq!(videos["c"]["status"], "failed");
        assert!(videos["c"].get("failed_at").is_some());
        assert!(videos["c"].get("file").is_none());
        assert!(videos["c"].get("copied_from").is_none());

        let reloaded = ListStatusStore::load(tmp.path(), &list()).expect("reload");
        assert_eq!(reloaded.document(), store.document());
        assert_eq!(reloaded.status_of("a"), Some(ItemStatus::Downloaded));
        assert_eq!(reloaded.status_of("c"), Some(ItemStatus::Failed));
        assert_eq!(reloaded.count(ItemStatus::Downloaded), 2);
    }

    #[test]
    fn reads_timestamps_with_microseconds() {
        let tmp = tempdir().expect("tempdir");
        fs::write(
            tmp.path().join(LIST_STATUS_FILE),
            r#"{
              "playlist_id": "PL1",
              "playlist_title": "Mix",
              "playlist_url": "u",
              "videos": {
                "a": {"title": "A", "url": "u/a", "status": "downloaded",
                      "downloaded_at": "2024-03-01T10:20:30.123456", "file": "/v/A.mp4"}
              }
            }"#,
        )
        .expect("write");

        let store = ListStatusStore::load(tmp.path(), &list()).expect("load");
        let record = store.get("a").expect("record");
        assert_eq!(
            record.provenance(),
            Some(&Provenance::File(PathBuf::from("/v/A.mp4")))
        );
    }

    #[test]
    fn conflicting_provenance_is_corruption() {
        let tmp = tempdir().expect("tempdir");
        fs::write(
            tmp.path().join(LIST_STATUS_FILE),
            r#"{"playlist_id": "PL1", "playlist_title": "Mix", "playlist_url": "u",
                "videos": {"a": {"title": "A", "url": "u/a", "status": "downloaded",
                "downloaded_at": "2024-03-01T10:20:30", "file": "/x", "copied_from": "/y"}}}"#,
        )
        .expect("write");

        assert!(matches!(
            ListStatusStore::load(tmp.path(), &list()),
            Err(ArchiveError::StoreCorruption { .. })
        ));
        let recovered =
            ListStatusStore::load_or_recover(tmp.path(), &list(), &Logger::stderr_only())
                .expect("recover");
        assert!(recovered.document().videos.is_empty());
    }

    #[test]
    fn legacy_null_fields_are_tolerated() {
        let tmp = tempdir().expect("tempdir");
        fs::write(
            tmp.path().join(LIST_STATUS_FILE),
            r#"{"playlist_id": "PL1", "playlist_title": null, "playlist_url": "u",
                "videos": {"a": {"title": null, "url": null, "status": "downloaded",
                "downloaded_at": "2024-03-01T10:20:30", "file": "/v/A.mp4"}}}"#,
        )
        .expect("write");

        let store = ListStatusStore::load_or_recover(tmp.path(), &list(), &Logger::stderr_only())
            .expect("load");
        assert_eq!(store.status_of("a"), Some(ItemStatus::Downloaded));
        assert_eq!(store.get("a").map(|r| r.title.as_str()), Some(""));
        assert!(store.path().exists());
    }
}
