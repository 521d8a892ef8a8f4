//! Flat-file document storage shared by the global index and the per-list
//! status stores.
//!
//! Each store is a whole JSON document: load it, mutate in memory, persist
//! the whole document again. Writes go to a temporary sibling that is
//! flushed and renamed over the previous version, so a crash leaves either
//! the old or the new document on disk.

use crate::error::ArchiveError;
use crate::vault::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Keyed record store with an explicit persist step.
pub trait KeyValueStore {
    type Value;

    fn get(&self, key: &str) -> Option<&Self::Value>;
    fn put(&mut self, key: &str, value: Self::Value);
    fn persist(&self) -> Result<()>;
}

/// Field deserializer for documents written by older tools that store
/// `null` where a string is expected.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read a JSON document. A missing file is `Ok(None)`; a file that cannot be
/// read is `StoreUnreadable`; content that does not parse is
/// `StoreCorruption`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArchiveError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ArchiveError::StoreUnreadable {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|err| ArchiveError::StoreCorruption {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
}

pub fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let data = serde_json::to_string_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to stage write in {}", parent.display()))?;
    tmp.write_all(data.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Move an unreadable document out of the way so a fresh store can take its
/// place without destroying the old bytes.
pub fn quarantine(path: &Path) -> Result<PathBuf> {
    let stamp = now_epoch_secs()?;
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".corrupt-{stamp}"));
    let target = path.with_file_name(name);
    fs::rename(path, &target).with_context(|| {
        format!(
            "failed to move {} to {}",
            path.display(),
            target.display()
        )
    })?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn missing_document_reads_as_none() {
        let tmp = tempdir().expect("tempdir");
        let got: Option<BTreeMap<String, u32>> =
            read_document(&tmp.path().join("absent.json")).expect("read");
        assert!(got.is_none());
    }

    #[test]
    fn malformed_document_is_store_corruption() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{ not json").expect("write");

        let err = read_document::<BTreeMap<String, u32>>(&path).expect_err("corrupt");
        assert!(matches!(err, ArchiveError::StoreCorruption { .. }));
    }

    #[test]
    fn io_failure_is_not_corruption() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("index.json");
        fs::create_dir_all(&path).expect("mkdir");

        let err = read_document::<BTreeMap<String, u32>>(&path).expect_err("unreadable");
        assert!(matches!(err, ArchiveError::StoreUnreadable { .. }));
        assert_eq!(err.code().as_str(), "E008_STORE_UNREADABLE");
    }

    #[test]
    fn null_fields_read_as_default() {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(default, deserialize_with = "null_as_default")]
            title: String,
        }
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("doc.json");
        fs::write(&path, r#"{"title": null}"#).expect("write");
        let doc: Doc = read_document(&path).expect("read").expect("present");
        assert_eq!(doc.title, "");

        fs::write(&path, r#"{}"#).expect("write");
        let doc: Doc = read_document(&path).expect("read").expect("present");
        assert_eq!(doc.title, "");
    }

    #[test]
    fn write_replaces_previous_version() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("nested/doc.json");
        let mut doc = BTreeMap::new();
        doc.insert("a".to_string(), 1u32);
        write_document(&path, &doc).expect("write first");
        doc.insert("b".to_string(), 2u32);
        write_document(&path, &doc).expect("write second");

        let got: BTreeMap<String, u32> = read_document(&path).expect("read").expect("present");
        assert_eq!(got, doc);
        let leftovers = fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn quarantine_keeps_the_bytes() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("index.json");
        fs::write(&path, "garbage").expect("write");

        let moved = quarantine(&path).expect("quarantine");
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(&moved).expect("read"), "garbage");
        assert!(
            moved
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("index.json.corrupt-"))
        );
    }
}
