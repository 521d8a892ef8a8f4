use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot enumerate {what}: {reason}")]
    DiscoveryFailure { what: String, reason: String },
    #[error("no playlists found for account {0}")]
    NoListsFound(String),
    #[error("fetch of {item_id} failed after {attempts} attempts")]
    FetchFailure { item_id: String, attempts: u32 },
    #[error("cannot duplicate {item_id} from {}: {reason}", .path.display())]
    DuplicationFailure {
        item_id: String,
        path: PathBuf,
        reason: String,
    },
    #[error("store {} is unreadable: {reason}", .path.display())]
    StoreCorruption { path: PathBuf, reason: String },
    #[error("cannot read store {}: {source}", .path.display())]
    StoreUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("partial write for {item_id}: {reason}")]
    PartialWriteFailure { item_id: String, reason: String },
    #[error("archive {} is locked by another run", .0.display())]
    Locked(PathBuf),
}

impl ArchiveError {
    pub fn code(&self) -> ArchiveErrorCode {
        match self {
            Self::Locked(_) => ArchiveErrorCode::E001Locked,
            Self::StoreCorruption { .. } => ArchiveErrorCode::E002StoreCorrupt,
            Self::DiscoveryFailure { .. } => ArchiveErrorCode::E003DiscoveryFailed,
            Self::NoListsFound(_) => ArchiveErrorCode::E004NoLists,
            Self::FetchFailure { .. } => ArchiveErrorCode::E005FetchFailed,
            Self::DuplicationFailure { .. } => ArchiveErrorCode::E006CopySourceMissing,
            Self::PartialWriteFailure { .. } => ArchiveErrorCode::E007PartialWrite,
            Self::StoreUnreadable { .. } => ArchiveErrorCode::E008StoreUnreadable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveErrorCode {
    E001Locked,
    E002StoreCorrupt,
    E003DiscoveryFailed,
    E004NoLists,
    E005FetchFailed,
    E006CopySourceMissing,
    E007PartialWrite,
    E008StoreUnreadable,
}

impl ArchiveErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Locked => "E001_LOCKED",
            Self::E002StoreCorrupt => "E002_STORE_CORRUPT",
            Self::E003DiscoveryFailed => "E003_DISCOVERY_FAILED",
            Self::E004NoLists => "E004_NO_LISTS",
            Self::E005FetchFailed => "E005_FETCH_FAILED",
            Self::E006CopySourceMissing => "E006_COPY_SOURCE_MISSING",
            Self::E007PartialWrite => "E007_PARTIAL_WRITE",
            Self::E008StoreUnreadable => "E008_STORE_UNREADABLE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_variants() {
        let err = ArchiveError::StoreCorruption {
            path: PathBuf::from("/tmp/index.json"),
            reason: "eof".to_string(),
        };
        assert_eq!(err.code().as_str(), "E002_STORE_CORRUPT");
        assert!(err.to_string().contains("/tmp/index.json"));
    }
}
