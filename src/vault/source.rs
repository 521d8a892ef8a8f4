use anyhow::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDescriptor {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// One entry of a list as reported by the source. Entries without an id or
/// title are kept so the orchestrator can skip them visibly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDescriptor {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: String,
    pub position: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Path the source says it wrote the primary asset to, if it said.
    pub primary_hint: Option<PathBuf>,
}

/// Capability that knows how to talk to the media source.
pub trait SourceConnector {
    fn enumerate_lists(&self, account: &str) -> Result<Vec<ListDescriptor>>;
    fn enumerate_items(&self, list: &ListDescriptor) -> Result<Vec<ItemDescriptor>>;
    /// Write the item's primary asset and best-effort sidecars into
    /// `target_dir`, named after the item title.
    fn fetch_item(&self, item_url: &str, target_dir: &Path) -> Result<FetchReport>;
}
