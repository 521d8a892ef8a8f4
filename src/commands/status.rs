use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::vault::index::GlobalIndex;
use crate::vault::list_status::{ItemStatus, ListStatusStore};
use crate::vault::paths::resolve_paths;

#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    pub output_dir: Option<PathBuf>,
}

pub fn run(opts: &StatusOptions) -> Result<CommandReport> {
    let paths = resolve_paths(opts.output_dir.as_deref())?;
    let mut report = CommandReport::new("status");
    report.detail(format!("archive_root={}", paths.archive_root.display()));

    if !paths.archive_root.exists() {
        report.issue("archive root does not exist (nothing synced yet)");
        return Ok(report);
    }

    match GlobalIndex::load(&paths.index_file) {
        Ok(index) => report.detail(format!("index_entries={}", index.len())),
        Err(err) => report.issue(format!("{}: {err}", err.code().as_str())),
    }

    let mut dirs = fs::read_dir(&paths.archive_root)
        .with_context(|| format!("failed to read {}", paths.archive_root.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    dirs.sort();

    let mut lists = 0usize;
    for dir in dirs {
        let store = match ListStatusStore::open(&dir) {
            Ok(Some(store)) => store,
            Ok(None) => continue,
            Err(err) => {
                report.issue(format!("{}: {err}", err.code().as_str()));
                continue;
            }
        };
        lists += 1;
        let doc = store.document();
        report.detail(format!(
            "list={} title={} downloaded={} failed={} dir={}",
            doc.playlist_id,
            doc.playlist_title,
            store.count(ItemStatus::Downloaded),
            store.count(ItemStatus::Failed),
            dir.display()
        ));
        for (item_id, record) in &doc.videos {
            if record.status() == ItemStatus::Failed {
                report.detail(format!(
                    "failed item={} list={} title={}",
                    item_id, doc.playlist_id, record.title
                ));
            }
        }
    }
    report.detail(format!("lists={lists}"));

    Ok(report)
}
