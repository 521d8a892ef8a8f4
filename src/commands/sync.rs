use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::error::ArchiveError;
use crate::vault::sync::ItemAction;
use crate::vault::watcher;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub account: String,
    pub output_dir: Option<PathBuf>,
    pub daemon: bool,
}

pub fn run(opts: &SyncOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("sync");
    report.detail(format!("account={}", opts.account));

    if opts.account.trim().is_empty() {
        report.issue("account reference cannot be empty");
        return Ok(report);
    }

    if opts.daemon {
        report.detail("starting sync loop in daemon mode");
        watcher::run_daemon(&opts.account, opts.output_dir.as_deref())?;
        return Ok(report);
    }

    let cycle = match watcher::run_once(&opts.account, opts.output_dir.as_deref()) {
        Ok(cycle) => cycle,
        Err(err) => match err.downcast_ref::<ArchiveError>() {
            Some(known @ (ArchiveError::NoListsFound(_) | ArchiveError::Locked(_))) => {
                report.issue(format!("{}: {known}", known.code().as_str()));
                return Ok(report);
            }
            _ => return Err(err),
        },
    };

    report.detail(format!("archive_root={}", cycle.paths.archive_root.display()));
    report.detail(format!("index_entries={}", cycle.report.index_entries));
    for list in &cycle.report.lists {
        report.detail(format!(
            "list={} title={} skipped={} duplicated={} fetched={} failed={} invalid={}",
            list.list_id,
            list.title,
            list.count(ItemAction::Skipped),
            list.count(ItemAction::Duplicated),
            list.count(ItemAction::Fetched),
            list.count(ItemAction::Failed),
            list.skipped_invalid
        ));
        report.detail(format!("list_dir={}", list.dir.display()));
        if let Some(html) = &list.html_path {
            report.detail(format!("index_html={}", html.display()));
        }
        for item in list.items.iter().filter(|i| i.action == ItemAction::Failed) {
            report.detail(format!(
                "failed item={} list={} title={}",
                item.id, list.list_id, item.title
            ));
        }
    }
    for failed in &cycle.report.failed_lists {
        report.detail(format!(
            "list_skipped={} title={} error={}",
            failed.list_id, failed.title, failed.error
        ));
    }

    Ok(report)
}
