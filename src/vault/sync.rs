//! Per-list, per-item synchronization.
//!
//! Lists are processed one at a time and items strictly in list order. After
//! every item that changes state, the global index is persisted first and
//! the list's status store second. A crash between the two leaves the new
//! file registered under the list's own directory, which the next run picks
//! up as an in-place duplication.

use crate::error::ArchiveError;
use crate::logging::Logger;
use crate::vault::audit;
use crate::vault::config::VaultConfig;
use crate::vault::duplicate::duplicate;
use crate::vault::fetcher::{RetryPolicy, RetryingFetcher, Sleeper};
use crate::vault::html;
use crate::vault::index::GlobalIndex;
use crate::vault::list_status::{ItemStatus, ListStatusStore, Provenance};
use crate::vault::paths::VaultPaths;
use crate::vault::sanitize::list_dir_name;
use crate::vault::source::{ItemDescriptor, ListDescriptor, SourceConnector};
use crate::vault::store::KeyValueStore;
use crate::vault::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a run needs, passed explicitly to each component.
pub struct SyncContext<'a> {
    pub paths: &'a VaultPaths,
    pub config: &'a VaultConfig,
    pub logger: &'a Logger,
    pub sleeper: &'a dyn Sleeper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Skipped,
    Duplicated,
    Fetched,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: String,
    pub title: String,
    pub url: String,
    pub position: usize,
    pub status: Option<ItemStatus>,
    pub action: ItemAction,
}

#[derive(Debug, Clone)]
pub struct ListReport {
    pub list_id: String,
    pub title: String,
    pub dir: PathBuf,
    /// Final per-item status, in list order.
    pub items: Vec<ItemOutcome>,
    pub skipped_invalid: usize,
    pub html_path: Option<PathBuf>,
}

impl ListReport {
    pub fn count(&self, action: ItemAction) -> usize {
        self.items.iter().filter(|i| i.action == action).count()
    }
}

#[derive(Debug, Clone)]
pub struct FailedList {
    pub list_id: String,
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub lists: Vec<ListReport>,
    pub failed_lists: Vec<FailedList>,
    pub index_entries: usize,
}

impl RunReport {
    pub fn count(&self, action: ItemAction) -> usize {
        self.lists.iter().map(|l| l.count(action)).sum()
    }
}

pub struct Orchestrator<'a, C: SourceConnector + ?Sized> {
    ctx: &'a SyncContext<'a>,
    connector: &'a C,
    index: GlobalIndex,
}

impl<'a, C: SourceConnector + ?Sized> Orchestrator<'a, C> {
    pub fn new(ctx: &'a SyncContext<'a>, connector: &'a C) -> Result<Self> {
        fs::create_dir_all(&ctx.paths.archive_root).with_context(|| {
            format!("failed to create {}", ctx.paths.archive_root.display())
        })?;
        let index = GlobalIndex::load_or_recover(&ctx.paths.index_file, ctx.logger)?;
        Ok(Self {
            ctx,
            connector,
            index,
        })
    }

    /// Archive every list of `account`. Only a failure to discover any list
    /// is returned as an error; per-list failures are collected in the
    /// report.
    pub fn run(&mut self, account: &str) -> Result<RunReport> {
        let logger = self.ctx.logger;
        logger.info(format!("Fetching playlists from account: {account}"));

        let lists = match self.connector.enumerate_lists(account) {
            Ok(lists) => lists,
            Err(err) => {
                let discovery = ArchiveError::DiscoveryFailure {
                    what: format!("playlists of {account}"),
                    reason: format!("{err:#}"),
                };
                logger.error(discovery.to_string());
                Vec::new()
            }
        };
        if lists.is_empty() {
            logger.error("No playlists found. Exiting.");
            return Err(ArchiveError::NoListsFound(account.to_string()).into());
        }
        logger.info(format!("Found {} playlists", lists.len()));

        let mut report = RunReport::default();
        let total = lists.len();
        for (n, list) in lists.iter().enumerate() {
            logger.info(format!("Processing playlist {}/{total}", n + 1));
            match self.process_list(list) {
                Ok(list_report) => report.lists.push(list_report),
                Err(err) => {
                    logger.error(format!(
                        "Error processing playlist {}: {err:#}",
                        list.title
                    ));
                    report.failed_lists.push(FailedList {
                        list_id: list.id.clone(),
                        title: list.title.clone(),
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        report.index_entries = self.index.len();
        logger.info("Finished processing all playlists");
        Ok(report)
    }

    pub fn process_list(&mut self, list: &ListDescriptor) -> Result<ListReport> {
        let logger = self.ctx.logger;
        logger.info(format!("Processing playlist: {}", list.title));

        let dir = self.ctx.paths.list_dir(&list_dir_name(&list.title, &list.id));
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let mut store = ListStatusStore::load_or_recover(&dir, list, logger)?;

        logger.info(format!("Fetching videos from playlist: {}", list.url));
        let items = self.connector.enumerate_items(list).map_err(|err| {
            ArchiveError::DiscoveryFailure {
                what: format!("videos of playlist {}", list.id),
                reason: format!("{err:#}"),
            }
        })?;
        logger.info(format!("Found {} videos in playlist", items.len()));

        let mut report = ListReport {
            list_id: list.id.clone(),
            title: list.title.clone(),
            dir: dir.clone(),
            items: Vec::with_capacity(items.len()),
            skipped_invalid: 0,
            html_path: None,
        };

        for item in &items {
            match self.process_item(&mut store, &dir, &list.id, item)? {
                Some(outcome) => report.items.push(outcome),
                None => report.skipped_invalid += 1,
            }
        }

        match html::write_list_index(&dir, &list.title, &report.items) {
            Ok(path) => {
                logger.info(format!("Generated HTML index: {}", path.display()));
                report.html_path = Some(path);
            }
            Err(err) => logger.warn(format!("HTML index not written: {err:#}")),
        }

        let failed = report.count(ItemAction::Failed);
        if let Err(err) = audit::append_event(
            self.ctx.paths,
            "list",
            if failed == 0 { "ok" } else { "degraded" },
            &format!(
                "list={} skipped={} duplicated={} fetched={} failed={} invalid={}",
                list.id,
                report.count(ItemAction::Skipped),
                report.count(ItemAction::Duplicated),
                report.count(ItemAction::Fetched),
                failed,
                report.skipped_invalid
            ),
        ) {
            logger.warn(format!("audit event not written: {err:#}"));
        }

        logger.info(format!("Finished processing playlist: {}", list.title));
        Ok(report)
    }

    /// Decide and perform skip, duplicate or fetch for one item. `Ok(None)`
    /// means the entry was unusable and skipped.
    fn process_item(
        &mut self,
        store: &mut ListStatusStore,
        dir: &Path,
        list_id: &str,
        item: &ItemDescriptor,
    ) -> Result<Option<ItemOutcome>> {
        let logger = self.ctx.logger;
        let (Some(id), Some(title)) = (item.id.as_deref(), item.title.as_deref()) else {
            warn::emit(
                logger,
                WarnEvent {
                    code: "ITEM_UNRESOLVABLE",
                    stage: "discover",
                    action: "skip-item",
                    list: list_id,
                    item: item.id.as_deref().unwrap_or("unknown"),
                    retry: "next-run",
                    reason: &format!("entry {} lacks id or title", item.position),
                    err: "",
                },
            );
            return Ok(None);
        };
        let outcome = |action: ItemAction, status: ItemStatus| ItemOutcome {
            id: id.to_string(),
            title: title.to_string(),
            url: item.url.clone(),
            position: item.position,
            status: Some(status),
            action,
        };

        if store.status_of(id) == Some(ItemStatus::Downloaded) {
            logger.info(format!("Video {id} already downloaded, skipping"));
            return Ok(Some(outcome(ItemAction::Skipped, ItemStatus::Downloaded)));
        }

        if self.index.has(id) {
            logger.info(format!("Video {id} found in another playlist, copying..."));
            match duplicate(&self.index, id, dir, logger) {
                Ok(copied) => {
                    self.index.record_new_file(id, title, &copied.copy);
                    let provenance = if copied.copy == copied.source {
                        Provenance::File(copied.copy)
                    } else {
                        Provenance::CopiedFrom(copied.source)
                    };
                    store.record_success(id, title, &item.url, provenance);
                    self.index.persist()?;
                    store.persist()?;
                    return Ok(Some(outcome(ItemAction::Duplicated, ItemStatus::Downloaded)));
                }
                Err(err) => {
                    logger.warn(format!("{err}; fetching {id} instead"));
                }
            }
        }

        let policy = RetryPolicy::from_config(&self.ctx.config.fetch);
        let fetcher = RetryingFetcher::new(self.connector, policy, self.ctx.sleeper, logger);
        match fetcher.fetch(&item.url, id, dir) {
            Ok(path) => {
                self.index.record_new_file(id, title, &path);
                store.record_success(id, title, &item.url, Provenance::File(path));
                self.index.persist()?;
                store.persist()?;
                Ok(Some(outcome(ItemAction::Fetched, ItemStatus::Downloaded)))
            }
            Err(_) => {
                store.record_failure(id, title, &item.url);
                store.persist()?;
                Ok(Some(outcome(ItemAction::Failed, ItemStatus::Failed)))
            }
        }
    }
}
