use crate::logging::Logger;
use crate::vault::audit;
use crate::vault::config::load_config;
use crate::vault::fetcher::ThreadSleeper;
use crate::vault::lock::RunLock;
use crate::vault::paths::{VaultPaths, resolve_paths};
use crate::vault::sync::{ItemAction, Orchestrator, RunReport, SyncContext};
use crate::ytdlp::client::YtDlpConnector;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SyncCycleOutcome {
    pub paths: VaultPaths,
    pub report: RunReport,
}

fn run_summary(report: &RunReport) -> String {
    format!(
        "lists={} failed_lists={} skipped={} duplicated={} fetched={} failed={} index_entries={}",
        report.lists.len(),
        report.failed_lists.len(),
        report.count(ItemAction::Skipped),
        report.count(ItemAction::Duplicated),
        report.count(ItemAction::Fetched),
        report.count(ItemAction::Failed),
        report.index_entries
    )
}

/// One full archive run for `account`, holding the archive lock throughout.
pub fn run_once(account: &str, output_dir: Option<&Path>) -> Result<SyncCycleOutcome> {
    let paths = resolve_paths(output_dir)?;
    let cfg = load_config()?;
    fs::create_dir_all(&paths.archive_root)
        .with_context(|| format!("failed to create {}", paths.archive_root.display()))?;
    let _lock = RunLock::acquire(&paths.lock_file)?;

    let logger = Logger::to_file(&paths.log_file);
    logger.info("Starting playlist archive run");
    let connector = YtDlpConnector::new(&paths.ytdlp_bin, cfg.fetch.clone())?;
    logger.info(format!("Using yt-dlp at {}", connector.bin().display()));
    let ctx = SyncContext {
        paths: &paths,
        config: &cfg,
        logger: &logger,
        sleeper: &ThreadSleeper,
    };

    let mut orchestrator = Orchestrator::new(&ctx, &connector)?;
    let result = orchestrator.run(account);
    let (status, message) = match &result {
        Ok(report) if report.failed_lists.is_empty() && report.count(ItemAction::Failed) == 0 => {
            ("ok", run_summary(report))
        }
        Ok(report) => ("degraded", run_summary(report)),
        Err(err) => ("failed", format!("{err:#}")),
    };
    if let Err(err) = audit::append_event(&paths, "run", status, &message) {
        logger.warn(format!("audit event not written: {err:#}"));
    }

    let report = result?;
    Ok(SyncCycleOutcome { paths, report })
}

/// Re-run forever, sleeping `watcher.poll_interval_secs` between runs. A
/// failed run is logged and retried on the next cycle.
pub fn run_daemon(account: &str, output_dir: Option<&Path>) -> Result<()> {
    let paths = resolve_paths(output_dir)?;
    let logger = Logger::to_file(&paths.log_file);
    loop {
        if let Err(err) = run_once(account, output_dir) {
            logger.error(format!("sync cycle failed: {err:#}"));
        }
        let cfg = load_config()?;
        logger.info(format!(
            "Next sync in {} seconds",
            cfg.watcher.poll_interval_secs
        ));
        thread::sleep(Duration::from_secs(cfg.watcher.poll_interval_secs));
    }
}
