use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::env_loader::unknown_env_keys;
use crate::vault::lock;
use crate::vault::paths::resolve_paths;
use crate::vault::util::pid_alive;
use crate::ytdlp::client::resolve_ytdlp_bin;

#[derive(Debug, Clone, Default)]
pub struct HealthOptions {
    pub output_dir: Option<PathBuf>,
}

pub fn run(opts: &HealthOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("health");
    let paths = resolve_paths(opts.output_dir.as_deref())?;

    report.detail(format!("archive_root={}", paths.archive_root.display()));
    if paths.archive_root.exists() {
        report.detail("path.archive_root=ok");
    } else {
        report.detail("path.archive_root=missing (created on first sync)");
    }

    match resolve_ytdlp_bin(&paths.ytdlp_bin) {
        Ok(bin) => report.detail(format!("ytdlp_bin={}", bin.display())),
        Err(err) => report.issue(format!("ytdlp_bin=unavailable ({err:#})")),
    }

    match lock::read_payload(&paths.lock_file) {
        Ok(Some(payload)) => {
            report.detail(format!("lock.pid={}", payload.pid));
            report.detail(format!("lock.started_at={}", payload.started_at));
            if pid_alive(payload.pid) {
                report.detail("lock.process=alive");
            } else {
                report.detail("lock.process=dead (interrupted run; next sync resumes)");
            }
            let current = env!("BUILD_UUID");
            if payload.build_uuid == current {
                report.detail("lock.build_match=ok");
            } else {
                report.detail(format!(
                    "lock.build_mismatch=found (lock={} current={})",
                    payload.build_uuid, current
                ));
            }
        }
        Ok(None) => report.detail("lock=free"),
        Err(err) => report.issue(format!("lock=unreadable ({err:#})")),
    }

    for key in unknown_env_keys(env::vars().map(|(k, _)| k)) {
        report.issue(format!("unknown environment variable {key}"));
    }

    Ok(report)
}
