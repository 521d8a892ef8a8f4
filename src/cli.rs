use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::health::{self, HealthOptions};
use crate::commands::status::{self, StatusOptions};
use crate::commands::sync::{self, SyncOptions};
use crate::commands::CommandReport;

#[derive(Debug, Parser)]
#[command(
    name = "tubevault",
    version,
    about = "Incrementally archive every playlist of a video account",
    after_help = "Examples:\n  tubevault sync @username\n  tubevault sync https://www.youtube.com/@username\n  tubevault sync UCxxxxxxxxxxxxxxxxxxxxxx ./downloads"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download new videos of every playlist and refresh the HTML indexes.
    Sync {
        /// Channel handle (@name), channel id (UC...) or URL.
        account: String,
        /// Archive root (default: $TUBEVAULT_OUTPUT_DIR or ./downloads).
        output_dir: Option<PathBuf>,
        /// Keep running, syncing every watcher.poll_interval_secs.
        #[arg(long)]
        daemon: bool,
    },
    /// Summarize what the archive holds, without network access.
    Status { output_dir: Option<PathBuf> },
    /// Check yt-dlp, the archive lock and TUBEVAULT_* variables.
    Health { output_dir: Option<PathBuf> },
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "issues found" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  ! {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = match cli.command {
        Command::Sync {
            account,
            output_dir,
            daemon,
        } => sync::run(&SyncOptions {
            account,
            output_dir,
            daemon,
        })?,
        Command::Status { output_dir } => status::run(&StatusOptions { output_dir })?,
        Command::Health { output_dir } => health::run(&HealthOptions { output_dir })?,
    };

    render(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}
