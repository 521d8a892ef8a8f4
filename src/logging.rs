use chrono::Local;
use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::{Dispatch, Event, Level, Subscriber, dispatcher};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

/// `YYYY-mm-dd HH:MM:SS - LEVEL - message`, one event per line.
struct LineFormat;

fn level_name(level: &Level) -> &'static str {
    if *level == Level::WARN {
        "WARNING"
    } else {
        level.as_str()
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level_name(event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn open_log_file(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Run logger handed to every component of one run.
///
/// Events go to stderr and, when a log file is configured, to that file as
/// well. `TUBEVAULT_LOG` takes an `EnvFilter` directive (default `info`).
/// A log file that cannot be opened leaves stderr logging in place.
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    fn build(file: Option<&Path>) -> Self {
        let filter =
            EnvFilter::try_from_env("TUBEVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let stderr_layer = tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_ansi(false)
            .with_writer(io::stderr);
        let file_layer = file
            .and_then(|path| open_log_file(path).ok())
            .map(|file| {
                tracing_subscriber::fmt::layer()
                    .event_format(LineFormat)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
            });
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer);
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    pub fn to_file(path: impl AsRef<Path>) -> Self {
        Self::build(Some(path.as_ref()))
    }

    pub fn stderr_only() -> Self {
        Self::build(None)
    }

    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        dispatcher::with_default(&self.dispatch, || tracing::info!("{message}"));
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        dispatcher::with_default(&self.dispatch, || tracing::warn!("{message}"));
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        dispatcher::with_default(&self.dispatch, || tracing::error!("{message}"));
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::stderr_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn has_timestamp_prefix(line: &str) -> bool {
        let Some(stamp) = line.get(..19) else {
            return false;
        };
        chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok()
            && line[19..].starts_with(" - ")
    }

    #[test]
    fn file_logger_appends_formatted_lines() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("logs/tubevault.log");
        let logger = Logger::to_file(&path);
        logger.info("first");
        logger.warn("fetch retry");
        logger.error("second");

        let raw = fs::read_to_string(&path).expect("read log");
        let lines = raw.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| has_timestamp_prefix(l)));
        assert!(lines[0].ends_with(" - INFO - first"));
        assert!(lines[1].ends_with(" - WARNING - fetch retry"));
        assert!(lines[2].ends_with(" - ERROR - second"));
    }

    #[test]
    fn loggers_write_only_to_their_own_file() {
        let tmp = tempdir().expect("tempdir");
        let a = Logger::to_file(tmp.path().join("a.log"));
        let b = Logger::to_file(tmp.path().join("b.log"));
        a.info("for a");
        b.info("for b");

        let a_raw = fs::read_to_string(tmp.path().join("a.log")).expect("a");
        let b_raw = fs::read_to_string(tmp.path().join("b.log")).expect("b");
        assert!(a_raw.contains("for a") && !a_raw.contains("for b"));
        assert!(b_raw.contains("for b") && !b_raw.contains("for a"));
    }

    #[test]
    fn unwritable_log_path_still_logs_to_stderr() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("blocker"), b"file").expect("write");
        let logger = Logger::to_file(tmp.path().join("blocker/tubevault.log"));
        logger.info("still fine");
        assert!(!tmp.path().join("blocker/tubevault.log").exists());
    }
}
