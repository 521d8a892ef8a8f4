use crate::error::ArchiveError;
use crate::logging::Logger;
use crate::vault::config::FetchConfig;
use crate::vault::source::SourceConnector;
use crate::vault::warn::{self, WarnEvent};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Extensions a primary media asset may end up with after format
/// negotiation. Siblings with any other extension are sidecars.
pub const PRIMARY_MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv"];

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &FetchConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            backoff_unit: cfg.backoff_unit(),
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `unit * 2^attempt`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Locate the primary asset the connector wrote: the reported path first,
/// then the same stem with each known media extension.
pub fn resolve_primary(hint: &Path, target_dir: &Path) -> Option<PathBuf> {
    let hint = if hint.is_relative() {
        target_dir.join(hint)
    } else {
        hint.to_path_buf()
    };
    if hint.is_file() {
        return Some(hint);
    }
    PRIMARY_MEDIA_EXTENSIONS
        .iter()
        .map(|ext| hint.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

pub struct RetryingFetcher<'a, C: SourceConnector + ?Sized> {
    connector: &'a C,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
    logger: &'a Logger,
}

impl<'a, C: SourceConnector + ?Sized> RetryingFetcher<'a, C> {
    pub fn new(
        connector: &'a C,
        policy: RetryPolicy,
        sleeper: &'a dyn Sleeper,
        logger: &'a Logger,
    ) -> Self {
        Self {
            connector,
            policy,
            sleeper,
            logger,
        }
    }

    /// Fetch one item into `target_dir`. Never panics or propagates connector
    /// errors: after the last attempt the result is `FetchFailure`.
    pub fn fetch(
        &self,
        item_url: &str,
        item_id: &str,
        target_dir: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        let max = self.policy.max_retries;
        for attempt in 1..=max {
            self.logger.info(format!(
                "Downloading video {item_id} (attempt {attempt}/{max})"
            ));

            let failure = match self.connector.fetch_item(item_url, target_dir) {
                Ok(report) => match report
                    .primary_hint
                    .as_deref()
                    .and_then(|hint| resolve_primary(hint, target_dir))
                {
                    Some(path) => {
                        self.logger
                            .info(format!("Successfully downloaded: {}", path.display()));
                        return Ok(path);
                    }
                    None => "no output file found after reported success".to_string(),
                },
                Err(err) => format!("{err:#}"),
            };

            self.logger.warn(format!(
                "Attempt {attempt} failed for video {item_id}: {failure}"
            ));
            let wait = self.policy.backoff_after(attempt);
            if attempt < max {
                self.logger.info(format!(
                    "Waiting {} seconds before retry...",
                    wait.as_secs_f64()
                ));
            }
            self.sleeper.sleep(wait);
        }

        let err = ArchiveError::FetchFailure {
            item_id: item_id.to_string(),
            attempts: max,
        };
        warn::emit(
            self.logger,
            WarnEvent {
                code: err.code().as_str(),
                stage: "fetch",
                action: "record-failure",
                list: &target_dir.display().to_string(),
                item: item_id,
                retry: "next-run",
                reason: "retries-exhausted",
                err: &err.to_string(),
            },
        );
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::source::{FetchReport, ItemDescriptor, ListDescriptor};
    use anyhow::Result;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingSleeper {
        waits: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.waits.borrow_mut().push(duration);
        }
    }

    /// Fails the first `fail_first` calls, then writes `<dir>/<name>`.
    struct FlakyConnector {
        fail_first: usize,
        calls: Cell<usize>,
        written_name: &'static str,
        reported_name: &'static str,
    }

    impl SourceConnector for FlakyConnector {
        fn enumerate_lists(&self, _account: &str) -> Result<Vec<ListDescriptor>> {
            Ok(Vec::new())
        }

        fn enumerate_items(&self, _list: &ListDescriptor) -> Result<Vec<ItemDescriptor>> {
            Ok(Vec::new())
        }

        fn fetch_item(&self, _item_url: &str, target_dir: &Path) -> Result<FetchReport> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n <= self.fail_first {
                anyhow::bail!("HTTP Error 503");
            }
            fs::write(target_dir.join(self.written_name), b"video")?;
            Ok(FetchReport {
                primary_hint: Some(target_dir.join(self.reported_name)),
            })
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = policy();
        assert_eq!(p.backoff_after(1), Duration::from_secs(2));
        assert_eq!(p.backoff_after(2), Duration::from_secs(4));
        assert_eq!(p.backoff_after(3), Duration::from_secs(8));
    }

    #[test]
    fn always_failing_item_exhausts_retries_with_backoff() {
        let tmp = tempdir().expect("tempdir");
        let connector = FlakyConnector {
            fail_first: usize::MAX,
            calls: Cell::new(0),
            written_name: "A.mp4",
            reported_name: "A.mp4",
        };
        let sleeper = RecordingSleeper::default();
        let logger = Logger::stderr_only();
        let fetcher = RetryingFetcher::new(&connector, policy(), &sleeper, &logger);

        let err = fetcher.fetch("u", "a", tmp.path()).expect_err("failure");
        assert!(matches!(err, ArchiveError::FetchFailure { attempts: 3, .. }));
        assert_eq!(connector.calls.get(), 3);
        assert_eq!(
            *sleeper.waits.borrow(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn recovers_on_a_later_attempt() {
        let tmp = tempdir().expect("tempdir");
        let connector = FlakyConnector {
            fail_first: 1,
            calls: Cell::new(0),
            written_name: "A.mp4",
            reported_name: "A.mp4",
        };
        let sleeper = RecordingSleeper::default();
        let logger = Logger::stderr_only();
        let fetcher = RetryingFetcher::new(&connector, policy(), &sleeper, &logger);

        let path = fetcher.fetch("u", "a", tmp.path()).expect("fetched");
        assert_eq!(path, tmp.path().join("A.mp4"));
        assert_eq!(connector.calls.get(), 2);
        assert_eq!(*sleeper.waits.borrow(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn negotiated_extension_is_found() {
        let tmp = tempdir().expect("tempdir");
        let connector = FlakyConnector {
            fail_first: 0,
            calls: Cell::new(0),
            written_name: "A.webm",
            reported_name: "A.mp4",
        };
        let sleeper = RecordingSleeper::default();
        let logger = Logger::stderr_only();
        let fetcher = RetryingFetcher::new(&connector, policy(), &sleeper, &logger);

        let path = fetcher.fetch("u", "a", tmp.path()).expect("fetched");
        assert_eq!(path, tmp.path().join("A.webm"));
    }

    #[test]
    fn reported_success_without_output_counts_as_failed_attempt() {
        let tmp = tempdir().expect("tempdir");
        let connector = FlakyConnector {
            fail_first: 0,
            calls: Cell::new(0),
            written_name: "A.part",
            reported_name: "A.mp4",
        };
        let sleeper = RecordingSleeper::default();
        let logger = Logger::stderr_only();
        let fetcher = RetryingFetcher::new(&connector, policy(), &sleeper, &logger);

        assert!(fetcher.fetch("u", "a", tmp.path()).is_err());
        assert_eq!(connector.calls.get(), 3);
    }
}
