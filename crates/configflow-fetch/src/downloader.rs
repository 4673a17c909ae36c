//! Bounded-concurrency artifact batches.
//!
//! # Design
//! - One task per item; a semaphore with `limit` permits gates every task, so
//!   at most `limit` items are in flight at once.
//! - The batch joins every task before returning. There is no early exit and
//!   no retry; per-item failures are collected by index and logged.
//! - Inline content is written directly and never reaches the fetcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use configflow_core::{ArtifactKind, DownloadItem, resolve_under};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{FetchError, FetchResult};
use crate::fetcher::ArtifactFetcher;

/// Items processed at once unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Runs download batches under a fixed concurrency ceiling.
#[derive(Clone)]
pub struct BoundedDownloader {
    fetcher: Arc<dyn ArtifactFetcher>,
    limit: usize,
}

impl std::fmt::Debug for BoundedDownloader {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BoundedDownloader")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

/// Per-batch outcome. The batch itself never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Artifact family of the batch.
    pub kind: ArtifactKind,
    /// Names written successfully, in request order.
    pub succeeded: Vec<String>,
    /// Names that failed, in request order.
    pub failed: Vec<String>,
}

impl DownloadReport {
    const fn empty(kind: ArtifactKind) -> Self {
        Self {
            kind,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl BoundedDownloader {
    /// Downloader with [`DEFAULT_CONCURRENCY`].
    #[must_use]
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self::with_limit(fetcher, DEFAULT_CONCURRENCY)
    }

    /// Downloader with an explicit ceiling (at least one).
    #[must_use]
    pub fn with_limit(fetcher: Arc<dyn ArtifactFetcher>, limit: usize) -> Self {
        Self {
            fetcher,
            limit: limit.max(1),
        }
    }

    /// Configured ceiling.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Process every item, resolving relative destinations under `base_dir`.
    ///
    /// Returns once all items have finished.
    pub async fn fetch_all(
        &self,
        base_dir: &Path,
        kind: ArtifactKind,
        items: &[DownloadItem],
    ) -> DownloadReport {
        let mut report = DownloadReport::empty(kind);
        if items.is_empty() {
            return report;
        }
        info!(
            kind = kind.as_str(),
            count = items.len(),
            limit = self.limit,
            "starting artifact batch"
        );

        let gate = Arc::new(Semaphore::new(self.limit));
        let mut tasks = JoinSet::new();
        for (index, item) in items.iter().cloned().enumerate() {
            let gate = Arc::clone(&gate);
            let fetcher = Arc::clone(&self.fetcher);
            let destination = resolve_under(base_dir, &item.local_path);
            let span = info_span!("artifact", kind = kind.as_str(), item = %item.name);
            tasks.spawn(
                async move {
                    let Ok(_permit) = gate.acquire_owned().await else {
                        return (index, Err(FetchError::AdmissionClosed));
                    };
                    (index, process(fetcher.as_ref(), &item, destination).await)
                }
                .instrument(span),
            );
        }

        let mut outcomes: Vec<Option<FetchResult<u64>>> = items.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(err) => warn!(kind = kind.as_str(), error = %err, "artifact task aborted"),
            }
        }

        for (item, outcome) in items.iter().zip(outcomes) {
            match outcome.unwrap_or(Err(FetchError::TaskLost)) {
                Ok(bytes) => {
                    debug!(kind = kind.as_str(), item = %item.name, bytes, "artifact ready");
                    report.succeeded.push(item.name.clone());
                }
                Err(err) => {
                    warn!(kind = kind.as_str(), item = %item.name, error = %err, "artifact failed");
                    report.failed.push(item.name.clone());
                }
            }
        }

        if report.failed.is_empty() {
            info!(kind = kind.as_str(), count = report.succeeded.len(), "artifact batch complete");
        } else {
            warn!(
                kind = kind.as_str(),
                failed = ?report.failed,
                succeeded = report.succeeded.len(),
                "artifact batch completed with failures; continuing"
            );
        }
        report
    }
}

async fn process(
    fetcher: &dyn ArtifactFetcher,
    item: &DownloadItem,
    destination: PathBuf,
) -> FetchResult<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| FetchError::io("create_parent", parent, source))?;
    }
    if let Some(content) = item.inline_content() {
        write_inline(&destination, content).await?;
        return Ok(content.len() as u64);
    }
    if item.url.trim().is_empty() {
        return Err(FetchError::MissingSource {
            name: item.name.clone(),
        });
    }
    debug!(url = %item.url, path = %destination.display(), "fetching artifact");
    fetcher.fetch(&item.url, &destination).await
}

async fn write_inline(destination: &Path, content: &str) -> FetchResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o644);
    let mut file = options
        .open(destination)
        .await
        .map_err(|source| FetchError::io("open_inline", destination, source))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|source| FetchError::io("write_inline", destination, source))?;
    file.flush()
        .await
        .map_err(|source| FetchError::io("flush_inline", destination, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HttpFetcher;
    use async_trait::async_trait;
    use axum::Router;
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    type TestResult<T> = anyhow::Result<T>;

    #[derive(Default)]
    struct CountingFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactFetcher for CountingFetcher {
        async fn fetch(&self, url: &str, destination: &Path) -> FetchResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(25)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if url.contains("fail") {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 500,
                });
            }
            tokio::fs::write(destination, url)
                .await
                .map_err(|source| FetchError::io("fake_write", destination, source))?;
            Ok(url.len() as u64)
        }
    }

    fn item(name: &str, url: &str, local_path: &str) -> DownloadItem {
        DownloadItem {
            name: name.to_string(),
            url: url.to_string(),
            local_path: local_path.to_string(),
            content: None,
        }
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_limit_and_all_items_finish() -> TestResult<()> {
        let dir = TempDir::new()?;
        let fetcher = Arc::new(CountingFetcher::default());
        let downloader = BoundedDownloader::new(fetcher.clone());
        let items: Vec<DownloadItem> = (0..10)
            .map(|i| {
                let url = if i % 4 == 0 {
                    format!("http://fake/fail/{i}")
                } else {
                    format!("http://fake/ok/{i}")
                };
                item(&format!("item-{i}"), &url, &format!("rules/{i}.txt"))
            })
            .collect();

        let report = downloader
            .fetch_all(dir.path(), ArtifactKind::Ruleset, &items)
            .await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 10);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), DEFAULT_CONCURRENCY);
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(report.failed, vec!["item-0", "item-4", "item-8"]);
        assert_eq!(report.succeeded.len(), 7);
        assert!(dir.path().join("rules/1.txt").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn inline_content_skips_the_fetcher() -> TestResult<()> {
        let dir = TempDir::new()?;
        let fetcher = Arc::new(CountingFetcher::default());
        let downloader = BoundedDownloader::with_limit(fetcher.clone(), 1);
        let mut inline = item("hosts", "http://fake/ignored", "./rules/hosts.txt");
        inline.content = Some("127.0.0.1 router.lan".to_string());
        let absolute = dir.path().join("abs/provider.yaml");
        let mut absolute_item = item("provider", "", &absolute.to_string_lossy());
        absolute_item.content = Some("proxies: []".to_string());

        let report = downloader
            .fetch_all(dir.path(), ArtifactKind::Provider, &[inline, absolute_item])
            .await;
        assert_eq!(report.succeeded, vec!["hosts", "provider"]);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("rules/hosts.txt")).await?,
            "127.0.0.1 router.lan"
        );
        assert_eq!(tokio::fs::read_to_string(&absolute).await?, "proxies: []");
        Ok(())
    }

    #[tokio::test]
    async fn item_without_source_fails_alone() -> TestResult<()> {
        let dir = TempDir::new()?;
        let fetcher = Arc::new(CountingFetcher::default());
        let downloader = BoundedDownloader::new(fetcher);
        let report = downloader
            .fetch_all(
                dir.path(),
                ArtifactKind::Ruleset,
                &[item("empty", " ", "r/empty.txt"), item("ok", "http://fake/ok", "r/ok.txt")],
            )
            .await;
        assert_eq!(report.failed, vec!["empty"]);
        assert_eq!(report.succeeded, vec!["ok"]);
        Ok(())
    }

    #[tokio::test]
    async fn mixed_batch_over_http_reports_failures_without_error() -> TestResult<()> {
        let app = Router::new().route(
            "/rules/{name}",
            get(|axum::extract::Path(name): axum::extract::Path<String>| async move {
                format!("payload for {name}")
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let dir = TempDir::new()?;
        let downloader = BoundedDownloader::new(Arc::new(HttpFetcher::new()?));
        let items = vec![
            item("a", &format!("{base}/rules/a"), "ruleset/a.txt"),
            item("b", &format!("{base}/missing/b"), "ruleset/b.txt"),
            item("c", &format!("{base}/rules/c"), "ruleset/c.txt"),
            item("d", &format!("{base}/missing/d"), "ruleset/d.txt"),
            item("e", &format!("{base}/rules/e"), "ruleset/e.txt"),
        ];

        let report = downloader
            .fetch_all(dir.path(), ArtifactKind::Ruleset, &items)
            .await;
        assert_eq!(report.succeeded, vec!["a", "c", "e"]);
        assert_eq!(report.failed, vec!["b", "d"]);
        for name in ["a", "c", "e"] {
            assert_eq!(
                tokio::fs::read_to_string(dir.path().join(format!("ruleset/{name}.txt"))).await?,
                format!("payload for {name}")
            );
        }
        assert!(!dir.path().join("ruleset/b.txt").exists());
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let downloader = BoundedDownloader::with_limit(Arc::new(CountingFetcher::default()), 0);
        assert_eq!(downloader.limit(), 1);
        let report = downloader
            .fetch_all(Path::new("/nonexistent"), ArtifactKind::Provider, &[])
            .await;
        assert!(report.succeeded.is_empty() && report.failed.is_empty());
    }
}
