//! Configuration update transactions.
//!
//! A transaction walks `PreTransform -> BackingUp -> Materializing -> Writing`
//! and ends in `Done` or `Aborted`. Backup and download failures degrade the
//! run; transform, directory, custom-file and write failures abort it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use configflow_config::AgentConfig;
use configflow_core::{ArtifactKind, ConfigUpdater, DownloadItem, UpdateRequest};
use configflow_fetch::{BoundedDownloader, HttpFetcher};
use configflow_fsops::{
    BackupManager, ConfigWriter, Hook, ServiceProfile, create_directories, ensure_cache_dump,
    write_custom_files,
};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::transform;

/// Lifecycle state of a single update transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepted, not yet started.
    Idle,
    /// Rewriting listeners in the incoming document.
    PreTransform,
    /// Snapshotting and cleaning the config directory.
    BackingUp,
    /// Creating directories, files and downloads.
    Materializing,
    /// Replacing the config file.
    Writing,
    /// Completed.
    Done,
    /// Stopped after a fatal step failure.
    Aborted,
}

impl TransactionState {
    /// Stable label for structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PreTransform => "pre_transform",
            Self::BackingUp => "backing_up",
            Self::Materializing => "materializing",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

/// Outcome of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReport {
    /// Identifier stamped on every log line of the run.
    pub transaction_id: Uuid,
    /// Terminal state.
    pub state: TransactionState,
    /// Step that aborted the run, if any.
    pub failed_step: Option<TransactionState>,
    /// Snapshot directory created for the run.
    pub backup_path: Option<PathBuf>,
    /// Download names that could not be written.
    pub failed_downloads: Vec<String>,
}

impl TransactionReport {
    const fn new(transaction_id: Uuid) -> Self {
        Self {
            transaction_id,
            state: TransactionState::Idle,
            failed_step: None,
            backup_path: None,
            failed_downloads: Vec::new(),
        }
    }

    fn enter(&mut self, state: TransactionState) {
        debug!(from = self.state.as_str(), to = state.as_str(), "transaction step");
        self.state = state;
    }

    fn abort(mut self, err: &AppError) -> Self {
        error!(step = self.state.as_str(), error = ?err, "config update aborted");
        self.failed_step = Some(self.state);
        self.state = TransactionState::Aborted;
        self
    }

    /// Whether the run reached `Done`.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == TransactionState::Done
    }
}

/// Static inputs of the orchestrator, derived from the agent config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    /// Managed configuration file.
    pub config_path: PathBuf,
    /// Directory holding `config_path`.
    pub config_dir: PathBuf,
    /// File name of `config_path`, used in the backup scope.
    pub config_file_name: String,
    /// Profile selected from the service type.
    pub profile: ServiceProfile,
    /// Whether the listener rewrite is switched on for this host.
    pub rewrite_listeners: bool,
}

impl UpdateSettings {
    /// Settings for the service described by `config`.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            config_path: config.config_path.clone(),
            config_dir: config.config_dir(),
            config_file_name: config.config_file_name(),
            profile: ServiceProfile::resolve(&config.service_type),
            rewrite_listeners: config.enable_dns_hijack_rewrite,
        }
    }
}

struct Inner {
    settings: UpdateSettings,
    backups: BackupManager,
    downloader: BoundedDownloader,
    writer: ConfigWriter,
    lock: Mutex<()>,
}

/// Runs update transactions one at a time per agent.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Orchestrator")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator with an injected downloader.
    #[must_use]
    pub fn new(settings: UpdateSettings, downloader: BoundedDownloader) -> Self {
        let writer = ConfigWriter::for_profile(settings.profile);
        Self {
            inner: Arc::new(Inner {
                settings,
                backups: BackupManager::default(),
                downloader,
                writer,
                lock: Mutex::new(()),
            }),
        }
    }

    /// Production orchestrator fetching over HTTP with the public resolvers.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &AgentConfig) -> AppResult<Self> {
        let fetcher =
            HttpFetcher::new().map_err(|err| AppError::fetch("orchestrator.fetcher", err))?;
        Ok(Self::new(
            UpdateSettings::from_config(config),
            BoundedDownloader::new(Arc::new(fetcher)),
        ))
    }

    /// Run one transaction to completion, waiting for any in-flight run first.
    pub async fn run(&self, request: UpdateRequest) -> TransactionReport {
        let transaction_id = Uuid::new_v4();
        let span = info_span!("config_update", %transaction_id);
        self.execute(transaction_id, request).instrument(span).await
    }

    async fn execute(&self, transaction_id: Uuid, request: UpdateRequest) -> TransactionReport {
        let _guard = self.inner.lock.lock().await;
        let settings = &self.inner.settings;
        let profile = settings.profile;
        let config_dir = &settings.config_dir;
        let mut report = TransactionReport::new(transaction_id);
        info!(
            profile = profile.as_str(),
            artifacts = request.artifact_count(),
            "config update started"
        );

        let UpdateRequest {
            config,
            directories,
            provider_downloads,
            ruleset_downloads,
            custom_files,
        } = request;

        let mut document = config;
        if settings.rewrite_listeners && profile.enables(Hook::ListenerRewrite) {
            report.enter(TransactionState::PreTransform);
            match transform::rewrite_listeners(&document) {
                Ok(rewritten) => document = rewritten,
                Err(err) => return report.abort(&err.into()),
            }
        }

        report.enter(TransactionState::BackingUp);
        let scope = profile.backup_scope(&settings.config_file_name);
        let backup = self.inner.backups.snapshot_and_clean(config_dir, &scope);
        if !backup.is_clean() {
            warn!(failures = ?backup.failures, "backup completed with failures");
        }
        report.backup_path = backup.created.then_some(backup.path);

        report.enter(TransactionState::Materializing);
        if profile.enables(Hook::CacheSeed)
            && let Err(err) = ensure_cache_dump(config_dir)
        {
            warn!(error = ?err, "cache dump seed failed");
        }
        if gate(profile, Hook::Directories, directories.len())
            && let Err(err) = create_directories(config_dir, &directories)
        {
            return report.abort(&AppError::fsops("materialize.directories", err));
        }
        if gate(profile, Hook::CustomFiles, custom_files.len())
            && let Err(err) = write_custom_files(config_dir, &custom_files)
        {
            return report.abort(&AppError::fsops("materialize.custom_files", err));
        }
        for (hook, kind, items) in [
            (Hook::ProviderDownloads, ArtifactKind::Provider, &provider_downloads),
            (Hook::RulesetDownloads, ArtifactKind::Ruleset, &ruleset_downloads),
        ] {
            let failed = self.download(config_dir, profile, hook, kind, items).await;
            report.failed_downloads.extend(failed);
        }

        report.enter(TransactionState::Writing);
        if let Err(err) = self.inner.writer.commit(
            &settings.config_path,
            &document,
            report.backup_path.as_deref(),
        ) {
            return report.abort(&AppError::fsops("commit", err));
        }

        report.enter(TransactionState::Done);
        info!(
            backup = ?report.backup_path,
            failed_downloads = report.failed_downloads.len(),
            "config update completed"
        );
        report
    }

    async fn download(
        &self,
        config_dir: &Path,
        profile: ServiceProfile,
        hook: Hook,
        kind: ArtifactKind,
        items: &[DownloadItem],
    ) -> Vec<String> {
        if !gate(profile, hook, items.len()) {
            return Vec::new();
        }
        let outcome = self.inner.downloader.fetch_all(config_dir, kind, items).await;
        if !outcome.failed.is_empty() {
            warn!(
                kind = kind.as_str(),
                failed = ?outcome.failed,
                "some downloads failed"
            );
        }
        outcome.failed
    }
}

/// Whether a hook with `count` items should run. Items for hooks the
/// profile does not enable are dropped with a log line.
fn gate(profile: ServiceProfile, hook: Hook, count: usize) -> bool {
    if count == 0 {
        return false;
    }
    if profile.enables(hook) {
        return true;
    }
    info!(
        profile = profile.as_str(),
        hook = hook.as_str(),
        count,
        "hook not enabled for profile; items skipped"
    );
    false
}

impl ConfigUpdater for Orchestrator {
    fn submit(&self, request: UpdateRequest) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let _report = orchestrator.run(request).await;
        });
    }
}
