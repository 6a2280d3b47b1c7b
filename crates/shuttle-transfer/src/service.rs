//! Bulk copy/move pipeline and directory moves over a remote share.
//!
//! # Design
//! - Every invocation runs a fixed sequence of named steps; each step is logged and
//!   counted in `transfer_steps_total{step,status}`.
//! - One ledger per invocation, owned by this frame. Any failure before commit
//!   rolls the ledger back; nothing is rolled back after commit.
//! - Move sources are deleted only after the commit succeeded.

use std::sync::Arc;

use shuttle_config::EngineConfig;
use shuttle_store::{EntryKind, RemoteStore, SharePath, StoreError};
use shuttle_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::conflict::{ConflictResolver, Resolution};
use crate::destination::{DirectoryPreparer, resolve_destination};
use crate::directory::{DirectoryMoveOutcome, DirectoryMover};
use crate::enumerate::EntryEnumerator;
use crate::error::{TransferError, TransferResult};
use crate::executor::TransferExecutor;
use crate::ledger::{Ledger, LedgerEntry, delete_entry};
use crate::model::{
    ConflictPolicy, DirectoryMoveRequest, FileItem, TransferMode, TransferPlan, TransferRequest,
};
use crate::pattern::NameMatcher;

const DIRECTORY_MOVE_LABEL: &str = "directory_move";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepKind {
    Validate,
    CompilePattern,
    PrepareTarget,
    Transfer,
    MoveDirectory,
    Commit,
    RemoveSources,
    Rollback,
}

impl StepKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::CompilePattern => "compile_pattern",
            Self::PrepareTarget => "prepare_target",
            Self::Transfer => "transfer",
            Self::MoveDirectory => "move_directory",
            Self::Commit => "commit",
            Self::RemoveSources => "remove_sources",
            Self::Rollback => "rollback",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

enum StepOutcome {
    Completed(Option<String>),
    Skipped(Option<String>),
}

impl StepOutcome {
    const fn status(&self) -> StepStatus {
        match self {
            Self::Completed(_) => StepStatus::Completed,
            Self::Skipped(_) => StepStatus::Skipped,
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Self::Completed(detail) | Self::Skipped(detail) => detail.as_deref(),
        }
    }
}

struct RequestPaths {
    source: SharePath,
    target: SharePath,
}

struct StagedEntry {
    plan: TransferPlan,
    in_place: bool,
}

/// Runs bulk copies, bulk moves and directory moves against one share.
#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn RemoteStore>,
    config: EngineConfig,
    metrics: Metrics,
}

impl TransferService {
    /// Construct a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, config: EngineConfig, metrics: Metrics) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    /// Engine configuration in use.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Metrics registry the service reports to.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Copy every selected file; sources are preserved.
    ///
    /// # Errors
    ///
    /// See [`TransferService::transfer`].
    pub fn copy_files(
        &self,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> TransferResult<Vec<FileItem>> {
        self.transfer(TransferMode::Copy, request, cancel)
    }

    /// Move every selected file; sources are removed once all destinations are final.
    ///
    /// # Errors
    ///
    /// See [`TransferService::transfer`].
    pub fn move_files(
        &self,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> TransferResult<Vec<FileItem>> {
        self.transfer(TransferMode::Move, request, cancel)
    }

    /// Transfer every file selected by `request`, all or nothing.
    ///
    /// Returns one [`FileItem`] per entry in enumeration order.
    ///
    /// # Errors
    ///
    /// - Validation errors before anything is touched.
    /// - [`TransferError::NothingToTransfer`] when the source is missing or nothing matched.
    /// - Conflict, store and cancellation errors after the destination side was
    ///   rolled back, or [`TransferError::RollbackIncomplete`] when it could not be.
    /// - [`TransferError::CommitIncomplete`] or [`TransferError::SourceCleanup`] when
    ///   every destination is final but leftovers remain.
    pub fn transfer(
        &self,
        mode: TransferMode,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> TransferResult<Vec<FileItem>> {
        let _active = self.metrics.track_active();
        info!(
            mode = mode.as_str(),
            source_root = %request.source_root,
            target_root = %request.target_root,
            recursive = request.recursive,
            policy = request.conflict_policy.as_str(),
            "transfer started"
        );

        let result = self.execute_pipeline(mode, request, cancel);
        match &result {
            Ok(items) => info!(mode = mode.as_str(), entries = items.len(), "transfer completed"),
            Err(err) => warn!(mode = mode.as_str(), error = %err, "transfer failed"),
        }
        result
    }

    /// Relocate one directory with a single rename.
    ///
    /// # Errors
    ///
    /// Validation errors, [`TransferError::NothingToTransfer`] for a missing source,
    /// [`TransferError::Unsupported`] when the share cannot re-parent directories,
    /// and conflict, store and cancellation errors.
    pub fn move_directory(
        &self,
        request: &DirectoryMoveRequest,
        cancel: &CancellationToken,
    ) -> TransferResult<FileItem> {
        let _active = self.metrics.track_active();
        info!(
            source = %request.source_path,
            target = %request.target_path,
            policy = request.conflict_policy.as_str(),
            "directory move started"
        );

        let (source, target) = self.execute_step(StepKind::Validate, || {
            validate_directory_move(request).map(|paths| (paths, StepOutcome::Completed(None)))
        })?;

        let mut ledger = Ledger::new();
        let mover = DirectoryMover::new(
            self.store.as_ref(),
            request.conflict_policy,
            &self.config,
        );
        let moved = self.execute_step(StepKind::MoveDirectory, || {
            mover
                .run(
                    &source,
                    &target,
                    request.create_target_directories,
                    &mut ledger,
                    cancel,
                )
                .map(|outcome| {
                    let detail = format!("moved to {}", outcome.item.target_path);
                    (outcome, StepOutcome::Completed(Some(detail)))
                })
        });
        let DirectoryMoveOutcome { item, conflict } = match moved {
            Ok(outcome) => outcome,
            Err(err) => {
                self.note_conflict_error(request.conflict_policy, &err);
                warn!(source = %source, error = %err, "directory move failed");
                return Err(self.run_rollback(&mut ledger, err));
            }
        };
        if conflict {
            self.metrics.inc_conflict(request.conflict_policy.as_str());
        }

        self.run_commit(&mut ledger)?;
        self.metrics.inc_entry(DIRECTORY_MOVE_LABEL);
        info!(source = %item.source_path, target = %item.target_path, "directory move completed");
        Ok(item)
    }

    fn execute_pipeline(
        &self,
        mode: TransferMode,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> TransferResult<Vec<FileItem>> {
        let paths = self.run_validate(request)?;
        let matcher = self.run_compile_pattern(request)?;

        let mut ledger = Ledger::new();
        let staged = match self.run_stage(request, &paths, &matcher, &mut ledger, cancel) {
            Ok(staged) => staged,
            Err(err) => return Err(self.run_rollback(&mut ledger, err)),
        };

        self.run_commit(&mut ledger)?;
        for _ in &staged {
            self.metrics.inc_entry(mode.as_str());
        }
        self.run_remove_sources(mode, &staged)?;

        Ok(staged.iter().map(|entry| FileItem::from(&entry.plan)).collect())
    }

    fn run_validate(&self, request: &TransferRequest) -> TransferResult<RequestPaths> {
        self.execute_step(StepKind::Validate, || {
            validate_request(request).map(|paths| (paths, StepOutcome::Completed(None)))
        })
    }

    fn run_compile_pattern(&self, request: &TransferRequest) -> TransferResult<NameMatcher> {
        self.execute_step(StepKind::CompilePattern, || {
            let matcher = NameMatcher::compile(&request.pattern, request.pattern_mode)?;
            let outcome = if matcher.matches_all() {
                StepOutcome::Skipped(Some("match all".to_string()))
            } else {
                StepOutcome::Completed(None)
            };
            Ok((matcher, outcome))
        })
    }

    fn run_stage(
        &self,
        request: &TransferRequest,
        paths: &RequestPaths,
        matcher: &NameMatcher,
        ledger: &mut Ledger,
        cancel: &CancellationToken,
    ) -> TransferResult<Vec<StagedEntry>> {
        let mut preparer = DirectoryPreparer::new(self.store.as_ref());
        self.run_prepare_target(request, &paths.target, &mut preparer, ledger)?;
        self.run_transfer(request, paths, matcher, &mut preparer, ledger, cancel)
    }

    fn run_prepare_target(
        &self,
        request: &TransferRequest,
        target: &SharePath,
        preparer: &mut DirectoryPreparer<'_>,
        ledger: &mut Ledger,
    ) -> TransferResult<()> {
        self.execute_step(StepKind::PrepareTarget, || match preparer.inspect(target)? {
            Some(EntryKind::Directory) => {
                preparer.mark_existing(target);
                Ok(((), StepOutcome::Skipped(Some("target exists".to_string()))))
            }
            Some(EntryKind::File) => Err(TransferError::store(
                "service.prepare_target",
                target,
                StoreError::NotADirectory {
                    path: target.as_str().to_string(),
                },
            )),
            None if request.create_target_directories => {
                preparer.ensure(target, ledger)?;
                Ok(((), StepOutcome::Completed(Some(format!("created {target}")))))
            }
            None => Err(TransferError::TargetMissing {
                path: target.clone(),
            }),
        })
    }

    fn run_transfer(
        &self,
        request: &TransferRequest,
        paths: &RequestPaths,
        matcher: &NameMatcher,
        preparer: &mut DirectoryPreparer<'_>,
        ledger: &mut Ledger,
        cancel: &CancellationToken,
    ) -> TransferResult<Vec<StagedEntry>> {
        let store = self.store.as_ref();
        let policy = request.conflict_policy;
        self.execute_step(StepKind::Transfer, || {
            let resolver = ConflictResolver::new(
                store,
                policy,
                &self.config.temp_prefix,
                self.config.max_rename_attempts,
            );
            let executor = TransferExecutor::new(store, self.config.fallback_chunk_size);
            let entries = EntryEnumerator::new(
                store,
                paths.source.clone(),
                request.recursive,
                matcher,
                cancel,
            );

            let mut staged = Vec::new();
            let mut bytes = 0_u64;
            for entry in entries {
                let entry = entry?;
                let destination =
                    resolve_destination(&entry, &paths.target, request.preserve_structure)?;
                if let Some(parent) = destination.parent() {
                    preparer.ensure(&parent, ledger)?;
                }

                let resolution = resolver
                    .resolve_file(&entry.absolute_path, &destination, ledger)
                    .inspect_err(|err| self.note_conflict_error(policy, err))?;
                if resolution.is_conflict() {
                    self.metrics.inc_conflict(policy.as_str());
                }

                let in_place = matches!(resolution, Resolution::InPlace(_));
                if !in_place {
                    let copied = executor.copy_file(&entry.absolute_path, resolution.path(), cancel)?;
                    ledger.record(LedgerEntry::Created(resolution.path().clone()));
                    self.metrics.add_bytes(copied);
                    bytes += copied;
                }
                debug!(
                    source = %entry.absolute_path,
                    destination = %resolution.path(),
                    in_place,
                    "staged entry"
                );
                staged.push(StagedEntry {
                    plan: TransferPlan {
                        effective_destination_path: resolution.path().clone(),
                        source: entry,
                        destination_path: destination,
                    },
                    in_place,
                });
            }

            if staged.is_empty() {
                return Err(TransferError::NothingToTransfer {
                    path: paths.source.clone(),
                    reason: "no_matches",
                });
            }
            let detail = format!("{} entries, {bytes} bytes", staged.len());
            Ok((staged, StepOutcome::Completed(Some(detail))))
        })
    }

    fn run_commit(&self, ledger: &mut Ledger) -> TransferResult<()> {
        let store = self.store.as_ref();
        self.execute_step(StepKind::Commit, || {
            let staged = ledger
                .entries()
                .iter()
                .filter(|entry| matches!(entry, LedgerEntry::Renamed { .. }))
                .count();
            ledger.commit(store)?;
            let outcome = if staged == 0 {
                StepOutcome::Skipped(None)
            } else {
                StepOutcome::Completed(Some(format!("removed {staged} staged entries")))
            };
            Ok(((), outcome))
        })
    }

    fn run_remove_sources(&self, mode: TransferMode, staged: &[StagedEntry]) -> TransferResult<()> {
        let store = self.store.as_ref();
        self.execute_step(StepKind::RemoveSources, || {
            if mode == TransferMode::Copy {
                return Ok(((), StepOutcome::Skipped(Some("copy".to_string()))));
            }
            let mut removed = 0_usize;
            let mut pending = 0_usize;
            let mut first_failure = None;
            for entry in staged.iter().filter(|entry| !entry.in_place) {
                let source = &entry.plan.source.absolute_path;
                match delete_entry(store, source, "service.remove_source") {
                    Ok(()) => removed += 1,
                    Err(err) => {
                        warn!(source = %source, error = %err, "failed to remove moved source");
                        pending += 1;
                        first_failure.get_or_insert(err);
                    }
                }
            }
            match first_failure {
                None => Ok((
                    (),
                    StepOutcome::Completed(Some(format!("removed {removed} sources"))),
                )),
                Some(err) => Err(TransferError::SourceCleanup {
                    pending,
                    source: Box::new(err),
                }),
            }
        })
    }

    fn run_rollback(&self, ledger: &mut Ledger, err: TransferError) -> TransferError {
        let store = self.store.as_ref();
        let pending = ledger.len();
        if pending > 0 {
            warn!(error = %err, pending, "rolling back transfer");
        }
        let rolled_back = self.execute_step(StepKind::Rollback, || {
            if ledger.is_empty() {
                return Ok(((), StepOutcome::Skipped(None)));
            }
            ledger.rollback(store)?;
            Ok(((), StepOutcome::Completed(Some(format!("reverted {pending} effects")))))
        });

        match rolled_back {
            Ok(()) => {
                if pending > 0 {
                    self.metrics.inc_rollback("completed");
                }
                err
            }
            Err(rollback) => {
                self.metrics.inc_rollback("incomplete");
                error!(error = %err, rollback_error = %rollback, "rollback incomplete");
                TransferError::RollbackIncomplete {
                    source: Box::new(err),
                    rollback: Box::new(rollback),
                }
            }
        }
    }

    fn note_conflict_error(&self, policy: ConflictPolicy, err: &TransferError) {
        if matches!(err, TransferError::DestinationExists { .. }) {
            self.metrics.inc_conflict(policy.as_str());
        }
    }

    fn execute_step<T, F>(&self, step: StepKind, op: F) -> TransferResult<T>
    where
        F: FnOnce() -> TransferResult<(T, StepOutcome)>,
    {
        self.record_step(step, StepStatus::Started, None);
        match op() {
            Ok((value, outcome)) => {
                self.record_step(step, outcome.status(), outcome.detail());
                Ok(value)
            }
            Err(err) => {
                let detail = err.to_string();
                self.record_step(step, StepStatus::Failed, Some(&detail));
                Err(err)
            }
        }
    }

    fn record_step(&self, step: StepKind, status: StepStatus, detail: Option<&str>) {
        debug!(
            step = step.as_str(),
            status = status.as_str(),
            detail = detail.unwrap_or_default(),
            "transfer step"
        );
        self.metrics.inc_transfer_step(step.as_str(), status.as_str());
    }
}

fn parse_field(field: &'static str, raw: &str) -> TransferResult<SharePath> {
    SharePath::parse(raw).map_err(|err| match err {
        StoreError::InvalidPath { reason, .. } => TransferError::invalid_input(field, reason, raw),
        _ => TransferError::invalid_input(field, "invalid_path", raw),
    })
}

fn validate_request(request: &TransferRequest) -> TransferResult<RequestPaths> {
    let source = parse_field("source_root", &request.source_root)?;
    let target = parse_field("target_root", &request.target_root)?;
    if request.recursive && target != source {
        if target.starts_with(&source) {
            return Err(TransferError::invalid_input(
                "target_root",
                "inside_source",
                request.target_root.as_str(),
            ));
        }
        if source.starts_with(&target) {
            return Err(TransferError::invalid_input(
                "target_root",
                "contains_source",
                request.target_root.as_str(),
            ));
        }
    }
    Ok(RequestPaths { source, target })
}

fn validate_directory_move(
    request: &DirectoryMoveRequest,
) -> TransferResult<(SharePath, SharePath)> {
    let source = parse_field("source_path", &request.source_path)?;
    if source.is_root() {
        return Err(TransferError::invalid_input(
            "source_path",
            "empty",
            request.source_path.as_str(),
        ));
    }
    let target = parse_field("target_path", &request.target_path)?;
    if target.is_root() {
        return Err(TransferError::invalid_input(
            "target_path",
            "empty",
            request.target_path.as_str(),
        ));
    }
    if target.starts_with(&source) {
        return Err(TransferError::invalid_input(
            "target_path",
            "inside_source",
            request.target_path.as_str(),
        ));
    }
    if source.starts_with(&target) {
        return Err(TransferError::invalid_input(
            "target_path",
            "contains_source",
            request.target_path.as_str(),
        ));
    }
    Ok((source, target))
}
