//! Domain models for bulk transfers.
//!
//! # Design
//! - Requests carry raw caller strings; the pipeline validates them into share paths.
//! - Requests are serde-friendly so a caller can load them from JSON.
//! - Per-entry values (`SourceEntry`, `TransferPlan`) are immutable once built.

use serde::{Deserialize, Serialize};
use shuttle_store::SharePath;

/// How an existing destination is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Fail the whole operation.
    #[default]
    Throw,
    /// Replace the destination; the previous content is discarded only at commit.
    Overwrite,
    /// Write to the lowest unused `name(n)` alternative.
    Rename,
}

impl ConflictPolicy {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Throw => "throw",
            Self::Overwrite => "overwrite",
            Self::Rename => "rename",
        }
    }
}

/// Interpretation of the selection pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMode {
    /// `*` and `?` wildcards, anchored, case-insensitive.
    #[default]
    Wildcard,
    /// Regular expression used verbatim.
    Regex,
}

/// Whether sources survive the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Sources are preserved.
    Copy,
    /// Sources are removed once every destination is final.
    Move,
}

impl TransferMode {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }
}

/// Input of a bulk copy or move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Directory (or single file) to select from; empty is the share root.
    pub source_root: String,
    /// Directory receiving the entries; empty is the share root.
    pub target_root: String,
    /// Descend into subdirectories of the source root.
    #[serde(default)]
    pub recursive: bool,
    /// Selection pattern; empty selects everything.
    #[serde(default)]
    pub pattern: String,
    /// How `pattern` is interpreted.
    #[serde(default)]
    pub pattern_mode: PatternMode,
    /// Rebuild the source-relative directory layout below the target.
    #[serde(default)]
    pub preserve_structure: bool,
    /// Create the target root when it is missing.
    #[serde(default)]
    pub create_target_directories: bool,
    /// Handling of existing destinations.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

impl TransferRequest {
    /// Non-recursive, match-all request with the `Throw` policy.
    #[must_use]
    pub fn new(source_root: impl Into<String>, target_root: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            recursive: false,
            pattern: String::new(),
            pattern_mode: PatternMode::Wildcard,
            preserve_structure: false,
            create_target_directories: false,
            conflict_policy: ConflictPolicy::Throw,
        }
    }
}

/// Input of a whole-directory move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMoveRequest {
    /// Directory to relocate.
    pub source_path: String,
    /// Path the directory should occupy afterwards.
    pub target_path: String,
    /// Handling of an existing target.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    /// Create missing parents of the target.
    #[serde(default)]
    pub create_target_directories: bool,
}

impl DirectoryMoveRequest {
    /// Request with the `Throw` policy and no parent creation.
    #[must_use]
    pub fn new(source_path: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            conflict_policy: ConflictPolicy::Throw,
            create_target_directories: false,
        }
    }
}

/// A file selected for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path from the share root.
    pub absolute_path: SharePath,
    /// Path below the declared source root.
    pub root_relative_path: SharePath,
}

/// Where one entry is going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    /// Entry being transferred.
    pub source: SourceEntry,
    /// Naive mapped destination.
    pub destination_path: SharePath,
    /// Destination chosen by conflict resolution.
    pub effective_destination_path: SharePath,
}

/// Reported outcome for one transferred entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    /// Where the entry came from.
    pub source_path: SharePath,
    /// Where the entry now lives.
    pub target_path: SharePath,
}

impl From<&TransferPlan> for FileItem {
    fn from(plan: &TransferPlan) -> Self {
        Self {
            source_path: plan.source.absolute_path.clone(),
            target_path: plan.effective_destination_path.clone(),
        }
    }
}
