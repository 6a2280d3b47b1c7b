//! Lazy walk of a source tree yielding the files selected for transfer.
//!
//! # Design
//! - The walk is a finite, non-restartable iterator; callers consume entries as
//!   they are produced.
//! - Each directory is listed completely and sorted before any of its entries are
//!   yielded, so a static tree always produces the same sequence.
//! - Files of a directory come before its subdirectories (depth-first).
//! - Any listing failure ends the walk with that error.

use std::collections::VecDeque;

use shuttle_store::{
    AccessMode, DirEntry, Disposition, EntryKind, ListingPage, RemoteStore, ShareMode, SharePath,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::conflict::probe;
use crate::error::{TransferError, TransferResult};
use crate::model::SourceEntry;
use crate::pattern::NameMatcher;

enum WalkState {
    Start,
    Walking,
    Done,
}

/// Iterator over the files below a source root that satisfy a [`NameMatcher`].
pub struct EntryEnumerator<'a> {
    store: &'a dyn RemoteStore,
    root: SharePath,
    recursive: bool,
    matcher: &'a NameMatcher,
    cancel: &'a CancellationToken,
    state: WalkState,
    ready: VecDeque<SourceEntry>,
    directories: VecDeque<SharePath>,
}

impl<'a> EntryEnumerator<'a> {
    /// Walk `root` on `store`.
    #[must_use]
    pub const fn new(
        store: &'a dyn RemoteStore,
        root: SharePath,
        recursive: bool,
        matcher: &'a NameMatcher,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            root,
            recursive,
            matcher,
            cancel,
            state: WalkState::Start,
            ready: VecDeque::new(),
            directories: VecDeque::new(),
        }
    }

    fn start(&mut self) -> TransferResult<()> {
        let kind = probe(self.store, &self.root).into_result("enumerate.probe_root", &self.root)?;
        match kind {
            None => Err(TransferError::NothingToTransfer {
                path: self.root.clone(),
                reason: "source_missing",
            }),
            Some(EntryKind::File) => {
                let name = self.root.file_name().unwrap_or_default();
                let root_relative_path = SharePath::parse(name)
                    .map_err(|source| TransferError::store("enumerate.root_name", &self.root, source))?;
                self.ready.push_back(SourceEntry {
                    absolute_path: self.root.clone(),
                    root_relative_path,
                });
                Ok(())
            }
            Some(EntryKind::Directory) => {
                self.directories.push_back(self.root.clone());
                Ok(())
            }
        }
    }

    fn visit(&mut self, directory: &SharePath) -> TransferResult<()> {
        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let mut records = list_all(self.store, directory)?;
        records.retain(|record| !record.is_dot_entry());
        records.sort_by(|left, right| left.name.cmp(&right.name));

        let mut subdirectories = Vec::new();
        for record in records {
            let absolute_path = directory
                .join_name(&record.name)
                .map_err(|source| TransferError::store("enumerate.entry_name", directory, source))?;
            match record.kind {
                EntryKind::Directory => {
                    if self.recursive {
                        subdirectories.push(absolute_path);
                    }
                }
                EntryKind::File => {
                    let root_relative_path =
                        absolute_path.strip_prefix(&self.root).unwrap_or_default();
                    if self.matcher.matches(&record.name, root_relative_path.as_str()) {
                        self.ready.push_back(SourceEntry {
                            absolute_path,
                            root_relative_path,
                        });
                    }
                }
            }
        }
        for subdirectory in subdirectories.into_iter().rev() {
            self.directories.push_front(subdirectory);
        }
        debug!(directory = %directory, selected = self.ready.len(), "listed directory");
        Ok(())
    }

    fn advance(&mut self) -> Option<TransferResult<SourceEntry>> {
        if matches!(self.state, WalkState::Start) {
            self.state = WalkState::Walking;
            if let Err(err) = self.start() {
                return Some(Err(err));
            }
        }
        loop {
            if let Some(entry) = self.ready.pop_front() {
                if self.cancel.is_cancelled() {
                    return Some(Err(TransferError::Cancelled));
                }
                return Some(Ok(entry));
            }
            let directory = self.directories.pop_front()?;
            if let Err(err) = self.visit(&directory) {
                return Some(Err(err));
            }
        }
    }
}

impl Iterator for EntryEnumerator<'_> {
    type Item = TransferResult<SourceEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, WalkState::Done) {
            return None;
        }
        let item = self.advance();
        if matches!(item, None | Some(Err(_))) {
            self.state = WalkState::Done;
        }
        item
    }
}

/// Read every page of a directory listing.
///
/// # Errors
///
/// Returns store errors from opening or listing `directory`.
pub fn list_all(store: &dyn RemoteStore, directory: &SharePath) -> TransferResult<Vec<DirEntry>> {
    let handle = store
        .open(directory, AccessMode::Read, ShareMode::All, Disposition::Open)
        .map_err(|source| TransferError::store("enumerate.open_directory", directory, source))?;
    let mut records = Vec::new();
    loop {
        match store.list_directory(&handle) {
            Ok(ListingPage::Entries(page)) => records.extend(page),
            Ok(ListingPage::End) => break,
            Err(source) => {
                store.close(handle);
                return Err(TransferError::store("enumerate.list_directory", directory, source));
            }
        }
    }
    store.close(handle);
    Ok(records)
}
