//! In-memory share used by engine test suites.
//!
//! # Design
//! - Mirrors the observable contract of `LocalStore` (dispositions, access checks,
//!   paged listings with `.`/`..`) without touching the disk.
//! - Faults are injected per operation and path so every step of a transfer can be
//!   made to fail deterministically. Call hooks run side effects (such as cancelling
//!   a token) at an exact point in a transfer.
//! - Handle accounting and snapshots let tests assert "no leaks" and byte-for-byte
//!   restoration after rollback.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use shuttle_store::{
    AccessMode, DirEntry, Disposition, EntryKind, FileHandle, ListingPage, ReadOutcome,
    RemoteStore, ShareMode, SharePath, StoreError, StoreResult, TransferLimits,
};

/// Records returned per listing page unless overridden.
pub const DEFAULT_PAGE_SIZE: usize = 4;

/// Contents of one entry in the in-memory share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNode {
    /// A file and its bytes.
    File(Vec<u8>),
    /// A directory.
    Directory,
}

/// Store operation a [`Fault`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    /// `open`, including existence probes.
    Open,
    /// `read`.
    Read,
    /// `write`.
    Write,
    /// `rename`, matched on the path the handle currently designates.
    Rename,
    /// `delete`.
    Delete,
    /// `list_directory`.
    List,
    /// `create_directory`, matched on the requested path.
    CreateDirectory,
}

impl FaultOp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "memory.open",
            Self::Read => "memory.read",
            Self::Write => "memory.write",
            Self::Rename => "memory.rename",
            Self::Delete => "memory.delete",
            Self::List => "memory.list_directory",
            Self::CreateDirectory => "memory.create_directory",
        }
    }
}

/// An injected transport failure.
#[derive(Debug, Clone)]
pub struct Fault {
    op: FaultOp,
    path: Option<SharePath>,
    skip: usize,
    once: bool,
}

impl Fault {
    /// Fail every `op` addressed at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when `path` is not a valid share path.
    pub fn new(op: FaultOp, path: &str) -> StoreResult<Self> {
        Ok(Self {
            op,
            path: Some(SharePath::parse(path)?),
            skip: 0,
            once: false,
        })
    }

    /// Fail every `op` regardless of path.
    #[must_use]
    pub const fn any(op: FaultOp) -> Self {
        Self {
            op,
            path: None,
            skip: 0,
            once: false,
        }
    }

    /// Let the first `count` matching calls succeed.
    #[must_use]
    pub const fn after(mut self, count: usize) -> Self {
        self.skip = count;
        self
    }

    /// Remove the fault after it fires once.
    #[must_use]
    pub const fn once(mut self) -> Self {
        self.once = true;
        self
    }

    fn matches(&self, op: FaultOp, path: &SharePath) -> bool {
        self.op == op && self.path.as_ref().is_none_or(|target| target == path)
    }
}

/// A share held entirely in memory.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

struct MemoryState {
    nodes: BTreeMap<SharePath, MemoryNode>,
    handles: HashMap<u64, MemoryHandle>,
    next_handle: u64,
    faults: Vec<Fault>,
    hooks: Vec<CallHook>,
    page_size: usize,
    limits: Option<TransferLimits>,
    write_cap: Option<usize>,
    cross_directory_rename: bool,
    mutations: usize,
}

struct CallHook {
    op: FaultOp,
    path: SharePath,
    action: Box<dyn Fn() + Send>,
}

struct MemoryHandle {
    path: SharePath,
    kind: EntryKind,
    access: AccessMode,
    listing: Option<VecDeque<DirEntry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty share containing only the root directory.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(SharePath::root(), MemoryNode::Directory);
        Self {
            state: Mutex::new(MemoryState {
                nodes,
                handles: HashMap::new(),
                next_handle: 1,
                faults: Vec::new(),
                hooks: Vec::new(),
                page_size: DEFAULT_PAGE_SIZE,
                limits: None,
                write_cap: None,
                cross_directory_rename: true,
                mutations: 0,
            }),
        }
    }

    /// Serve listings in pages of `size` records (minimum one).
    #[must_use]
    pub fn with_page_size(self, size: usize) -> Self {
        self.lock().page_size = size.max(1);
        self
    }

    /// Report negotiated transfer limits.
    #[must_use]
    pub fn with_limits(self, limits: TransferLimits) -> Self {
        self.lock().limits = Some(limits);
        self
    }

    /// Accept at most `cap` bytes per `write` call, producing short writes.
    #[must_use]
    pub fn with_write_cap(self, cap: usize) -> Self {
        self.lock().write_cap = Some(cap.max(1));
        self
    }

    /// Reject renames that change the parent directory with `Unsupported`.
    #[must_use]
    pub fn without_cross_directory_rename(self) -> Self {
        self.lock().cross_directory_rename = false;
        self
    }

    /// Register a fault.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push(fault);
    }

    /// Run `action` whenever `op` is addressed at `path`, before the call proceeds.
    ///
    /// # Errors
    ///
    /// Returns an error when `path` is not a valid share path.
    pub fn on_call(
        &self,
        op: FaultOp,
        path: &str,
        action: impl Fn() + Send + 'static,
    ) -> StoreResult<()> {
        let path = SharePath::parse(path)?;
        self.lock().hooks.push(CallHook {
            op,
            path,
            action: Box::new(action),
        });
        Ok(())
    }

    /// Remove every registered fault.
    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Seed a file, creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid path or when a parent segment is a file.
    pub fn add_file(&self, path: &str, contents: impl AsRef<[u8]>) -> StoreResult<()> {
        let path = SharePath::parse(path)?;
        let parent = path.parent().ok_or_else(|| StoreError::IsADirectory {
            path: path.to_string(),
        })?;
        let mut state = self.lock();
        state.ensure_directories(&parent)?;
        state
            .nodes
            .insert(path, MemoryNode::File(contents.as_ref().to_vec()));
        Ok(())
    }

    /// Seed a directory and its missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid path or when a segment is a file.
    pub fn add_dir(&self, path: &str) -> StoreResult<()> {
        let path = SharePath::parse(path)?;
        self.lock().ensure_directories(&path)
    }

    /// Contents of the file at `path`, if one exists.
    #[must_use]
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        let path = SharePath::parse(path).ok()?;
        match self.lock().nodes.get(&path) {
            Some(MemoryNode::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Whether any entry exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        SharePath::parse(path).is_ok_and(|path| self.lock().nodes.contains_key(&path))
    }

    /// Whether a directory exists at `path`.
    #[must_use]
    pub fn is_dir(&self, path: &str) -> bool {
        SharePath::parse(path)
            .is_ok_and(|path| matches!(self.lock().nodes.get(&path), Some(MemoryNode::Directory)))
    }

    /// Every entry below the root keyed by its path string.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, MemoryNode> {
        self.lock()
            .nodes
            .iter()
            .filter(|(path, _)| !path.is_root())
            .map(|(path, node)| (path.as_str().to_string(), node.clone()))
            .collect()
    }

    /// Entry paths whose final segment starts with `prefix`.
    #[must_use]
    pub fn paths_with_name_prefix(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .nodes
            .keys()
            .filter(|path| path.file_name().is_some_and(|name| name.starts_with(prefix)))
            .map(|path| path.as_str().to_string())
            .collect()
    }

    /// Number of handles currently open.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.lock().handles.len()
    }

    /// Count of successful mutating calls (create, write, rename, delete, mkdir).
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.lock().mutations
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryState {
    fn check_fault(&mut self, op: FaultOp, path: &SharePath) -> StoreResult<()> {
        for hook in self.hooks.iter().filter(|hook| hook.op == op && hook.path == *path) {
            (hook.action)();
        }
        let Some(index) = self.faults.iter().position(|fault| fault.matches(op, path)) else {
            return Ok(());
        };
        let fault = &mut self.faults[index];
        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }
        if fault.once {
            self.faults.remove(index);
        }
        Err(StoreError::Io {
            operation: op.as_str(),
            path: PathBuf::from(path.as_str()),
            source: io::Error::other("injected fault"),
        })
    }

    fn handle(&self, handle: &FileHandle) -> StoreResult<&MemoryHandle> {
        self.handles
            .get(&handle.id())
            .ok_or(StoreError::InvalidHandle { handle: handle.id() })
    }

    fn register(&mut self, path: &SharePath, kind: EntryKind, access: AccessMode) -> FileHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(
            id,
            MemoryHandle {
                path: path.clone(),
                kind,
                access,
                listing: None,
            },
        );
        FileHandle::new(id, path.clone(), kind, access)
    }

    fn ensure_directories(&mut self, path: &SharePath) -> StoreResult<()> {
        for prefix in path.prefixes() {
            match self.nodes.get(&prefix) {
                Some(MemoryNode::Directory) => {}
                Some(MemoryNode::File(_)) => {
                    return Err(StoreError::NotADirectory {
                        path: prefix.to_string(),
                    });
                }
                None => {
                    self.nodes.insert(prefix, MemoryNode::Directory);
                }
            }
        }
        Ok(())
    }

    fn children(&self, dir: &SharePath) -> VecDeque<DirEntry> {
        let mut records = VecDeque::from([
            DirEntry {
                name: ".".to_string(),
                kind: EntryKind::Directory,
                size: 0,
            },
            DirEntry {
                name: "..".to_string(),
                kind: EntryKind::Directory,
                size: 0,
            },
        ]);
        for (path, node) in &self.nodes {
            if path.is_root() || path.parent().as_ref() != Some(dir) {
                continue;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            let (kind, size) = match node {
                MemoryNode::File(data) => (EntryKind::File, data.len() as u64),
                MemoryNode::Directory => (EntryKind::Directory, 0),
            };
            records.push_back(DirEntry {
                name: name.to_string(),
                kind,
                size,
            });
        }
        records
    }

    fn has_children(&self, dir: &SharePath) -> bool {
        self.nodes
            .keys()
            .any(|path| path != dir && path.starts_with(dir))
    }
}

impl RemoteStore for MemoryStore {
    fn open(
        &self,
        path: &SharePath,
        access: AccessMode,
        _share: ShareMode,
        disposition: Disposition,
    ) -> StoreResult<FileHandle> {
        let mut state = self.lock();
        state.check_fault(FaultOp::Open, path)?;

        let existing = state.nodes.get(path).map(|node| match node {
            MemoryNode::File(_) => EntryKind::File,
            MemoryNode::Directory => EntryKind::Directory,
        });
        match (disposition, existing) {
            (Disposition::Open | Disposition::OpenOrCreate, Some(EntryKind::Directory))
                if access == AccessMode::Write =>
            {
                Err(StoreError::IsADirectory {
                    path: path.to_string(),
                })
            }
            (Disposition::Open | Disposition::OpenOrCreate, Some(kind)) => {
                Ok(state.register(path, kind, access))
            }
            (Disposition::Open, None) => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
            (Disposition::Create, Some(_)) => Err(StoreError::AlreadyExists {
                path: path.to_string(),
            }),
            (Disposition::Create | Disposition::OpenOrCreate, None) => {
                let parent = path.parent().ok_or_else(|| StoreError::IsADirectory {
                    path: path.to_string(),
                })?;
                match state.nodes.get(&parent) {
                    Some(MemoryNode::Directory) => {}
                    Some(MemoryNode::File(_)) => {
                        return Err(StoreError::NotADirectory {
                            path: parent.to_string(),
                        });
                    }
                    None => {
                        return Err(StoreError::NotFound {
                            path: parent.to_string(),
                        });
                    }
                }
                state.nodes.insert(path.clone(), MemoryNode::File(Vec::new()));
                state.mutations += 1;
                Ok(state.register(path, EntryKind::File, access))
            }
        }
    }

    fn read(&self, handle: &FileHandle, offset: u64, length: usize) -> StoreResult<ReadOutcome> {
        let mut state = self.lock();
        let entry = state.handle(handle)?;
        if entry.access != AccessMode::Read {
            return Err(StoreError::AccessDenied {
                operation: "read",
                path: entry.path.to_string(),
            });
        }
        let path = entry.path.clone();
        state.check_fault(FaultOp::Read, &path)?;

        let data = match state.nodes.get(&path) {
            Some(MemoryNode::File(data)) => data,
            Some(MemoryNode::Directory) => {
                return Err(StoreError::IsADirectory {
                    path: path.to_string(),
                });
            }
            None => return Err(StoreError::NotFound { path: path.to_string() }),
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start >= data.len() && length > 0 {
            return Ok(ReadOutcome::EndOfFile);
        }
        let end = start.saturating_add(length).min(data.len());
        Ok(ReadOutcome::Data(data[start..end].to_vec()))
    }

    fn write(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> StoreResult<usize> {
        let mut state = self.lock();
        let entry = state.handle(handle)?;
        if entry.access != AccessMode::Write {
            return Err(StoreError::AccessDenied {
                operation: "write",
                path: entry.path.to_string(),
            });
        }
        let path = entry.path.clone();
        state.check_fault(FaultOp::Write, &path)?;

        let accepted = state.write_cap.map_or(data.len(), |cap| cap.min(data.len()));
        let Some(MemoryNode::File(contents)) = state.nodes.get_mut(&path) else {
            return Err(StoreError::NotFound { path: path.to_string() });
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(accepted);
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[start..end].copy_from_slice(&data[..accepted]);
        state.mutations += 1;
        Ok(accepted)
    }

    fn close(&self, handle: FileHandle) {
        self.lock().handles.remove(&handle.id());
    }

    fn rename(
        &self,
        handle: &FileHandle,
        new_path: &SharePath,
        replace_if_exists: bool,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let entry = state.handle(handle)?;
        if entry.access != AccessMode::Delete {
            return Err(StoreError::AccessDenied {
                operation: "rename",
                path: entry.path.to_string(),
            });
        }
        let from = entry.path.clone();
        state.check_fault(FaultOp::Rename, &from)?;

        if from.is_root() || new_path.starts_with(&from) {
            return Err(StoreError::InvalidPath {
                path: new_path.to_string(),
                reason: "rename_into_self",
            });
        }
        let new_parent = new_path.parent().unwrap_or_default();
        if !state.cross_directory_rename && from.parent().as_ref() != Some(&new_parent) {
            return Err(StoreError::Unsupported {
                operation: "rename",
                path: new_path.to_string(),
            });
        }
        if !matches!(state.nodes.get(&new_parent), Some(MemoryNode::Directory)) {
            return Err(StoreError::NotFound {
                path: new_parent.to_string(),
            });
        }
        match state.nodes.get(new_path) {
            None => {}
            Some(MemoryNode::File(_)) if replace_if_exists && entry_is_file(&state, &from) => {}
            Some(_) => {
                return Err(StoreError::AlreadyExists {
                    path: new_path.to_string(),
                });
            }
        }

        let moved: Vec<SharePath> = state
            .nodes
            .keys()
            .filter(|path| path.starts_with(&from))
            .cloned()
            .collect();
        for old in moved {
            if let (Some(node), Some(rest)) = (state.nodes.remove(&old), old.strip_prefix(&from)) {
                state.nodes.insert(new_path.join(&rest), node);
            }
        }
        if let Some(entry) = state.handles.get_mut(&handle.id()) {
            entry.path = new_path.clone();
        }
        state.mutations += 1;
        Ok(())
    }

    fn delete(&self, handle: FileHandle) -> StoreResult<()> {
        let mut state = self.lock();
        let entry = state
            .handles
            .remove(&handle.id())
            .ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
        if entry.access != AccessMode::Delete {
            return Err(StoreError::AccessDenied {
                operation: "delete",
                path: entry.path.to_string(),
            });
        }
        state.check_fault(FaultOp::Delete, &entry.path)?;
        if entry.path.is_root() {
            return Err(StoreError::AccessDenied {
                operation: "delete",
                path: entry.path.to_string(),
            });
        }
        if entry.kind == EntryKind::Directory && state.has_children(&entry.path) {
            return Err(StoreError::DirectoryNotEmpty {
                path: entry.path.to_string(),
            });
        }
        if state.nodes.remove(&entry.path).is_none() {
            return Err(StoreError::NotFound {
                path: entry.path.to_string(),
            });
        }
        state.mutations += 1;
        Ok(())
    }

    fn list_directory(&self, handle: &FileHandle) -> StoreResult<ListingPage> {
        let mut state = self.lock();
        let entry = state.handle(handle)?;
        if entry.kind != EntryKind::Directory {
            return Err(StoreError::NotADirectory {
                path: entry.path.to_string(),
            });
        }
        if entry.access != AccessMode::Read {
            return Err(StoreError::AccessDenied {
                operation: "list_directory",
                path: entry.path.to_string(),
            });
        }
        let path = entry.path.clone();
        let pending = entry.listing.is_some();
        state.check_fault(FaultOp::List, &path)?;

        let fresh = if pending {
            None
        } else {
            Some(state.children(&path))
        };
        let page_size = state.page_size;
        let entry = state
            .handles
            .get_mut(&handle.id())
            .ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
        if let Some(records) = fresh {
            entry.listing = Some(records);
        }
        let listing = entry.listing.get_or_insert_with(VecDeque::new);
        if listing.is_empty() {
            return Ok(ListingPage::End);
        }
        let take = listing.len().min(page_size);
        Ok(ListingPage::Entries(listing.drain(..take).collect()))
    }

    fn create_directory(&self, path: &SharePath) -> StoreResult<()> {
        let mut state = self.lock();
        state.check_fault(FaultOp::CreateDirectory, path)?;
        let before = state.nodes.len();
        state.ensure_directories(path)?;
        if state.nodes.len() != before {
            state.mutations += 1;
        }
        Ok(())
    }

    fn transfer_limits(&self) -> Option<TransferLimits> {
        self.lock().limits
    }
}

fn entry_is_file(state: &MemoryState, path: &SharePath) -> bool {
    matches!(state.nodes.get(path), Some(MemoryNode::File(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type TestResult<T> = anyhow::Result<T>;

    fn path(raw: &str) -> TestResult<SharePath> {
        Ok(SharePath::parse(raw)?)
    }

    fn list_names(store: &MemoryStore, dir: &str) -> TestResult<Vec<String>> {
        let handle = store.open(&path(dir)?, AccessMode::Read, ShareMode::All, Disposition::Open)?;
        let mut names = Vec::new();
        while let ListingPage::Entries(entries) = store.list_directory(&handle)? {
            names.extend(entries.into_iter().map(|entry| entry.name));
        }
        store.close(handle);
        Ok(names)
    }

    #[test]
    fn listing_pages_include_dot_entries() -> TestResult<()> {
        let store = MemoryStore::new().with_page_size(2);
        store.add_file("dir/a.txt", b"a")?;
        store.add_file("dir/b.txt", b"b")?;
        store.add_file("dir/sub/c.txt", b"c")?;

        let names = list_names(&store, "dir")?;
        assert_eq!(names, vec![".", "..", "a.txt", "b.txt", "sub"]);
        assert_eq!(store.open_handles(), 0);
        Ok(())
    }

    #[test]
    fn short_writes_respect_the_cap() -> TestResult<()> {
        let store = MemoryStore::new().with_write_cap(3);
        let handle = store.open(
            &path("out.bin")?,
            AccessMode::Write,
            ShareMode::Exclusive,
            Disposition::Create,
        )?;
        assert_eq!(store.write(&handle, 0, b"abcdef")?, 3);
        assert_eq!(store.write(&handle, 3, b"def")?, 3);
        store.close(handle);
        assert_eq!(store.read_file("out.bin"), Some(b"abcdef".to_vec()));
        Ok(())
    }

    #[test]
    fn faults_fire_after_skips_and_once() -> TestResult<()> {
        let store = MemoryStore::new();
        store.add_file("a.txt", b"a")?;
        store.inject(Fault::new(FaultOp::Open, "a.txt")?.after(1).once());

        let first = store.open(&path("a.txt")?, AccessMode::Read, ShareMode::Read, Disposition::Open)?;
        store.close(first);
        let second = store.open(&path("a.txt")?, AccessMode::Read, ShareMode::Read, Disposition::Open);
        assert!(matches!(second, Err(StoreError::Io { .. })));
        let third = store.open(&path("a.txt")?, AccessMode::Read, ShareMode::Read, Disposition::Open)?;
        store.close(third);
        Ok(())
    }

    #[test]
    fn call_hooks_run_for_matching_calls_only() -> TestResult<()> {
        let store = MemoryStore::new();
        store.add_file("a.txt", b"a")?;
        store.add_file("b.txt", b"b")?;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.on_call(FaultOp::Open, "a.txt", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })?;

        for name in ["a.txt", "b.txt", "a.txt"] {
            let handle = store.open(&path(name)?, AccessMode::Read, ShareMode::Read, Disposition::Open)?;
            store.close(handle);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn cross_directory_rename_can_be_disabled() -> TestResult<()> {
        let store = MemoryStore::new().without_cross_directory_rename();
        store.add_file("src/a.txt", b"a")?;
        store.add_dir("dst")?;

        let handle = store.open(&path("src/a.txt")?, AccessMode::Delete, ShareMode::All, Disposition::Open)?;
        let across = store.rename(&handle, &path("dst/a.txt")?, false);
        assert!(matches!(across, Err(StoreError::Unsupported { .. })));
        store.rename(&handle, &path("src/b.txt")?, false)?;
        store.close(handle);
        assert_eq!(store.read_file("src/b.txt"), Some(b"a".to_vec()));
        Ok(())
    }

    #[test]
    fn directory_rename_moves_descendants() -> TestResult<()> {
        let store = MemoryStore::new();
        store.add_file("src/inner/c.txt", b"c")?;
        store.add_dir("dst")?;

        let handle = store.open(&path("src")?, AccessMode::Delete, ShareMode::All, Disposition::Open)?;
        store.rename(&handle, &path("dst/moved")?, false)?;
        store.close(handle);

        assert_eq!(store.read_file("dst/moved/inner/c.txt"), Some(b"c".to_vec()));
        assert!(!store.exists("src"));
        Ok(())
    }

    #[test]
    fn delete_refuses_non_empty_directories_and_closes_handle() -> TestResult<()> {
        let store = MemoryStore::new();
        store.add_file("full/a.txt", b"a")?;
        let handle = store.open(&path("full")?, AccessMode::Delete, ShareMode::All, Disposition::Open)?;
        assert!(matches!(
            store.delete(handle),
            Err(StoreError::DirectoryNotEmpty { .. })
        ));
        assert_eq!(store.open_handles(), 0);
        Ok(())
    }
}
