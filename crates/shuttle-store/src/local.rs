//! Share backend rooted in a local directory.
//!
//! # Design
//! - Maps share paths segment-by-segment below a canonical root so no input can escape it.
//! - Keeps open files and listing cursors behind store-issued handle ids.
//! - Emits `.`/`..` in listings and pages results, matching what share clients return.

use std::collections::{HashMap, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    AccessMode, DirEntry, Disposition, EntryKind, FileHandle, ListingPage, ReadOutcome, ShareMode,
    TransferLimits,
};
use crate::path::SharePath;
use crate::store::RemoteStore;

/// Number of records returned per `list_directory` call.
pub const LISTING_PAGE_SIZE: usize = 64;

/// A share whose root is a directory on the local filesystem.
pub struct LocalStore {
    root: PathBuf,
    limits: Option<TransferLimits>,
    next_handle: AtomicU64,
    handles: Mutex<HashMap<u64, LocalHandle>>,
}

struct LocalHandle {
    path: SharePath,
    kind: EntryKind,
    access: AccessMode,
    file: Option<File>,
    listing: Option<VecDeque<DirEntry>>,
}

impl LocalStore {
    /// Open a share rooted at `root`, which must be an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error when `root` cannot be resolved or is not a directory.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|source| StoreError::io("local.canonicalize_root", root, source))?;
        if !canonical.is_dir() {
            return Err(StoreError::NotADirectory {
                path: canonical.display().to_string(),
            });
        }
        Ok(Self {
            root: canonical,
            limits: None,
            next_handle: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Report fixed transfer limits, as a negotiated session would.
    #[must_use]
    pub fn with_limits(mut self, limits: TransferLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Canonical local directory backing the share root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of handles currently open.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.lock_handles().len()
    }

    fn local_path(&self, path: &SharePath) -> PathBuf {
        let mut local = self.root.clone();
        for segment in path.segments() {
            local.push(segment);
        }
        local
    }

    fn lock_handles(&self) -> MutexGuard<'_, HashMap<u64, LocalHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(
        &self,
        path: &SharePath,
        kind: EntryKind,
        access: AccessMode,
        file: Option<File>,
    ) -> FileHandle {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.lock_handles().insert(
            id,
            LocalHandle {
                path: path.clone(),
                kind,
                access,
                file,
                listing: None,
            },
        );
        FileHandle::new(id, path.clone(), kind, access)
    }

    fn open_existing(
        &self,
        path: &SharePath,
        local: &Path,
        metadata: &fs::Metadata,
        access: AccessMode,
    ) -> StoreResult<FileHandle> {
        if metadata.is_dir() {
            if access == AccessMode::Write {
                return Err(StoreError::IsADirectory {
                    path: path.to_string(),
                });
            }
            return Ok(self.register(path, EntryKind::Directory, access, None));
        }

        let file = match access {
            AccessMode::Read => Some(
                File::open(local).map_err(|source| map_io("local.open_read", path, local, source))?,
            ),
            AccessMode::Write => Some(
                OpenOptions::new()
                    .write(true)
                    .open(local)
                    .map_err(|source| map_io("local.open_write", path, local, source))?,
            ),
            AccessMode::Delete => None,
        };
        Ok(self.register(path, EntryKind::File, access, file))
    }

    fn create_file(
        &self,
        path: &SharePath,
        local: &Path,
        access: AccessMode,
    ) -> StoreResult<FileHandle> {
        let parent = path.parent().ok_or_else(|| StoreError::IsADirectory {
            path: path.to_string(),
        })?;
        match fs::metadata(self.local_path(&parent)) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(StoreError::NotADirectory {
                    path: parent.to_string(),
                });
            }
            Err(_) => {
                return Err(StoreError::NotFound {
                    path: parent.to_string(),
                });
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(local)
            .map_err(|source| map_io("local.create", path, local, source))?;
        debug!(path = %path, "created file");
        Ok(self.register(path, EntryKind::File, access, Some(file)))
    }
}

impl RemoteStore for LocalStore {
    fn open(
        &self,
        path: &SharePath,
        access: AccessMode,
        _share: ShareMode,
        disposition: Disposition,
    ) -> StoreResult<FileHandle> {
        let local = self.local_path(path);
        let existing = match fs::metadata(&local) {
            Ok(metadata) => Some(metadata),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(source) => return Err(StoreError::io("local.stat", &local, source)),
        };

        match (disposition, existing) {
            (Disposition::Open | Disposition::OpenOrCreate, Some(metadata)) => {
                self.open_existing(path, &local, &metadata, access)
            }
            (Disposition::Open, None) => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
            (Disposition::Create, Some(_)) => Err(StoreError::AlreadyExists {
                path: path.to_string(),
            }),
            (Disposition::Create | Disposition::OpenOrCreate, None) => {
                self.create_file(path, &local, access)
            }
        }
    }

    fn read(&self, handle: &FileHandle, offset: u64, length: usize) -> StoreResult<ReadOutcome> {
        let mut handles = self.lock_handles();
        let entry = handles
            .get_mut(&handle.id())
            .ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
        if entry.kind == EntryKind::Directory {
            return Err(StoreError::IsADirectory {
                path: entry.path.to_string(),
            });
        }
        if entry.access != AccessMode::Read {
            return Err(StoreError::AccessDenied {
                operation: "read",
                path: entry.path.to_string(),
            });
        }
        let local = self.local_path(&entry.path);
        let file = entry.file.as_mut().ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| StoreError::io("local.read.seek", &local, source))?;
        let mut buffer = vec![0_u8; length];
        let read = file
            .read(&mut buffer)
            .map_err(|source| StoreError::io("local.read", &local, source))?;
        if read == 0 && length > 0 {
            return Ok(ReadOutcome::EndOfFile);
        }
        buffer.truncate(read);
        Ok(ReadOutcome::Data(buffer))
    }

    fn write(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> StoreResult<usize> {
        let mut handles = self.lock_handles();
        let entry = handles
            .get_mut(&handle.id())
            .ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
        if entry.access != AccessMode::Write {
            return Err(StoreError::AccessDenied {
                operation: "write",
                path: entry.path.to_string(),
            });
        }
        let local = self.local_path(&entry.path);
        let file = entry.file.as_mut().ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| StoreError::io("local.write.seek", &local, source))?;
        file.write(data)
            .map_err(|source| StoreError::io("local.write", &local, source))
    }

    fn close(&self, handle: FileHandle) {
        if self.lock_handles().remove(&handle.id()).is_none() {
            warn!(handle = handle.id(), path = %handle.path(), "close of unknown handle");
        }
    }

    fn rename(
        &self,
        handle: &FileHandle,
        new_path: &SharePath,
        replace_if_exists: bool,
    ) -> StoreResult<()> {
        let mut handles = self.lock_handles();
        let entry = handles
            .get_mut(&handle.id())
            .ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
        if entry.access != AccessMode::Delete {
            return Err(StoreError::AccessDenied {
                operation: "rename",
                path: entry.path.to_string(),
            });
        }

        let from = self.local_path(&entry.path);
        let to = self.local_path(new_path);
        if !replace_if_exists && fs::symlink_metadata(&to).is_ok() {
            return Err(StoreError::AlreadyExists {
                path: new_path.to_string(),
            });
        }
        let parent = new_path.parent().unwrap_or_default();
        if !self.local_path(&parent).is_dir() {
            return Err(StoreError::NotFound {
                path: parent.to_string(),
            });
        }

        fs::rename(&from, &to).map_err(|source| map_io("local.rename", new_path, &to, source))?;
        debug!(from = %entry.path, to = %new_path, "renamed entry");
        entry.path = new_path.clone();
        Ok(())
    }

    fn delete(&self, handle: FileHandle) -> StoreResult<()> {
        let entry = self
            .lock_handles()
            .remove(&handle.id())
            .ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
        if entry.access != AccessMode::Delete {
            return Err(StoreError::AccessDenied {
                operation: "delete",
                path: entry.path.to_string(),
            });
        }
        let local = self.local_path(&entry.path);
        drop(entry.file);

        let result = match entry.kind {
            EntryKind::Directory => fs::remove_dir(&local),
            EntryKind::File => fs::remove_file(&local),
        };
        result.map_err(|source| match source.kind() {
            io::ErrorKind::DirectoryNotEmpty => StoreError::DirectoryNotEmpty {
                path: entry.path.to_string(),
            },
            _ => map_io("local.delete", &entry.path, &local, source),
        })
    }

    fn list_directory(&self, handle: &FileHandle) -> StoreResult<ListingPage> {
        let mut handles = self.lock_handles();
        let entry = handles
            .get_mut(&handle.id())
            .ok_or(StoreError::InvalidHandle { handle: handle.id() })?;
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

        if entry.listing.is_none() {
            let local = self.local_path(&entry.path);
            entry.listing = Some(read_listing(&local)?);
        }
        let pending = entry.listing.get_or_insert_with(VecDeque::new);
        if pending.is_empty() {
            return Ok(ListingPage::End);
        }
        let take = pending.len().min(LISTING_PAGE_SIZE);
        Ok(ListingPage::Entries(pending.drain(..take).collect()))
    }

    fn create_directory(&self, path: &SharePath) -> StoreResult<()> {
        for prefix in path.prefixes() {
            let local = self.local_path(&prefix);
            match fs::metadata(&local) {
                Ok(metadata) if metadata.is_dir() => {}
                Ok(_) => {
                    return Err(StoreError::NotADirectory {
                        path: prefix.to_string(),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    match fs::create_dir(&local) {
                        Ok(()) => debug!(path = %prefix, "created directory"),
                        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                        Err(source) => {
                            return Err(StoreError::io("local.create_directory", &local, source));
                        }
                    }
                }
                Err(source) => {
                    return Err(StoreError::io("local.create_directory.stat", &local, source));
                }
            }
        }
        Ok(())
    }

    fn transfer_limits(&self) -> Option<TransferLimits> {
        self.limits
    }
}

fn read_listing(local: &Path) -> StoreResult<VecDeque<DirEntry>> {
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

    let reader =
        fs::read_dir(local).map_err(|source| StoreError::io("local.read_dir", local, source))?;
    for item in reader {
        let item = item.map_err(|source| StoreError::io("local.read_dir.entry", local, source))?;
        let Ok(name) = item.file_name().into_string() else {
            warn!(path = %item.path().display(), "skipping entry with non-utf8 name");
            continue;
        };
        let metadata = fs::metadata(item.path())
            .map_err(|source| StoreError::io("local.read_dir.stat", item.path(), source))?;
        let (kind, size) = if metadata.is_dir() {
            (EntryKind::Directory, 0)
        } else {
            (EntryKind::File, metadata.len())
        };
        records.push_back(DirEntry { name, kind, size });
    }
    Ok(records)
}

fn map_io(
    operation: &'static str,
    path: &SharePath,
    local: &Path,
    source: io::Error,
) -> StoreError {
    match source.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound {
            path: path.to_string(),
        },
        io::ErrorKind::AlreadyExists => StoreError::AlreadyExists {
            path: path.to_string(),
        },
        _ => StoreError::io(operation, local, source),
    }
}
