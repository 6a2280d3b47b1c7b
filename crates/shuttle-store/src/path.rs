//! Share-relative path type used by every store operation.
//!
//! # Design
//! - Paths are always relative to the share root; the empty path is the root itself.
//! - Segments are stored `/`-joined; `\` is accepted on input and normalised.
//! - Absolute inputs and `..` segments are rejected at parse time so callers never
//!   have to re-validate a `SharePath`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

const SEPARATOR: char = '/';
const INPUT_SEPARATORS: [char; 2] = ['/', '\\'];

/// Validated path relative to the root of a share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SharePath(String);

impl SharePath {
    /// The share root.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Parse a caller-supplied path.
    ///
    /// Empty segments and `.` are dropped; `..`, NUL bytes, leading separators and
    /// drive prefixes are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] when the input is absolute or escapes the share.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        if raw.starts_with(INPUT_SEPARATORS) || has_drive_prefix(raw) {
            return Err(StoreError::InvalidPath {
                path: raw.to_string(),
                reason: "absolute",
            });
        }

        let mut segments = Vec::new();
        for segment in raw.split(INPUT_SEPARATORS) {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(StoreError::InvalidPath {
                        path: raw.to_string(),
                        reason: "parent_segment",
                    });
                }
                other if other.contains('\0') => {
                    return Err(StoreError::InvalidPath {
                        path: raw.to_string(),
                        reason: "nul_byte",
                    });
                }
                other => segments.push(other),
            }
        }

        Ok(Self(segments.join("/")))
    }

    /// Borrow the normalised `/`-joined representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path designates the share root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the path segments from the root downwards.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|segment| !segment.is_empty())
    }

    /// Final segment of the path, `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit(SEPARATOR).next()
    }

    /// Containing directory, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(
            self.0
                .rfind(SEPARATOR)
                .map_or_else(Self::root, |index| Self(self.0[..index].to_string())),
        )
    }

    /// Append a relative path.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        match (self.is_root(), other.is_root()) {
            (_, true) => self.clone(),
            (true, false) => other.clone(),
            (false, false) => Self(format!("{}{SEPARATOR}{}", self.0, other.0)),
        }
    }

    /// Append a single entry name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] when `name` is empty, contains a separator,
    /// or is a `.`/`..` segment.
    pub fn join_name(&self, name: &str) -> StoreResult<Self> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(INPUT_SEPARATORS)
            || name.contains('\0')
        {
            return Err(StoreError::InvalidPath {
                path: name.to_string(),
                reason: "invalid_name",
            });
        }
        Ok(self.join(&Self(name.to_string())))
    }

    /// Replace the final segment with `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] for the root or an invalid `name`.
    pub fn with_file_name(&self, name: &str) -> StoreResult<Self> {
        let parent = self.parent().ok_or_else(|| StoreError::InvalidPath {
            path: self.0.clone(),
            reason: "root_has_no_name",
        })?;
        parent.join_name(name)
    }

    /// Whether `base` is this path or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, base: &Self) -> bool {
        base.is_root()
            || self.0 == base.0
            || (self.0.starts_with(&base.0) && self.0[base.0.len()..].starts_with(SEPARATOR))
    }

    /// Path of `self` below `base`, or `None` when `base` is not an ancestor.
    #[must_use]
    pub fn strip_prefix(&self, base: &Self) -> Option<Self> {
        if base.is_root() {
            return Some(self.clone());
        }
        if self.0 == base.0 {
            return Some(Self::root());
        }
        self.0
            .strip_prefix(&base.0)
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .map(|rest| Self(rest.to_string()))
    }

    /// Every non-root prefix of the path, shortest first (`a`, `a/b`, `a/b/c`).
    #[must_use]
    pub fn prefixes(&self) -> Vec<Self> {
        let mut current = Self::root();
        self.segments()
            .map(|segment| {
                current = current.join(&Self(segment.to_string()));
                current.clone()
            })
            .collect()
    }
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl Display for SharePath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            formatter.write_str("/")
        } else {
            formatter.write_str(&self.0)
        }
    }
}

impl FromStr for SharePath {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for SharePath {
    type Error = StoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<SharePath> for String {
    fn from(path: SharePath) -> Self {
        path.0
    }
}
