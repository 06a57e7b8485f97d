//! Per-server namespace: where the control block and segments live.

use crate::error::{ShmError, ShmResult};
use gz_common::config::ShmConfig;
use gz_common::consts::{CONTROL_FILE, MAX_IFACE_ID, NAMESPACE_PREFIX};
use std::path::{Path, PathBuf};

/// `<root>/gz-<server_id>` and the names inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    root: PathBuf,
    server_id: u32,
}

impl Namespace {
    /// Namespace of `server_id` under the configured root.
    pub fn new(config: &ShmConfig, server_id: u32) -> Self {
        Self {
            root: config.root.clone(),
            server_id,
        }
    }

    /// Server id.
    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    /// Namespace directory.
    pub fn dir(&self) -> PathBuf {
        self.root.join(format!("{NAMESPACE_PREFIX}{}", self.server_id))
    }

    /// Control block path.
    pub fn control_path(&self) -> PathBuf {
        self.dir().join(CONTROL_FILE)
    }

    /// Backing file of interface `id`.
    ///
    /// # Errors
    ///
    /// `InvalidId` if `id` cannot be used as a single file name.
    pub fn segment_path(&self, id: &str) -> ShmResult<PathBuf> {
        validate_id(id)?;
        Ok(self.dir().join(id))
    }

    /// Whether the namespace directory exists.
    pub fn exists(&self) -> bool {
        self.dir().is_dir()
    }
}

/// Interface ids are single path components: non-empty, at most
/// `MAX_IFACE_ID` bytes, no `/` or NUL, and not starting with `.` (reserved
/// for the control block).
pub fn validate_id(id: &str) -> ShmResult<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_IFACE_ID
        && !id.starts_with('.')
        && !id.contains(['/', '\0']);
    if valid {
        Ok(())
    } else {
        Err(ShmError::InvalidId { id: id.to_string() })
    }
}

/// Whether a directory entry name is an interface segment.
pub(crate) fn is_segment_name(name: &Path) -> bool {
    name.to_str().is_some_and(|n| validate_id(n).is_ok())
}
