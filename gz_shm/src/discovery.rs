//! Namespace discovery and stale segment cleanup

use crate::control::Channel;
use crate::error::{ShmError, ShmResult};
use crate::namespace::{Namespace, is_segment_name};
use crate::platform::is_process_alive;
use crate::segment::SharedMemorySegment;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

/// Header summary of one published interface
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    /// Interface id
    pub id: String,
    /// Kind tag
    pub kind: String,
    /// Protocol version of the creator
    pub version: u32,
    /// Live non-creator opens
    pub open_count: u32,
    /// Posts since creation
    pub post_count: u32,
    /// Last update time (s)
    pub time: f64,
    /// Creating process
    pub creator_pid: u32,
    /// Whether the creating process is still alive
    pub creator_alive: bool,
    /// Owning model type, empty if none
    pub model_type: String,
    /// Owning model id
    pub model_id: i32,
    /// Parent model id
    pub parent_model_id: i32,
    /// Declared payload size in bytes
    pub payload_size: u64,
}

impl InterfaceInfo {
    fn read(segment: &SharedMemorySegment) -> Self {
        let header = segment.header();
        let creator_pid = header.creator_pid.load(Ordering::Acquire);
        let owner = header.owner();
        Self {
            id: segment.name().to_string(),
            kind: header.kind_tag(),
            version: header.version,
            open_count: header.open_count.load(Ordering::Acquire),
            post_count: header.post_seq.load(Ordering::Acquire),
            time: header.time(),
            creator_pid,
            creator_alive: is_process_alive(creator_pid),
            model_type: owner.model_type.to_string(),
            model_id: owner.model_id,
            parent_model_id: owner.parent_model_id,
            payload_size: header.payload_size,
        }
    }
}

/// Discovery statistics
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Published interfaces
    pub total_interfaces: usize,
    /// Interfaces whose creator is alive
    pub live_interfaces: usize,
    /// Sum of open counts
    pub total_opens: u64,
    /// Interfaces left by dead creators
    pub stale_interfaces: usize,
}

/// Read-only view over the interfaces of one namespace.
#[derive(Debug, Clone)]
pub struct InterfaceDiscovery {
    namespace: Namespace,
}

impl InterfaceDiscovery {
    /// Discovery over `namespace`.
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    /// The scanned namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Whether a live server owns the namespace.
    pub fn server_live(&self) -> bool {
        Channel::attach(&self.namespace).is_ok_and(|channel| channel.block().is_live())
    }

    /// All published interfaces, sorted by id. Unpublished or unreadable
    /// files are skipped; a missing namespace lists nothing.
    pub fn list_interfaces(&self) -> ShmResult<Vec<InterfaceInfo>> {
        let dir = self.namespace.dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            if !is_segment_name(Path::new(&file_name)) {
                continue;
            }
            let Some(id) = file_name.to_str() else {
                continue;
            };
            match SharedMemorySegment::inspect(&entry.path(), id) {
                Ok(segment) => found.push(InterfaceInfo::read(&segment)),
                Err(e) => debug!(interface = id, error = %e, "skipping unreadable segment"),
            }
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    /// Header summary of interface `id`, if published.
    pub fn find_interface(&self, id: &str) -> ShmResult<Option<InterfaceInfo>> {
        let path = self.namespace.segment_path(id)?;
        match SharedMemorySegment::inspect(&path, id) {
            Ok(segment) => Ok(Some(InterfaceInfo::read(&segment))),
            Err(ShmError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove every segment whose creator is dead, and the control block if
    /// its server is gone. Returns the number of segments removed.
    pub fn cleanup_stale(&self) -> ShmResult<usize> {
        let mut removed = 0;
        for info in self.list_interfaces()? {
            if info.creator_alive {
                continue;
            }
            let path = self.namespace.segment_path(&info.id)?;
            match SharedMemorySegment::inspect(&path, &info.id) {
                Ok(segment) => {
                    segment.unlink()?;
                    warn!(interface = %info.id, stale_pid = info.creator_pid, "removed stale segment");
                    removed += 1;
                }
                Err(ShmError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if self.namespace.control_path().exists() && !self.server_live() {
            match std::fs::remove_file(self.namespace.control_path()) {
                Ok(()) => warn!(server_id = self.namespace.server_id(), "removed stale control block"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            if std::fs::remove_dir(self.namespace.dir()).is_ok() {
                debug!(dir = %self.namespace.dir().display(), "removed empty namespace");
            }
        }
        if removed > 0 {
            info!(server_id = self.namespace.server_id(), removed, "stale cleanup finished");
        }
        Ok(removed)
    }

    /// Counts over the current listing.
    pub fn statistics(&self) -> ShmResult<DiscoveryStats> {
        let interfaces = self.list_interfaces()?;
        let live_interfaces = interfaces.iter().filter(|i| i.creator_alive).count();
        Ok(DiscoveryStats {
            total_interfaces: interfaces.len(),
            live_interfaces,
            total_opens: interfaces.iter().map(|i| u64::from(i.open_count)).sum(),
            stale_interfaces: interfaces.len() - live_interfaces,
        })
    }
}
