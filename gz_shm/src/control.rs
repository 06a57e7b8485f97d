//! Server control block: liveness, broadcast channel and client slots.

use crate::error::{ShmError, ShmResult};
use crate::namespace::Namespace;
use crate::platform::{attach_segment_mmap, create_segment_mmap, get_current_pid, is_process_alive};
use crate::sync;
use gz_common::consts::{MAX_CLIENTS, PROTOCOL_VERSION, SERVER_MAGIC};
use memmap2::MmapMut;
use static_assertions::const_assert_eq;
use std::io::ErrorKind;
use std::ptr::{NonNull, addr_of_mut};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Layout of `<namespace>/.server`.
#[repr(C, align(64))]
pub struct ControlBlock {
    /// `SERVER_MAGIC` once published
    pub magic: AtomicU64,
    /// Protocol version of the server
    pub version: u32,
    /// Server process id
    pub owner_pid: AtomicU32,
    /// Broadcast sequence word
    pub post_seq: AtomicU32,
    /// 1 while the server runs
    pub running: AtomicU32,
    _pad: [u32; 2],
    /// Pid holding each client id, 0 when free
    pub clients: [AtomicU32; MAX_CLIENTS],
    _reserved: [u8; 32],
}

const_assert_eq!(size_of::<ControlBlock>(), 128);

impl ControlBlock {
    fn is_published(&self) -> bool {
        self.magic.load(Ordering::Acquire) == SERVER_MAGIC
    }

    /// Whether the server is running and its process is alive.
    pub fn is_live(&self) -> bool {
        self.is_published()
            && self.running.load(Ordering::Acquire) != 0
            && is_process_alive(self.owner_pid.load(Ordering::Acquire))
    }
}

/// Handle on a mapped control block.
pub struct Channel {
    server_id: u32,
    _mmap: MmapMut,
    block: NonNull<ControlBlock>,
}

// SAFETY: the control block only holds atomics after publication.
unsafe impl Send for Channel {}
unsafe impl Sync for Channel {}

impl Channel {
    fn from_mmap(server_id: u32, mut mmap: MmapMut) -> ShmResult<Self> {
        let block = NonNull::new(mmap.as_mut_ptr().cast::<ControlBlock>()).ok_or_else(|| {
            ShmError::NotFound {
                name: format!("server {server_id}"),
            }
        })?;
        Ok(Self {
            server_id,
            _mmap: mmap,
            block,
        })
    }

    /// Create and publish the control block of `ns`.
    ///
    /// An existing block owned by a live server is `AlreadyRunning` unless
    /// `force` is set; a block left by a dead server is replaced.
    pub fn create(ns: &Namespace, force: bool) -> ShmResult<Self> {
        let path = ns.control_path();
        std::fs::create_dir_all(ns.dir())?;

        let mmap = match create_segment_mmap(&path, size_of::<ControlBlock>()) {
            Ok(mmap) => mmap,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Self::retire_existing(ns, force)?;
                create_segment_mmap(&path, size_of::<ControlBlock>())?
            }
            Err(e) => return Err(e.into()),
        };

        let channel = Self::from_mmap(ns.server_id(), mmap)?;
        let block = channel.block.as_ptr();
        // SAFETY: freshly created zero-filled file, magic not yet published.
        unsafe {
            addr_of_mut!((*block).version).write(PROTOCOL_VERSION);
            (*block).owner_pid.store(get_current_pid(), Ordering::Relaxed);
            (*block).running.store(1, Ordering::Relaxed);
            (*block).magic.store(SERVER_MAGIC, Ordering::Release);
        }
        Ok(channel)
    }

    /// Shut down and unlink a previous control block so a new one can be
    /// created in its place.
    fn retire_existing(ns: &Namespace, force: bool) -> ShmResult<()> {
        let path = ns.control_path();
        match Self::attach(ns) {
            Ok(old) => {
                let block = old.block();
                let owner = block.owner_pid.load(Ordering::Acquire);
                if block.is_live() {
                    if !force {
                        return Err(ShmError::AlreadyRunning {
                            server_id: ns.server_id(),
                        });
                    }
                    tracing::warn!(server_id = ns.server_id(), owner, "forcing takeover of live server");
                } else {
                    tracing::warn!(server_id = ns.server_id(), owner, "replacing stale control block");
                }
                // Release anyone still blocked on the old block; its owner
                // sees the withdrawn magic and leaves the new file alone.
                block.running.store(0, Ordering::Release);
                block.magic.store(0, Ordering::Release);
                old.post()?;
            }
            Err(ShmError::NotFound { .. }) | Err(ShmError::VersionMismatch { .. }) => {
                if !force {
                    return Err(ShmError::AlreadyRunning {
                        server_id: ns.server_id(),
                    });
                }
                tracing::warn!(server_id = ns.server_id(), "removing unreadable control block");
            }
            Err(e) => return Err(e),
        }
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Map the published control block of `ns`.
    pub fn attach(ns: &Namespace) -> ShmResult<Self> {
        let name = format!("server {}", ns.server_id());
        let (mmap, len) = attach_segment_mmap(&ns.control_path()).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ShmError::NotFound { name: name.clone() },
            _ => e.into(),
        })?;
        if (len as usize) < size_of::<ControlBlock>() {
            return Err(ShmError::NotFound { name });
        }
        let channel = Self::from_mmap(ns.server_id(), mmap)?;
        let block = channel.block();
        if !block.is_published() {
            return Err(ShmError::NotFound { name });
        }
        if block.version != PROTOCOL_VERSION {
            return Err(ShmError::VersionMismatch {
                name,
                expected: PROTOCOL_VERSION,
                found: block.version,
            });
        }
        Ok(channel)
    }

    /// Server id.
    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    /// The mapped block.
    pub fn block(&self) -> &ControlBlock {
        // SAFETY: constructors checked the mapping is a full block.
        unsafe { self.block.as_ref() }
    }

    /// Whether this block is still the published one, i.e. no forced
    /// takeover replaced it.
    pub(crate) fn is_current(&self) -> bool {
        self.block().is_published()
    }

    /// Whether the server still runs.
    pub fn is_running(&self) -> bool {
        self.block().running.load(Ordering::Acquire) != 0
    }

    /// Current broadcast sequence.
    pub fn seq(&self) -> u32 {
        self.block().post_seq.load(Ordering::Acquire)
    }

    /// Signal "data changed" to every waiting client.
    pub fn post(&self) -> ShmResult<()> {
        sync::broadcast(&self.block().post_seq).map(|_| ())
    }

    /// Block until the sequence moves past `seen`; `ServerShutdown` once the
    /// server stops running.
    pub fn wait_after(&self, seen: u32, timeout: Option<Duration>) -> ShmResult<bool> {
        loop {
            if !self.is_running() {
                return Err(ShmError::ServerShutdown {
                    server_id: self.server_id,
                });
            }
            let moved = sync::wait_for_change(&self.block().post_seq, seen, timeout)?;
            if !self.is_running() {
                return Err(ShmError::ServerShutdown {
                    server_id: self.server_id,
                });
            }
            if moved || timeout.is_some() {
                return Ok(moved);
            }
        }
    }

    /// Claim client slot `client_id` for this process.
    pub fn register(&self, client_id: u32) -> ShmResult<()> {
        let slot = self
            .block()
            .clients
            .get(client_id as usize)
            .ok_or(ShmError::InvalidClientId { client_id })?;
        let pid = get_current_pid();
        let mut current = 0;
        loop {
            match slot.compare_exchange(current, pid, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    if current != 0 {
                        tracing::warn!(client_id, stale_pid = current, "reclaimed client slot");
                    }
                    return Ok(());
                }
                Err(holder) if holder != 0 && is_process_alive(holder) => {
                    return Err(ShmError::IdInUse { client_id });
                }
                Err(holder) => current = holder,
            }
        }
    }

    /// Release client slot `client_id` if this process holds it.
    pub fn unregister(&self, client_id: u32) {
        if let Some(slot) = self.block().clients.get(client_id as usize) {
            let _ = slot.compare_exchange(
                get_current_pid(),
                0,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    /// Mark the server stopped and wake every waiter.
    pub(crate) fn shutdown(&self) -> ShmResult<()> {
        self.block().running.store(0, Ordering::Release);
        self.post()
    }
}
