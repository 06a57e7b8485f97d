//! Shared memory segment structures and operations

use crate::error::{ShmError, ShmResult};
use crate::header::{ModelOwner, SegmentHeader};
use crate::platform::{attach_segment_mmap, create_segment_mmap, get_current_pid, is_process_alive};
use gz_common::consts::{HEADER_SIZE, PROTOCOL_VERSION};
use gz_common::data::DeviceKind;
use memmap2::MmapMut;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

/// One mapped interface segment: `[SegmentHeader | payload]`.
pub struct SharedMemorySegment {
    /// Interface id
    name: String,
    /// Backing file
    path: PathBuf,
    /// Memory mapping, kept alive for `base`
    mmap: MmapMut,
    base: NonNull<u8>,
}

// SAFETY: the mapping is process-shared memory; every field reachable through
// `&self` is either atomic or guarded by the segment lock word.
unsafe impl Send for SharedMemorySegment {}
unsafe impl Sync for SharedMemorySegment {}

impl SharedMemorySegment {
    fn from_mmap(name: &str, path: &Path, mut mmap: MmapMut) -> ShmResult<Self> {
        let base = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| ShmError::NotFound {
            name: name.to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            mmap,
            base,
        })
    }

    /// Create the segment, or take over a stale one left by a dead creator.
    pub fn create(
        path: &Path,
        name: &str,
        kind: DeviceKind,
        owner: &ModelOwner,
    ) -> ShmResult<Self> {
        let payload_size = kind.payload_size();
        let total_size = HEADER_SIZE + payload_size;

        match create_segment_mmap(path, total_size) {
            Ok(mmap) => {
                let segment = Self::from_mmap(name, path, mmap)?;
                // SAFETY: freshly created, zero-filled file nobody else can
                // have published yet.
                unsafe {
                    SegmentHeader::initialize(
                        segment.header_ptr(),
                        kind,
                        payload_size,
                        owner,
                        get_current_pid(),
                    )
                };
                debug!(segment = name, %kind, total_size, "created segment");
                Ok(segment)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Self::reclaim(path, name, kind, owner)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Decide what to do with a segment that already exists at `path`.
    fn reclaim(path: &Path, name: &str, kind: DeviceKind, owner: &ModelOwner) -> ShmResult<Self> {
        let payload_size = kind.payload_size();
        let total_size = HEADER_SIZE + payload_size;
        let (mmap, len) = attach_segment_mmap(path)?;

        if (len as usize) < HEADER_SIZE {
            // Another creator has not sized the file yet.
            return Err(ShmError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let segment = Self::from_mmap(name, path, mmap)?;
        let header = segment.header();
        let creator = header.creator_pid.load(Ordering::Acquire);

        if header.is_published() {
            if len as usize != total_size || header.payload_size != payload_size as u64 {
                return Err(ShmError::SchemaMismatch {
                    name: name.to_string(),
                    detail: format!(
                        "existing segment holds {} payload bytes, {kind} needs {payload_size}",
                        header.payload_size
                    ),
                });
            }
            if header.kind_tag() != kind.tag() {
                return Err(ShmError::SchemaMismatch {
                    name: name.to_string(),
                    detail: format!("existing segment is {}, not {kind}", header.kind_tag()),
                });
            }
            if header.version != PROTOCOL_VERSION {
                return Err(ShmError::VersionMismatch {
                    name: name.to_string(),
                    expected: PROTOCOL_VERSION,
                    found: header.version,
                });
            }
        } else if len as usize != total_size {
            // Unpublished and sized for something else: leave it to its creator.
            return Err(ShmError::AlreadyExists {
                name: name.to_string(),
            });
        }

        if creator == 0 || is_process_alive(creator) {
            return Err(ShmError::AlreadyExists {
                name: name.to_string(),
            });
        }

        warn!(
            segment = name,
            stale_pid = creator,
            "reclaiming segment left by dead creator"
        );
        header.withdraw();
        // SAFETY: the magic is withdrawn, so no new opener reads the plain
        // fields; the payload is plain numeric data where zero is valid.
        unsafe {
            std::ptr::write_bytes(segment.payload_ptr(), 0, payload_size);
            SegmentHeader::initialize(
                segment.header_ptr(),
                kind,
                payload_size,
                owner,
                get_current_pid(),
            );
        }
        Ok(segment)
    }

    /// Map an existing, published segment and validate it against `kind`.
    pub fn attach(path: &Path, name: &str, kind: DeviceKind) -> ShmResult<Self> {
        let segment = Self::inspect(path, name)?;
        let header = segment.header();

        if header.version != PROTOCOL_VERSION {
            return Err(ShmError::VersionMismatch {
                name: name.to_string(),
                expected: PROTOCOL_VERSION,
                found: header.version,
            });
        }
        let found = header.kind_tag();
        if found != kind.tag() {
            return Err(ShmError::TypeMismatch {
                name: name.to_string(),
                expected: kind.tag().to_string(),
                found,
            });
        }
        let payload_size = kind.payload_size();
        if header.payload_size != payload_size as u64 || segment.len() != HEADER_SIZE + payload_size
        {
            return Err(ShmError::SchemaMismatch {
                name: name.to_string(),
                detail: format!(
                    "declared {} payload bytes in a {} byte file, {kind} needs {payload_size}",
                    header.payload_size,
                    segment.len()
                ),
            });
        }
        Ok(segment)
    }

    /// Map an existing segment, checking only that it is published.
    pub fn inspect(path: &Path, name: &str) -> ShmResult<Self> {
        let not_found = || ShmError::NotFound {
            name: name.to_string(),
        };
        let (mmap, len) = attach_segment_mmap(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => not_found(),
            _ => e.into(),
        })?;
        if (len as usize) < HEADER_SIZE {
            return Err(not_found());
        }
        let segment = Self::from_mmap(name, path, mmap)?;
        if !segment.header().is_published() {
            return Err(not_found());
        }
        Ok(segment)
    }

    /// Interface id.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Get header
    pub fn header(&self) -> &SegmentHeader {
        // SAFETY: every constructor checked the mapping holds a full header;
        // the mapping is page aligned, satisfying the 64 byte alignment.
        unsafe { &*self.header_ptr() }
    }

    fn header_ptr(&self) -> *mut SegmentHeader {
        self.base.as_ptr().cast()
    }

    /// Get payload pointer
    pub fn payload_ptr(&self) -> *mut u8 {
        // SAFETY: mapping is at least HEADER_SIZE bytes.
        unsafe { self.base.as_ptr().add(HEADER_SIZE) }
    }

    /// Withdraw the magic and remove the backing file.
    ///
    /// Existing mappings stay valid until dropped.
    pub fn unlink(&self) -> ShmResult<()> {
        self.header().withdraw();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
