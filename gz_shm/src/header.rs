//! Common segment header.
//!
//! Every interface segment starts with this 256 byte block. The creator fills
//! it in while `magic` is still zero and stores the magic last with release
//! ordering; openers load the magic with acquire ordering before trusting any
//! other field.

use crate::error::{ShmError, ShmResult};
use gz_common::consts::{HEADER_SIZE, IFACE_MAGIC, KIND_TAG_LEN, MAX_MODEL_TYPE, PROTOCOL_VERSION};
use gz_common::data::{DeviceKind, read_cstr, write_cstr};
use serde::Serialize;
use static_assertions::const_assert_eq;
use std::mem::offset_of;
use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Ownership metadata recorded in the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelOwner {
    /// Type of the owning model (bounded to the header field).
    pub model_type: heapless::String<{ MAX_MODEL_TYPE - 1 }>,
    /// Owning model id, -1 if none.
    pub model_id: i32,
    /// Parent model id, -1 if none.
    pub parent_model_id: i32,
}

impl Default for ModelOwner {
    fn default() -> Self {
        Self::none()
    }
}

impl ModelOwner {
    /// No owning model.
    pub fn none() -> Self {
        Self {
            model_type: heapless::String::new(),
            model_id: -1,
            parent_model_id: -1,
        }
    }

    /// Ownership by a model of the given type.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` if `model_type` does not fit the header field.
    pub fn new(model_type: &str, model_id: i32, parent_model_id: i32) -> ShmResult<Self> {
        let mut bounded = heapless::String::new();
        bounded
            .push_str(model_type)
            .map_err(|_| ShmError::CapacityExceeded {
                what: "model type",
                capacity: MAX_MODEL_TYPE - 1,
            })?;
        Ok(Self {
            model_type: bounded,
            model_id,
            parent_model_id,
        })
    }
}

/// Header at offset 0 of every interface segment.
#[repr(C, align(64))]
pub struct SegmentHeader {
    /// `IFACE_MAGIC` once published, zero before
    pub magic: AtomicU64,
    /// Protocol version of the creator
    pub version: u32,
    /// NUL-padded kind tag
    pub kind: [u8; KIND_TAG_LEN],
    /// Interface mutex word
    pub lock: AtomicU32,
    /// Live non-creator opens
    pub open_count: AtomicU32,
    /// Bumped by every post
    pub post_seq: AtomicU32,
    /// Last update time, `f64` bits
    pub time_bits: AtomicU64,
    /// Declared payload size
    pub payload_size: u64,
    /// Owning model id
    pub model_id: i32,
    /// Parent model id
    pub parent_model_id: i32,
    /// Pid of the creating process
    pub creator_pid: AtomicU32,
    _pad0: u32,
    /// NUL-terminated owning model type
    pub model_type: [u8; MAX_MODEL_TYPE],
    _reserved: [u8; 56],
}

const_assert_eq!(size_of::<SegmentHeader>(), HEADER_SIZE);
const_assert_eq!(offset_of!(SegmentHeader, kind), 12);
const_assert_eq!(offset_of!(SegmentHeader, lock), 28);
const_assert_eq!(offset_of!(SegmentHeader, time_bits), 40);
const_assert_eq!(offset_of!(SegmentHeader, creator_pid), 64);
const_assert_eq!(offset_of!(SegmentHeader, model_type), 72);

impl SegmentHeader {
    /// Fill in an unpublished header and publish it.
    ///
    /// # Safety
    ///
    /// `this` must point to a mapped, writable header whose magic is zero, so
    /// that no other handle reads the plain fields concurrently.
    pub(crate) unsafe fn initialize(
        this: *mut Self,
        kind: DeviceKind,
        payload_size: usize,
        owner: &ModelOwner,
        creator_pid: u32,
    ) {
        unsafe {
            (*this).lock.store(0, Ordering::Relaxed);
            (*this).open_count.store(0, Ordering::Relaxed);
            (*this).post_seq.store(0, Ordering::Relaxed);
            (*this).time_bits.store(0f64.to_bits(), Ordering::Relaxed);
            (*this).creator_pid.store(creator_pid, Ordering::Relaxed);

            addr_of_mut!((*this).version).write(PROTOCOL_VERSION);
            addr_of_mut!((*this).kind).write(kind.encode_tag());
            addr_of_mut!((*this).payload_size).write(payload_size as u64);
            addr_of_mut!((*this).model_id).write(owner.model_id);
            addr_of_mut!((*this).parent_model_id).write(owner.parent_model_id);
            let mut model_type = [0u8; MAX_MODEL_TYPE];
            write_cstr(&mut model_type, &owner.model_type);
            addr_of_mut!((*this).model_type).write(model_type);

            (*this).magic.store(IFACE_MAGIC, Ordering::Release);
        }
    }

    /// Whether the creator has finished initialising the segment.
    pub fn is_published(&self) -> bool {
        self.magic.load(Ordering::Acquire) == IFACE_MAGIC
    }

    /// Withdraw the magic so new openers treat the segment as absent.
    pub(crate) fn withdraw(&self) {
        self.magic.store(0, Ordering::Release);
    }

    /// Stored kind tag.
    pub fn kind_tag(&self) -> String {
        read_cstr(&self.kind)
    }

    /// Last update time.
    pub fn time(&self) -> f64 {
        f64::from_bits(self.time_bits.load(Ordering::Acquire))
    }

    /// Stamp the last update time.
    pub fn set_time(&self, time: f64) {
        self.time_bits.store(time.to_bits(), Ordering::Release);
    }

    /// Ownership metadata. Oversized model types are truncated.
    pub fn owner(&self) -> ModelOwner {
        let text = read_cstr(&self.model_type);
        let mut model_type = heapless::String::new();
        for ch in text.chars() {
            if model_type.push(ch).is_err() {
                break;
            }
        }
        ModelOwner {
            model_type,
            model_id: self.model_id,
            parent_model_id: self.parent_model_id,
        }
    }

    /// Decrement the open count without going below zero.
    pub(crate) fn release_open(&self) -> u32 {
        let previous = self
            .open_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_rejects_long_model_type() {
        let long = "x".repeat(MAX_MODEL_TYPE);
        assert!(matches!(
            ModelOwner::new(&long, 1, -1),
            Err(ShmError::CapacityExceeded { .. })
        ));
        let owner = ModelOwner::new("pioneer2dx", 3, 1).unwrap();
        assert_eq!(owner.model_type.as_str(), "pioneer2dx");
    }

    #[test]
    fn initialize_publishes_last() {
        let mut storage = Box::new(std::mem::MaybeUninit::<SegmentHeader>::zeroed());
        let ptr = storage.as_mut_ptr();
        // SAFETY: zeroed atomics and integers are valid.
        assert!(!unsafe { &*ptr }.is_published());

        let owner = ModelOwner::new("pioneer2dx", 7, 2).unwrap();
        unsafe { SegmentHeader::initialize(ptr, DeviceKind::Laser, 8276, &owner, 42) };

        let header = unsafe { &*ptr };
        assert!(header.is_published());
        assert_eq!(header.version, PROTOCOL_VERSION);
        assert_eq!(header.kind_tag(), "laser");
        assert_eq!(header.payload_size, 8276);
        assert_eq!(header.owner(), owner);
        assert_eq!(header.creator_pid.load(Ordering::Relaxed), 42);

        header.withdraw();
        assert!(!header.is_published());
    }

    #[test]
    fn open_count_saturates() {
        let storage = Box::new(std::mem::MaybeUninit::<SegmentHeader>::zeroed());
        // SAFETY: zeroed atomics and integers are valid.
        let header = unsafe { storage.assume_init_ref() };
        assert_eq!(header.release_open(), 0);
        header.open_count.fetch_add(2, Ordering::AcqRel);
        assert_eq!(header.release_open(), 1);
    }
}
