//! Process-shared synchronisation on futex words.
//!
//! Two primitives live inside mapped files:
//!
//! - a mutex word per segment (`0` unlocked, `1` locked, `2` locked with
//!   waiters), so an uncontended lock/unlock pair never enters the kernel
//! - a sequence word used as a broadcast channel: posting bumps it and wakes
//!   every waiter, waiting blocks until it moves past the value seen on entry

use crate::error::{ShmError, ShmResult};
use crate::platform::{futex_wait, futex_wake};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// Acquire the mutex word, blocking indefinitely.
pub fn lock(word: &AtomicU32) -> ShmResult<()> {
    if word
        .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
    {
        return Ok(());
    }
    loop {
        if word.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
            return Ok(());
        }
        futex_wait(word, CONTENDED, None).map_err(|source| ShmError::SemaphoreFailure {
            operation: "lock",
            source,
        })?;
    }
}

/// Acquire the mutex word if it is free.
pub fn try_lock(word: &AtomicU32) -> bool {
    word.compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
}

/// Release the mutex word, waking one waiter if any are queued.
///
/// `name` labels the `NotLocked` error when the word was not held.
pub fn unlock(word: &AtomicU32, name: &str) -> ShmResult<()> {
    match word.swap(UNLOCKED, Ordering::Release) {
        UNLOCKED => Err(ShmError::NotLocked {
            name: name.to_string(),
        }),
        LOCKED => Ok(()),
        _ => futex_wake(word, 1)
            .map(|_| ())
            .map_err(|source| ShmError::SemaphoreFailure {
                operation: "unlock",
                source,
            }),
    }
}

/// Bump a sequence word and wake everyone blocked on it.
pub fn broadcast(word: &AtomicU32) -> ShmResult<u32> {
    let seq = word.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
    futex_wake(word, u32::MAX).map_err(|source| ShmError::SemaphoreFailure {
        operation: "post",
        source,
    })?;
    Ok(seq)
}

/// Block until a sequence word moves away from `seen` or `timeout` elapses.
///
/// Returns whether the word moved.
pub fn wait_for_change(word: &AtomicU32, seen: u32, timeout: Option<Duration>) -> ShmResult<bool> {
    if word.load(Ordering::Acquire) != seen {
        return Ok(true);
    }
    futex_wait(word, seen, timeout).map_err(|source| ShmError::SemaphoreFailure {
        operation: "wait",
        source,
    })?;
    Ok(word.load(Ordering::Acquire) != seen)
}
