//! Linux-specific shared memory operations

use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Exclusively create the backing file and map it.
///
/// Fails with `ErrorKind::AlreadyExists` if the file is already present; the
/// caller decides whether the existing segment may be reused. The new file is
/// zero-filled by the kernel.
pub fn create_segment_mmap(path: &Path, size: usize) -> io::Result<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600) // Owner read/write only
        .open(path)?;

    file.set_len(size as u64)?;

    // SAFETY: the mapping is shared with other processes on purpose; all
    // access goes through atomics or the segment lock.
    unsafe { MmapOptions::new().len(size).map_mut(&file) }
}

/// Attach to an existing backing file, returning the mapping and file length.
pub fn attach_segment_mmap(path: &Path) -> io::Result<(MmapMut, u64)> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();

    // SAFETY: see `create_segment_mmap`.
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok((mmap, len))
}

/// Block while `word` holds `expected`.
///
/// Spurious wakeups, `EAGAIN` (value already changed), `EINTR` and timeouts
/// all return `Ok`; callers re-check their condition in a loop.
#[cfg(target_os = "linux")]
pub fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> io::Result<()> {
    let ts = timeout.map(|t| libc::timespec {
        tv_sec: t.as_secs() as libc::time_t,
        tv_nsec: t.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(std::ptr::null(), |t| t as *const libc::timespec);

    // Non-private futex: the word lives in a mapping shared across processes.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT,
            expected,
            ts_ptr,
            std::ptr::null::<u32>(),
            0u32,
        )
    };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EAGAIN) | Some(libc::EINTR) | Some(libc::ETIMEDOUT) => Ok(()),
        _ => Err(err),
    }
}

/// Wake up to `count` waiters blocked on `word`, returning how many woke.
#[cfg(target_os = "linux")]
pub fn futex_wake(word: &AtomicU32, count: u32) -> io::Result<usize> {
    let count = count.min(i32::MAX as u32);
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE,
            count,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rc as usize)
}

#[cfg(not(target_os = "linux"))]
const POLL_SLICE: Duration = Duration::from_micros(200);

/// Polling fallback: sleep briefly while `word` holds `expected`.
#[cfg(not(target_os = "linux"))]
pub fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> io::Result<()> {
    use std::sync::atomic::Ordering;

    if word.load(Ordering::Acquire) == expected {
        let nap = timeout.map_or(POLL_SLICE, |t| t.min(POLL_SLICE));
        std::thread::sleep(nap);
    }
    Ok(())
}

/// Polling fallback: waiters notice the changed word on their next poll.
#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_word: &AtomicU32, _count: u32) -> io::Result<usize> {
    Ok(0)
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if pid == 0 {
        return false;
    }
    // Null signal tests for existence without delivering anything
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::Error::ESRCH) => false, // No such process
        Err(nix::Error::EPERM) => true,  // Process exists but no permission to signal
        Err(_) => false,
    }
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}
