//! Platform layer: file-backed mappings, futex words and process liveness.
//!
//! Everything above this module is portable; the futex calls degrade to
//! short sleeps on hosts without `SYS_futex`.

pub mod linux;

pub use linux::{
    attach_segment_mmap, create_segment_mmap, futex_wait, futex_wake, get_current_pid,
    is_process_alive,
};
