//! Protocol constants.
//!
//! These constants are part of the binary contract between the server and
//! every client process. Changing any of them (or any payload layout in
//! [`crate::data`]) requires bumping [`PROTOCOL_VERSION`].

/// Interface protocol version stored in every segment header.
///
/// Openers refuse segments carrying a different value.
pub const PROTOCOL_VERSION: u32 = 0x0072;

/// Magic value identifying a published interface segment (`"GZIFACE\0"`).
pub const IFACE_MAGIC: u64 = u64::from_le_bytes(*b"GZIFACE\0");

/// Magic value identifying a server control block (`"GZSERVE\0"`).
pub const SERVER_MAGIC: u64 = u64::from_le_bytes(*b"GZSERVE\0");

/// Size of the common segment header in bytes.
pub const HEADER_SIZE: usize = 256;

/// Capacity of the kind tag field (including the NUL terminator).
pub const KIND_TAG_LEN: usize = 16;

/// Capacity of the owning model type field (including the NUL terminator).
pub const MAX_MODEL_TYPE: usize = 128;

/// Maximum length of an interface id (one path component).
pub const MAX_IFACE_ID: usize = 255;

/// Prefix of the per-server namespace directory (`<root>/gz-<server_id>`).
pub const NAMESPACE_PREFIX: &str = "gz-";

/// File name of the server control block inside a namespace directory.
pub const CONTROL_FILE: &str = ".server";

/// Default directory holding namespace directories.
pub const DEFAULT_SHM_ROOT: &str = "/dev/shm";

// ─── Client ids ─────────────────────────────────────────────────────

/// Number of client registration slots in a server control block.
pub const MAX_CLIENTS: usize = 16;

/// First client id free for user programs.
pub const CLIENT_ID_USER_FIRST: u32 = 0x00;

/// Last client id free for user programs (inclusive).
pub const CLIENT_ID_USER_LAST: u32 = 0x07;

/// Client id reserved for the GUI viewer.
pub const CLIENT_ID_VIEWER: u32 = 0x08;

/// Client id reserved for the player bridge.
pub const CLIENT_ID_PLAYER: u32 = 0x09;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_values_differ() {
        assert_ne!(IFACE_MAGIC, SERVER_MAGIC);
        assert_ne!(IFACE_MAGIC, 0);
    }

    #[test]
    fn reserved_ids_fit_in_slot_table() {
        assert!(CLIENT_ID_USER_LAST < CLIENT_ID_VIEWER);
        assert!((CLIENT_ID_PLAYER as usize) < MAX_CLIENTS);
        assert_eq!(CLIENT_ID_USER_FIRST, 0);
    }
}
