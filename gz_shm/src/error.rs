//! Error types for shared memory interface operations

use thiserror::Error;

/// Errors that can occur during interface, server or client operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// A live server already owns the namespace
    #[error("Server {server_id} is already running")]
    AlreadyRunning {
        /// Server id
        server_id: u32,
    },

    /// Segment or namespace not found, or not yet published
    #[error("Not found: {name}")]
    NotFound {
        /// Segment or namespace name
        name: String,
    },

    /// Segment already created by a live process
    #[error("Segment already exists: {name}")]
    AlreadyExists {
        /// Segment name
        name: String,
    },

    /// Declared size or kind disagrees with the existing segment
    #[error("Schema mismatch on {name}: {detail}")]
    SchemaMismatch {
        /// Segment name
        name: String,
        /// What disagreed
        detail: String,
    },

    /// Segment written by a different protocol version
    #[error("Protocol version mismatch on {name}: expected {expected:#06x}, found {found:#06x}")]
    VersionMismatch {
        /// Segment name
        name: String,
        /// Version of this library
        expected: u32,
        /// Version stored in the segment
        found: u32,
    },

    /// Segment holds a different device kind
    #[error("Type mismatch on {name}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Segment name
        name: String,
        /// Requested kind tag
        expected: String,
        /// Stored kind tag
        found: String,
    },

    /// Client slot held by a live process
    #[error("Client id {client_id} is already in use")]
    IdInUse {
        /// Requested client id
        client_id: u32,
    },

    /// Client id outside the slot table
    #[error("Invalid client id {client_id}")]
    InvalidClientId {
        /// Requested client id
        client_id: u32,
    },

    /// Interface id unusable as a segment name
    #[error("Invalid interface id {id:?}")]
    InvalidId {
        /// Rejected id
        id: String,
    },

    /// A bounded ring or table is full
    #[error("{what} is full (capacity {capacity})")]
    CapacityExceeded {
        /// Which container
        what: &'static str,
        /// Its capacity
        capacity: usize,
    },

    /// Futex wait/wake failed with an unexpected errno
    #[error("Semaphore {operation} failed: {source}")]
    SemaphoreFailure {
        /// Operation that failed
        operation: &'static str,
        /// Source OS error
        source: std::io::Error,
    },

    /// Only the creating handle may destroy a segment
    #[error("Handle did not create {name}")]
    NotCreator {
        /// Segment name
        name: String,
    },

    /// Unlock of a lock word that is not held
    #[error("Lock on {name} is not held")]
    NotLocked {
        /// Segment name
        name: String,
    },

    /// The server finalized while a client was waiting
    #[error("Server {server_id} shut down")]
    ServerShutdown {
        /// Server id
        server_id: u32,
    },

    /// No simulation response arrived in time
    #[error("No response to {request} before timeout")]
    ResponseTimeout {
        /// Request tag
        request: String,
    },

    /// Simulation run state change not allowed
    #[error("Invalid simulation state transition {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
