//! Error types for the behavior framework.

use trellis_core::ElementError;

/// Result type alias for behavior operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the behavior framework.
///
/// Contract violations (attaching to a second host, inserting a duplicate
/// instance) fail fast at the point of violation; benign lifecycle redundancy
/// (re-attach to the same host, detach while detached) is a no-op and never
/// reported here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A null element ID was passed where a live host is required.
    #[error("cannot attach to a null host")]
    NullHost,

    /// The behavior is already attached to a different host.
    #[error("behavior is already attached to a different host; a behavior can only be attached to a single host at a time")]
    AlreadyAttached,

    /// The collection is already attached to a different host.
    #[error("behavior collection is already attached to a different host")]
    CollectionAlreadyAttached,

    /// The same behavior instance was inserted into a collection twice.
    #[error("cannot add the same behavior instance to a collection more than once")]
    DuplicateBehavior,

    /// An index was out of bounds for the collection.
    #[error("index {index} is out of bounds for a collection of length {len}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The collection length at the time of the call.
        len: usize,
    },

    /// The host element does not exist in the registry.
    #[error("host element not found in the registry")]
    HostNotFound,

    /// A host registry operation failed.
    #[error("host element error: {0}")]
    Element(#[from] ElementError),

    /// A concrete action reported a failure.
    #[error("action failed: {0}")]
    Action(String),
}

impl Error {
    /// Create an action-failure error.
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }
}
