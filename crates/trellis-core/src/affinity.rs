//! Thread-affinity verification for UI-bound state.
//!
//! Trellis is single-threaded and cooperative: attach/detach and action
//! execution are expected to run on the UI toolkit's dispatcher thread. The
//! library does not take locks to defend against concurrent mutation; instead,
//! structures that must stay on one thread carry a [`ThreadAffinity`] and
//! assert it in debug builds.
//!
//! ```
//! use trellis_core::ThreadAffinity;
//!
//! struct Widget {
//!     affinity: ThreadAffinity,
//! }
//!
//! impl Widget {
//!     fn new() -> Self {
//!         Self {
//!             affinity: ThreadAffinity::current(),
//!         }
//!     }
//!
//!     fn update(&self) {
//!         self.affinity.debug_assert_same_thread();
//!         // ... safe to mutate ...
//!     }
//! }
//! ```

use std::thread::ThreadId;

/// Records the thread a value was created on so later accesses can be checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadAffinity {
    thread: ThreadId,
}

impl ThreadAffinity {
    /// Capture the current thread as the owning thread.
    pub fn current() -> Self {
        Self {
            thread: std::thread::current().id(),
        }
    }

    /// Check whether the calling thread is the owning thread.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread
    }

    /// Panic in debug builds if called from a thread other than the owner.
    ///
    /// Release builds perform no check.
    #[inline]
    #[track_caller]
    pub fn debug_assert_same_thread(&self) {
        debug_assert!(
            self.is_same_thread(),
            "accessed from a thread other than the owning (UI) thread"
        );
    }
}
