//! Host substrate for Trellis.
//!
//! This crate provides the in-process contract between an embedding UI toolkit
//! and the Trellis behavior framework:
//!
//! - **Element Model**: Arena-backed element identities, parent-child
//!   relationships, and an attached-value side table for auxiliary state
//! - **Signal/Slot System**: Synchronous, type-safe change notification
//! - **Event Kinds**: A closed enumeration of host events (lifecycle and
//!   input) with per-element signals — the typed replacement for
//!   subscribe-by-event-name
//! - **Tree Lifecycle**: Mount/unmount of subtrees with ordered lifecycle
//!   event delivery
//! - **Thread Affinity**: Debug assertions that UI-bound state stays on the
//!   thread that created it
//!
//! # Signal Example
//!
//! ```
//! use trellis_core::{EventKind, global_registry};
//!
//! let registry = global_registry();
//! let button = registry.create();
//!
//! registry
//!     .signals(button)
//!     .unwrap()
//!     .event(EventKind::Loaded)
//!     .connect(|args| {
//!         println!("loaded: {:?}", args.sender);
//!     });
//!
//! registry.mount(button).unwrap();
//! ```

mod affinity;
mod element;
mod error;
mod event;
mod signal;

pub use affinity::ThreadAffinity;
pub use element::{
    ElementId, ElementRegistry, SharedElementRegistry, global_registry,
};
pub use error::{ElementError, ElementResult};
pub use event::{ElementSignals, EventArgs, EventKind};
pub use signal::{ConnectionId, Signal};

/// Install a fmt subscriber for test runs, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
