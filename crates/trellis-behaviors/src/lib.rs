//! Attached behaviors for Trellis.
//!
//! A behavior is a reusable unit of interactive logic attached to a host
//! element instead of being coded into it. This crate provides the attachment
//! lifecycle around that idea:
//!
//! - **Behaviors**: The [`Behavior`] trait and [`BehaviorBase`] state machine
//!   (attach, detach, lifecycle hooks)
//! - **Collections**: [`BehaviorCollection`], an ordered per-host list whose
//!   structural edits attach and detach exactly the affected members
//! - **Triggers and Actions**: [`EventTrigger`] fires an ordered
//!   [`ActionCollection`] when its host raises an event
//! - **The Attachment Point**: [`behaviors`] / [`set_behaviors`] bind a
//!   collection to an element and wire it to the host's mount/unmount
//!   lifecycle
//!
//! # Example
//!
//! ```
//! use trellis_behaviors::{EventTrigger, FnAction, Trigger, behaviors, shared_action, shared_behavior};
//! use trellis_core::{EventKind, global_registry};
//!
//! let registry = global_registry();
//! let button = registry.create();
//!
//! // A trigger that reacts to pointer presses on the button.
//! let trigger = EventTrigger::new(EventKind::PointerPressed);
//! trigger.actions().lock().push(shared_action(FnAction::new(|sender, _| {
//!     println!("pressed: {:?}", sender);
//!     Ok(None)
//! })));
//!
//! behaviors(button)
//!     .unwrap()
//!     .lock()
//!     .push(shared_behavior(trigger))
//!     .unwrap();
//!
//! // Mounting the button attaches the collection; the trigger now fires.
//! registry.mount(button).unwrap();
//! registry.raise_event(button, EventKind::PointerPressed, None).unwrap();
//! ```

mod action;
mod behavior;
mod collection;
mod error;
mod interaction;
mod subscriptions;
mod trigger;

pub use action::{
    Action, ActionCollection, ActionOutput, FnAction, SharedAction, SharedActionCollection,
    shared_action,
};
pub use behavior::{Behavior, BehaviorBase, SharedBehavior, shared_behavior};
pub use collection::{BehaviorCollection, SharedBehaviorCollection};
pub use error::{Error, Result};
pub use interaction::{behaviors, execute_actions, set_behaviors};
pub use subscriptions::Subscriptions;
pub use trigger::{EventTrigger, Trigger, TriggerBase};

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
