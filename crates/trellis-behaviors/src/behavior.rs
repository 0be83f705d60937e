//! The behavior attach/detach state machine.
//!
//! A behavior is a reusable unit of interactive logic bound to exactly one
//! host element at a time. Concrete behaviors embed a [`BehaviorBase`] and
//! implement [`Behavior`], overriding the lifecycle hooks they care about;
//! the `attach`/`detach` state machine itself is provided by the trait and is
//! not meant to be overridden.
//!
//! State machine: `Unattached` → [`Behavior::attach`] → `Attached` →
//! [`Behavior::detach`] → `Unattached`. Attaching to the host the behavior is
//! already attached to is a no-op; attaching to a *different* host while
//! attached is a contract violation ([`Error::AlreadyAttached`]). Detaching
//! runs [`Behavior::on_detaching`] *before* the host reference is cleared, so
//! teardown code can still reach the host; detaching while unattached is a
//! silent no-op and does not invoke the hook.
//!
//! # Example
//!
//! ```
//! use trellis_behaviors::{Behavior, BehaviorBase};
//! use trellis_core::global_registry;
//!
//! struct FocusLogger {
//!     base: BehaviorBase,
//! }
//!
//! impl FocusLogger {
//!     fn new() -> Self {
//!         Self {
//!             base: BehaviorBase::new(),
//!         }
//!     }
//! }
//!
//! impl Behavior for FocusLogger {
//!     fn behavior_base(&self) -> &BehaviorBase {
//!         &self.base
//!     }
//!
//!     fn behavior_base_mut(&mut self) -> &mut BehaviorBase {
//!         &mut self.base
//!     }
//!
//!     fn on_attached(&mut self) {
//!         println!("attached to {:?}", self.base.associated_object());
//!     }
//! }
//!
//! let host = global_registry().create();
//! let mut behavior = FocusLogger::new();
//! behavior.attach(host).unwrap();
//! assert_eq!(behavior.base.associated_object(), Some(host));
//! behavior.detach();
//! assert_eq!(behavior.base.associated_object(), None);
//! ```

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::Key as _;
use trellis_core::ElementId;

use crate::error::{Error, Result};

/// A behavior shared between its owner (a collection) and its subscribers.
///
/// Reference identity of the `Arc` is what the duplicate-rejection invariant
/// of [`BehaviorCollection`](crate::BehaviorCollection) is defined over.
pub type SharedBehavior = Arc<Mutex<dyn Behavior>>;

/// Wrap a concrete behavior for use in a collection.
pub fn shared_behavior<B: Behavior>(behavior: B) -> SharedBehavior {
    Arc::new(Mutex::new(behavior))
}

/// Common state for implementing [`Behavior`].
///
/// Embed this as a field in a concrete behavior and return it from
/// [`Behavior::behavior_base`] / [`Behavior::behavior_base_mut`].
#[derive(Debug)]
pub struct BehaviorBase {
    /// The host this behavior is attached to, if any.
    associated: Option<ElementId>,
}

impl BehaviorBase {
    /// Create a new, unattached base.
    pub fn new() -> Self {
        Self { associated: None }
    }

    /// The host this behavior is attached to, or `None` while unattached.
    pub fn associated_object(&self) -> Option<ElementId> {
        self.associated
    }

    /// Whether the behavior is currently attached.
    pub fn is_attached(&self) -> bool {
        self.associated.is_some()
    }

    pub(crate) fn set_associated(&mut self, host: Option<ElementId>) {
        self.associated = host;
    }
}

impl Default for BehaviorBase {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit of attach/detach-scoped interactive logic.
///
/// # Required Methods
///
/// Implementors provide [`behavior_base()`](Self::behavior_base) /
/// [`behavior_base_mut()`](Self::behavior_base_mut) for access to the
/// underlying [`BehaviorBase`].
///
/// # Lifecycle Hooks
///
/// All hooks default to no-ops. Override the ones the behavior needs:
///
/// - [`on_attached`](Self::on_attached): acquire event subscriptions, capture
///   initial state. The host is already recorded in the base.
/// - [`on_detaching`](Self::on_detaching): release everything acquired in
///   `on_attached`. The host is still readable from the base.
/// - Tree/load hooks ([`on_attached_to_visual_tree`](Self::on_attached_to_visual_tree)
///   and friends): delivered by the owning collection only while the behavior
///   is attached, in the order attach → zero or more tree-attach/tree-detach
///   pairs → detach.
///
/// # Do Not Override
///
/// [`attach`](Self::attach) and [`detach`](Self::detach) implement the state
/// machine and are provided for all behaviors.
pub trait Behavior: Any + Send {
    /// Get a reference to the behavior's base.
    fn behavior_base(&self) -> &BehaviorBase;

    /// Get a mutable reference to the behavior's base.
    fn behavior_base_mut(&mut self) -> &mut BehaviorBase;

    /// Called after the behavior has been attached to a host.
    fn on_attached(&mut self) {}

    /// Called before the host reference is cleared during detach.
    fn on_detaching(&mut self) {}

    /// Called when the attached host enters the visual tree.
    fn on_attached_to_visual_tree(&mut self) {}

    /// Called when the attached host leaves the visual tree.
    fn on_detached_from_visual_tree(&mut self) {}

    /// Called when the attached host enters the logical tree.
    fn on_attached_to_logical_tree(&mut self) {}

    /// Called when the attached host leaves the logical tree.
    fn on_detached_from_logical_tree(&mut self) {}

    /// Called when the attached host has loaded.
    fn on_loaded(&mut self) {}

    /// Called when the attached host is unloading.
    fn on_unloaded(&mut self) {}

    /// Attach this behavior to a host.
    ///
    /// - Attaching to the host the behavior is already attached to is a
    ///   no-op; the [`on_attached`](Self::on_attached) hook is not re-run.
    /// - Attaching to a different host while attached fails with
    ///   [`Error::AlreadyAttached`] and leaves the association unchanged.
    /// - A null host fails with [`Error::NullHost`].
    fn attach(&mut self, host: ElementId) -> Result<()> {
        if host.is_null() {
            return Err(Error::NullHost);
        }
        match self.behavior_base().associated_object() {
            Some(current) if current == host => return Ok(()),
            Some(_) => return Err(Error::AlreadyAttached),
            None => {}
        }
        self.behavior_base_mut().set_associated(Some(host));
        tracing::trace!(target: "trellis_behaviors::behavior", ?host, "behavior attached");
        self.on_attached();
        Ok(())
    }

    /// Detach this behavior from its host.
    ///
    /// Runs [`on_detaching`](Self::on_detaching) while the host reference is
    /// still readable, then clears it. Detaching while unattached is a silent
    /// no-op; the hook is invoked at most once per attach.
    fn detach(&mut self) {
        if !self.behavior_base().is_attached() {
            return;
        }
        self.on_detaching();
        let host = self.behavior_base().associated_object();
        self.behavior_base_mut().set_associated(None);
        tracing::trace!(target: "trellis_behaviors::behavior", ?host, "behavior detached");
    }
}

static_assertions::assert_impl_all!(SharedBehavior: Send, Sync);
