//! The attachment point: binding behavior collections to host elements.
//!
//! [`behaviors`] and [`set_behaviors`] manage the one behavior collection an
//! element may carry, stored in the element's attached-value side table. The
//! first time an element gets a collection, this module wires the element's
//! lifecycle signals to it:
//!
//! - visual-tree attachment attaches the collection (and so every member) to
//!   the element, then forwards the notification;
//! - visual-tree detachment forwards the notification, then detaches the
//!   collection;
//! - logical-tree and load/unload events are forwarded to attached members.
//!
//! The wiring is installed once per element and looks the collection up at
//! event time, so swapping collections with [`set_behaviors`] does not leak
//! stale subscriptions. A collection set on an already-mounted element is
//! attached immediately rather than waiting for the next mount.

use std::sync::Arc;

use slotmap::Key as _;
use trellis_core::{ElementId, EventKind, global_registry};

use crate::collection::{BehaviorCollection, SharedBehaviorCollection};
use crate::error::{Error, Result};

pub use crate::action::execute_actions;

/// Attached-value key under which an element's collection is stored.
const BEHAVIORS_KEY: &str = "trellis.behaviors";
/// Attached-value marker recording that lifecycle wiring is installed.
const WIRED_KEY: &str = "trellis.behaviors.wired";

/// Get the behavior collection for `host`, creating an empty one on first
/// access.
///
/// The returned handle is shared with the element: behaviors pushed through
/// it are picked up by the lifecycle wiring. Fails with [`Error::NullHost`]
/// for the null ID and [`Error::HostNotFound`] if the element does not exist.
pub fn behaviors(host: ElementId) -> Result<SharedBehaviorCollection> {
    if host.is_null() {
        return Err(Error::NullHost);
    }
    let registry = global_registry();
    if !registry.contains(host) {
        return Err(Error::HostNotFound);
    }

    if let Some(existing) =
        registry.attached_value::<SharedBehaviorCollection>(host, BEHAVIORS_KEY)?
    {
        return Ok(existing);
    }

    let collection = BehaviorCollection::shared();
    registry.set_attached_value(host, BEHAVIORS_KEY, collection.clone())?;
    ensure_wired(host)?;
    tracing::debug!(
        target: "trellis_behaviors::interaction",
        ?host,
        "created behavior collection"
    );
    Ok(collection)
}

/// Set or clear the behavior collection for `host`.
///
/// Replacing a collection detaches the old one (and all its members) first.
/// Setting the collection the element already carries is a no-op. If the
/// element is currently mounted, the new collection is attached immediately;
/// otherwise it attaches on the next visual-tree attachment.
pub fn set_behaviors(host: ElementId, collection: Option<SharedBehaviorCollection>) -> Result<()> {
    if host.is_null() {
        return Err(Error::NullHost);
    }
    let registry = global_registry();
    if !registry.contains(host) {
        return Err(Error::HostNotFound);
    }

    let old = registry.attached_value::<SharedBehaviorCollection>(host, BEHAVIORS_KEY)?;

    if let (Some(old), Some(new)) = (&old, &collection) {
        if Arc::ptr_eq(old, new) {
            return Ok(());
        }
    }

    if let Some(old) = old {
        old.lock().detach();
    }

    match collection {
        Some(new) => {
            registry.set_attached_value(host, BEHAVIORS_KEY, new.clone())?;
            ensure_wired(host)?;
            if registry.is_mounted(host)? {
                new.lock().attach(host)?;
            }
            tracing::debug!(
                target: "trellis_behaviors::interaction",
                ?host,
                "behavior collection set"
            );
        }
        None => {
            registry.remove_attached_value(host, BEHAVIORS_KEY)?;
            tracing::debug!(
                target: "trellis_behaviors::interaction",
                ?host,
                "behavior collection cleared"
            );
        }
    }
    Ok(())
}

/// The collection currently carried by `host`, if any.
fn current_collection(host: ElementId) -> Option<SharedBehaviorCollection> {
    global_registry()
        .attached_value::<SharedBehaviorCollection>(host, BEHAVIORS_KEY)
        .ok()
        .flatten()
}

/// Install the lifecycle wiring for `host`, once.
///
/// Each handler resolves the element's *current* collection at event time, so
/// the wiring survives collection swaps and never holds a collection alive.
fn ensure_wired(host: ElementId) -> Result<()> {
    let registry = global_registry();
    if registry.attached_value::<bool>(host, WIRED_KEY)?.is_some() {
        return Ok(());
    }
    registry.set_attached_value(host, WIRED_KEY, true)?;

    let signals = registry.signals(host)?;

    signals.event(EventKind::AttachedToVisualTree).connect(move |args| {
        if let Some(collection) = current_collection(args.sender) {
            let mut collection = collection.lock();
            if let Err(err) = collection.attach(args.sender) {
                tracing::error!(
                    target: "trellis_behaviors::interaction",
                    host = ?args.sender,
                    %err,
                    "failed to attach behavior collection"
                );
                return;
            }
            collection.notify_attached_to_visual_tree();
        }
    });

    signals.event(EventKind::DetachedFromVisualTree).connect(move |args| {
        if let Some(collection) = current_collection(args.sender) {
            let mut collection = collection.lock();
            collection.notify_detached_from_visual_tree();
            collection.detach();
        }
    });

    signals.event(EventKind::AttachedToLogicalTree).connect(move |args| {
        if let Some(collection) = current_collection(args.sender) {
            collection.lock().notify_attached_to_logical_tree();
        }
    });

    signals.event(EventKind::DetachedFromLogicalTree).connect(move |args| {
        if let Some(collection) = current_collection(args.sender) {
            collection.lock().notify_detached_from_logical_tree();
        }
    });

    signals.event(EventKind::Loaded).connect(move |args| {
        if let Some(collection) = current_collection(args.sender) {
            collection.lock().notify_loaded();
        }
    });

    signals.event(EventKind::Unloaded).connect(move |args| {
        if let Some(collection) = current_collection(args.sender) {
            collection.lock().notify_unloaded();
        }
    });

    tracing::trace!(
        target: "trellis_behaviors::interaction",
        ?host,
        "lifecycle wiring installed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{FnAction, shared_action};
    use crate::behavior::test_support::CountingBehavior;
    use crate::behavior::shared_behavior;
    use crate::trigger::{EventTrigger, Trigger};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn behaviors_is_lazy_and_stable() {
        let host = global_registry().create();

        let first = behaviors(host).unwrap();
        let second = behaviors(host).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.lock().is_empty());
    }

    #[test]
    fn null_and_unknown_hosts_rejected() {
        assert!(matches!(
            behaviors(ElementId::default()),
            Err(Error::NullHost)
        ));

        let registry = global_registry();
        let doomed = registry.create();
        registry.destroy(doomed).unwrap();
        assert!(matches!(behaviors(doomed), Err(Error::HostNotFound)));
    }

    #[test]
    fn mount_attaches_and_unmount_detaches() {
        let registry = global_registry();
        let host = registry.create();

        let collection = behaviors(host).unwrap();
        let (behavior, counters) = CountingBehavior::shared();
        collection.lock().push(behavior).unwrap();

        assert_eq!(counters.attach_count(), 0);

        registry.mount(host).unwrap();
        assert_eq!(counters.attach_count(), 1);
        assert_eq!(counters.visual_attach.load(Ordering::SeqCst), 1);
        assert_eq!(counters.loaded.load(Ordering::SeqCst), 1);
        assert_eq!(collection.lock().associated_object(), Some(host));

        registry.unmount(host).unwrap();
        assert_eq!(counters.unloaded.load(Ordering::SeqCst), 1);
        assert_eq!(counters.visual_detach.load(Ordering::SeqCst), 1);
        assert_eq!(counters.detach_count(), 1);
        assert_eq!(collection.lock().associated_object(), None);
    }

    #[test]
    fn remount_reattaches() {
        let registry = global_registry();
        let host = registry.create();

        let collection = behaviors(host).unwrap();
        let (behavior, counters) = CountingBehavior::shared();
        collection.lock().push(behavior).unwrap();

        registry.mount(host).unwrap();
        registry.unmount(host).unwrap();
        registry.mount(host).unwrap();

        assert_eq!(counters.attach_count(), 2);
        assert_eq!(counters.detach_count(), 1);

        registry.unmount(host).unwrap();
        assert_eq!(counters.detach_count(), 2);
    }

    #[test]
    fn mount_reaches_whole_subtree() {
        let registry = global_registry();
        let root = registry.create();
        let child = registry.create();
        registry.set_parent(child, Some(root)).unwrap();

        let (root_behavior, root_counters) = CountingBehavior::shared();
        behaviors(root).unwrap().lock().push(root_behavior).unwrap();
        let (child_behavior, child_counters) = CountingBehavior::shared();
        behaviors(child)
            .unwrap()
            .lock()
            .push(child_behavior)
            .unwrap();

        registry.mount(root).unwrap();

        assert_eq!(root_counters.attach_count(), 1);
        assert_eq!(child_counters.attach_count(), 1);

        registry.unmount(root).unwrap();
        assert_eq!(root_counters.detach_count(), 1);
        assert_eq!(child_counters.detach_count(), 1);
    }

    #[test]
    fn set_behaviors_on_mounted_host_attaches_immediately() {
        let registry = global_registry();
        let host = registry.create();
        registry.mount(host).unwrap();

        let collection = BehaviorCollection::shared();
        let (behavior, counters) = CountingBehavior::shared();
        collection.lock().push(behavior).unwrap();

        set_behaviors(host, Some(collection.clone())).unwrap();

        assert_eq!(counters.attach_count(), 1);
        assert_eq!(collection.lock().associated_object(), Some(host));
    }

    #[test]
    fn set_behaviors_replaces_and_detaches_old() {
        let registry = global_registry();
        let host = registry.create();
        registry.mount(host).unwrap();

        let old = BehaviorCollection::shared();
        let (old_behavior, old_counters) = CountingBehavior::shared();
        old.lock().push(old_behavior).unwrap();
        set_behaviors(host, Some(old.clone())).unwrap();
        assert_eq!(old_counters.attach_count(), 1);

        let new = BehaviorCollection::shared();
        let (new_behavior, new_counters) = CountingBehavior::shared();
        new.lock().push(new_behavior).unwrap();
        set_behaviors(host, Some(new.clone())).unwrap();

        assert_eq!(old_counters.detach_count(), 1);
        assert_eq!(old.lock().associated_object(), None);
        assert_eq!(new_counters.attach_count(), 1);
        assert!(Arc::ptr_eq(&behaviors(host).unwrap(), &new));
    }

    #[test]
    fn set_same_collection_is_noop() {
        let registry = global_registry();
        let host = registry.create();
        registry.mount(host).unwrap();

        let collection = BehaviorCollection::shared();
        let (behavior, counters) = CountingBehavior::shared();
        collection.lock().push(behavior).unwrap();

        set_behaviors(host, Some(collection.clone())).unwrap();
        set_behaviors(host, Some(collection)).unwrap();

        assert_eq!(counters.attach_count(), 1);
        assert_eq!(counters.detach_count(), 0);
    }

    #[test]
    fn clearing_behaviors_detaches() {
        let registry = global_registry();
        let host = registry.create();
        registry.mount(host).unwrap();

        let collection = behaviors(host).unwrap();
        let (behavior, counters) = CountingBehavior::shared();
        collection.lock().push(behavior).unwrap();
        collection.lock().attach(host).unwrap();

        set_behaviors(host, None).unwrap();

        assert_eq!(counters.detach_count(), 1);
        // A fresh collection is created on next access.
        assert!(!Arc::ptr_eq(&behaviors(host).unwrap(), &collection));
    }

    #[test]
    fn event_trigger_end_to_end() {
        crate::init_test_logging();
        let registry = global_registry();
        let host = registry.create();

        let fired = Arc::new(AtomicUsize::new(0));
        let trigger = EventTrigger::new(EventKind::PointerPressed);
        let fired_clone = fired.clone();
        trigger.actions().lock().push(shared_action(FnAction::new(
            move |_, _| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            },
        )));
        behaviors(host)
            .unwrap()
            .lock()
            .push(shared_behavior(trigger))
            .unwrap();

        // Not mounted yet: the trigger is not attached and must not fire.
        registry
            .raise_event(host, EventKind::PointerPressed, None)
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        registry.mount(host).unwrap();
        registry
            .raise_event(host, EventKind::PointerPressed, None)
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        registry.unmount(host).unwrap();
        registry
            .raise_event(host, EventKind::PointerPressed, None)
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
