//! The behavior collection and its reconciliation protocol.
//!
//! A [`BehaviorCollection`] is the host-facing, ordered list of behaviors.
//! Structural edits (insert, replace, remove, clear, bulk update) are
//! reconciled against an internal shadow list so that exactly the affected
//! members are attached or detached, while unaffected members keep their
//! state. The shadow list is the "last known good" copy: it is what tells the
//! collection which element previously occupied a slot, and it must match the
//! public list element-for-element outside of a single reconciliation step.
//!
//! Invariants:
//! - No behavior instance appears in the collection more than once
//!   (reference identity of the shared handle).
//! - While the collection is attached, every member is attached to the same
//!   host; a member removed from an attached collection is detached before it
//!   is released.
//! - The public list and the shadow list are identical in length and
//!   element identity between edits (checked in debug builds).
//!
//! All mutation must happen on the UI thread that created the collection;
//! this is asserted in debug builds. Do not mutate a collection from inside
//! one of its own members' lifecycle hooks.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::Key as _;
use trellis_core::{ElementId, ThreadAffinity};

use crate::behavior::SharedBehavior;
use crate::error::{Error, Result};

/// A behavior collection shared with the attachment-point registry.
pub type SharedBehaviorCollection = Arc<Mutex<BehaviorCollection>>;

/// An ordered collection of behaviors bound to at most one host.
pub struct BehaviorCollection {
    /// The published list.
    items: Vec<SharedBehavior>,
    /// The reconciliation-time copy of `items`.
    shadow: Vec<SharedBehavior>,
    /// The host this collection is attached to, if any.
    host: Option<ElementId>,
    /// The UI thread this collection belongs to.
    affinity: ThreadAffinity,
}

impl BehaviorCollection {
    /// Create an empty, unattached collection.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            shadow: Vec::new(),
            host: None,
            affinity: ThreadAffinity::current(),
        }
    }

    /// Create an empty collection wrapped for sharing.
    pub fn shared() -> SharedBehaviorCollection {
        Arc::new(Mutex::new(Self::new()))
    }

    /// The host this collection is attached to, or `None` while unattached.
    pub fn associated_object(&self) -> Option<ElementId> {
        self.host
    }

    /// The number of behaviors in the collection.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the behavior at `index`, if any.
    pub fn get(&self, index: usize) -> Option<SharedBehavior> {
        self.items.get(index).cloned()
    }

    /// Iterate over the behaviors in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedBehavior> {
        self.items.iter()
    }

    /// Attach the collection, and every current member in index order, to a
    /// host.
    ///
    /// Attaching to the host the collection is already attached to is a
    /// no-op. Attaching to a different host while attached fails with
    /// [`Error::CollectionAlreadyAttached`]; a member already attached to
    /// some other host fails with [`Error::AlreadyAttached`]. Either failure
    /// leaves the collection, and every member, unchanged.
    pub fn attach(&mut self, host: ElementId) -> Result<()> {
        if host.is_null() {
            return Err(Error::NullHost);
        }
        match self.host {
            Some(current) if current == host => return Ok(()),
            Some(_) => return Err(Error::CollectionAlreadyAttached),
            None => {}
        }
        self.affinity.debug_assert_same_thread();

        // Reject members attached elsewhere before recording the host; a
        // mid-loop attach failure must not leave the collection claiming a
        // host it never finished attaching to.
        for behavior in &self.items {
            if let Some(current) = behavior.lock().behavior_base().associated_object() {
                if current != host {
                    return Err(Error::AlreadyAttached);
                }
            }
        }

        self.host = Some(host);
        // Index order: earlier-declared behaviors observe their attach-hook
        // side effects before later ones.
        for behavior in &self.items {
            behavior.lock().attach(host)?;
        }
        tracing::debug!(
            target: "trellis_behaviors::collection",
            ?host,
            count = self.items.len(),
            "behavior collection attached"
        );
        self.verify_lockstep();
        Ok(())
    }

    /// Detach every member, then clear the host reference.
    ///
    /// Members that were already detached out-of-band are skipped. Detaching
    /// an unattached collection is a no-op.
    pub fn detach(&mut self) {
        self.affinity.debug_assert_same_thread();
        for behavior in &self.items {
            let mut behavior = behavior.lock();
            if behavior.behavior_base().is_attached() {
                behavior.detach();
            }
        }
        let host = self.host.take();
        if host.is_some() {
            tracing::debug!(
                target: "trellis_behaviors::collection",
                ?host,
                count = self.items.len(),
                "behavior collection detached"
            );
        }
        self.verify_lockstep();
    }

    /// Append a behavior.
    ///
    /// Equivalent to [`insert`](Self::insert) at `len()`.
    pub fn push(&mut self, behavior: SharedBehavior) -> Result<()> {
        self.insert(self.items.len(), behavior)
    }

    /// Insert a behavior at `index`.
    ///
    /// Fails with [`Error::DuplicateBehavior`] if the instance is already in
    /// the collection, with [`Error::IndexOutOfBounds`] if `index > len()`,
    /// and with [`Error::AlreadyAttached`] if the behavior is attached to a
    /// host other than this collection's. If the collection is attached, the
    /// new member is attached to the host before it becomes visible in the
    /// list; on failure the collection is unchanged.
    pub fn insert(&mut self, index: usize, behavior: SharedBehavior) -> Result<()> {
        self.affinity.debug_assert_same_thread();
        if index > self.items.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        if self.shadow_contains(&behavior, None) {
            return Err(Error::DuplicateBehavior);
        }
        if let Some(current) = behavior.lock().behavior_base().associated_object() {
            if Some(current) != self.host {
                return Err(Error::AlreadyAttached);
            }
        }
        if let Some(host) = self.host {
            behavior.lock().attach(host)?;
        }
        self.items.insert(index, behavior.clone());
        self.shadow.insert(index, behavior);
        self.verify_lockstep();
        Ok(())
    }

    /// Replace the behavior at `index`, returning the old one.
    ///
    /// The old member is detached first (if it still has a host), then the
    /// new member is validated and attached exactly as in
    /// [`insert`](Self::insert), and the slot is overwritten.
    pub fn replace(&mut self, index: usize, behavior: SharedBehavior) -> Result<SharedBehavior> {
        self.affinity.debug_assert_same_thread();
        if index >= self.items.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        if self.shadow_contains(&behavior, Some(index)) {
            return Err(Error::DuplicateBehavior);
        }
        // Validate before detaching the old member so a rejected replacement
        // leaves the slot untouched.
        if let Some(current) = behavior.lock().behavior_base().associated_object() {
            if Some(current) != self.host {
                return Err(Error::AlreadyAttached);
            }
        }

        {
            let old = &self.shadow[index];
            let mut old = old.lock();
            if old.behavior_base().is_attached() {
                old.detach();
            }
        }
        if let Some(host) = self.host {
            behavior.lock().attach(host)?;
        }

        let old = std::mem::replace(&mut self.items[index], behavior.clone());
        self.shadow[index] = behavior;
        self.verify_lockstep();
        Ok(old)
    }

    /// Remove and return the behavior at `index`, detaching it first if it is
    /// attached.
    pub fn remove(&mut self, index: usize) -> Result<SharedBehavior> {
        self.affinity.debug_assert_same_thread();
        if index >= self.items.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }

        {
            let mut shadowed = self.shadow[index].lock();
            if shadowed.behavior_base().is_attached() {
                shadowed.detach();
            }
        }
        self.shadow.remove(index);
        let removed = self.items.remove(index);
        self.verify_lockstep();
        Ok(removed)
    }

    /// Remove every behavior, detaching the attached ones.
    pub fn clear(&mut self) {
        self.affinity.debug_assert_same_thread();
        for behavior in &self.shadow {
            let mut behavior = behavior.lock();
            if behavior.behavior_base().is_attached() {
                behavior.detach();
            }
        }
        self.shadow.clear();
        self.items.clear();
        self.verify_lockstep();
    }

    /// Apply an arbitrary bulk edit to the list, then reconcile.
    ///
    /// The closure may reorder, remove, and add members freely. Afterwards
    /// the previous membership (the shadow list) is detached wholesale, the
    /// new membership is validated, re-attached in index order if the
    /// collection is attached, and the shadow list is rebuilt — uniform
    /// replace-all semantics. A member kept across the edit is therefore
    /// detached and re-attached once.
    ///
    /// On a validation failure (duplicate instance, or a member attached to a
    /// foreign host) the public list is restored from the shadow list and the
    /// error is returned; no member's state changes.
    pub fn update<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<SharedBehavior>),
    {
        self.affinity.debug_assert_same_thread();
        edit(&mut self.items);

        if let Err(err) = self.validate_items() {
            self.items = self.shadow.clone();
            return Err(err);
        }

        for behavior in &self.shadow {
            let mut behavior = behavior.lock();
            if behavior.behavior_base().is_attached() {
                behavior.detach();
            }
        }
        self.shadow.clear();

        if let Some(host) = self.host {
            for behavior in &self.items {
                behavior.lock().attach(host)?;
            }
        }
        self.shadow = self.items.clone();
        self.verify_lockstep();
        Ok(())
    }

    /// Validate the public list after a bulk edit: no duplicate instances, no
    /// member attached to a host other than ours.
    fn validate_items(&self) -> Result<()> {
        for (i, behavior) in self.items.iter().enumerate() {
            if self.items[..i].iter().any(|b| Arc::ptr_eq(b, behavior)) {
                return Err(Error::DuplicateBehavior);
            }
            if let Some(current) = behavior.lock().behavior_base().associated_object() {
                if Some(current) != self.host {
                    return Err(Error::AlreadyAttached);
                }
            }
        }
        Ok(())
    }

    /// Whether `behavior` is already present in the shadow list, optionally
    /// ignoring one slot (the one being replaced).
    fn shadow_contains(&self, behavior: &SharedBehavior, skip: Option<usize>) -> bool {
        self.shadow
            .iter()
            .enumerate()
            .any(|(i, b)| Some(i) != skip && Arc::ptr_eq(b, behavior))
    }

    /// Debug-build check that the public and shadow lists are in lock-step.
    fn verify_lockstep(&self) {
        debug_assert!(
            self.items.len() == self.shadow.len()
                && self
                    .items
                    .iter()
                    .zip(self.shadow.iter())
                    .all(|(a, b)| Arc::ptr_eq(a, b)),
            "behavior collection shadow list out of sync with public list"
        );
    }

    /// Forward a visual-tree attachment notification to attached members.
    pub fn notify_attached_to_visual_tree(&self) {
        self.for_each_attached(|b| b.on_attached_to_visual_tree());
    }

    /// Forward a visual-tree detachment notification to attached members.
    pub fn notify_detached_from_visual_tree(&self) {
        self.for_each_attached(|b| b.on_detached_from_visual_tree());
    }

    /// Forward a logical-tree attachment notification to attached members.
    pub fn notify_attached_to_logical_tree(&self) {
        self.for_each_attached(|b| b.on_attached_to_logical_tree());
    }

    /// Forward a logical-tree detachment notification to attached members.
    pub fn notify_detached_from_logical_tree(&self) {
        self.for_each_attached(|b| b.on_detached_from_logical_tree());
    }

    /// Forward a loaded notification to attached members.
    pub fn notify_loaded(&self) {
        self.for_each_attached(|b| b.on_loaded());
    }

    /// Forward an unloaded notification to attached members.
    pub fn notify_unloaded(&self) {
        self.for_each_attached(|b| b.on_unloaded());
    }

    /// Invoke a hook on every member currently in `Attached` state.
    ///
    /// Secondary lifecycle notifications are only delivered while attached.
    fn for_each_attached<F>(&self, mut f: F)
    where
        F: FnMut(&mut dyn crate::behavior::Behavior),
    {
        for behavior in &self.items {
            let mut behavior = behavior.lock();
            if behavior.behavior_base().is_attached() {
                f(&mut *behavior);
            }
        }
    }
}

impl Default for BehaviorCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BehaviorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorCollection")
            .field("len", &self.items.len())
            .field("host", &self.host)
            .finish()
    }
}

static_assertions::assert_impl_all!(SharedBehaviorCollection: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::test_support::CountingBehavior;
    use trellis_core::global_registry;

    #[test]
    fn attach_attaches_all_members_in_order() {
        crate::init_test_logging();
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();

        let (a, ca) = CountingBehavior::shared();
        let (b, cb) = CountingBehavior::shared();
        let (c, cc) = CountingBehavior::shared();
        bc.push(a.clone()).unwrap();
        bc.push(b.clone()).unwrap();
        bc.push(c.clone()).unwrap();

        bc.attach(button).unwrap();

        for (behavior, counters) in [(&a, &ca), (&b, &cb), (&c, &cc)] {
            assert_eq!(counters.attach_count(), 1);
            assert_eq!(
                behavior.lock().behavior_base().associated_object(),
                Some(button)
            );
        }

        bc.detach();
        for (behavior, counters) in [(&a, &ca), (&b, &cb), (&c, &cc)] {
            assert_eq!(counters.detach_count(), 1);
            assert_eq!(behavior.lock().behavior_base().associated_object(), None);
        }
    }

    #[test]
    fn attach_to_second_host_fails_and_keeps_first() {
        let registry = global_registry();
        let button_a = registry.create();
        let button_b = registry.create();
        let mut bc = BehaviorCollection::new();

        bc.attach(button_a).unwrap();
        let result = bc.attach(button_b);

        assert!(matches!(result, Err(Error::CollectionAlreadyAttached)));
        assert_eq!(bc.associated_object(), Some(button_a));
    }

    #[test]
    fn reattach_same_host_is_noop() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();
        let (a, counters) = CountingBehavior::shared();
        bc.push(a).unwrap();

        bc.attach(button).unwrap();
        bc.attach(button).unwrap();

        assert_eq!(counters.attach_count(), 1);
    }

    #[test]
    fn insert_into_attached_collection_attaches() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();
        bc.attach(button).unwrap();

        let (a, counters) = CountingBehavior::shared();
        bc.push(a.clone()).unwrap();

        assert_eq!(counters.attach_count(), 1);
        assert_eq!(
            a.lock().behavior_base().associated_object(),
            Some(button)
        );
    }

    #[test]
    fn insert_into_detached_collection_leaves_detached() {
        let mut bc = BehaviorCollection::new();
        let (a, counters) = CountingBehavior::shared();
        bc.push(a.clone()).unwrap();

        assert_eq!(counters.attach_count(), 0);
        assert_eq!(a.lock().behavior_base().associated_object(), None);
    }

    #[test]
    fn duplicate_insert_rejected_and_collection_unchanged() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();
        bc.attach(button).unwrap();

        let (a, counters) = CountingBehavior::shared();
        bc.push(a.clone()).unwrap();
        let result = bc.push(a.clone());

        assert!(matches!(result, Err(Error::DuplicateBehavior)));
        assert_eq!(bc.len(), 1);
        assert_eq!(counters.attach_count(), 1);

        // Also rejected while the collection is detached.
        let mut detached = BehaviorCollection::new();
        let (b, _) = CountingBehavior::shared();
        detached.push(b.clone()).unwrap();
        assert!(matches!(
            detached.push(b),
            Err(Error::DuplicateBehavior)
        ));
        assert_eq!(detached.len(), 1);
    }

    #[test]
    fn insert_rejects_behavior_attached_elsewhere() {
        let registry = global_registry();
        let other_host = registry.create();

        let (taken, counters) = CountingBehavior::shared();
        taken.lock().attach(other_host).unwrap();

        let mut bc = BehaviorCollection::new();
        let result = bc.push(taken.clone());

        assert!(matches!(result, Err(Error::AlreadyAttached)));
        assert!(bc.is_empty());
        assert_eq!(counters.attach_count(), 1);
        assert_eq!(
            taken.lock().behavior_base().associated_object(),
            Some(other_host)
        );
    }

    #[test]
    fn attach_with_foreign_member_fails_and_changes_nothing() {
        let registry = global_registry();
        let first = registry.create();
        let second = registry.create();

        let mut bc = BehaviorCollection::new();
        let (clean, c_clean) = CountingBehavior::shared();
        let (taken, c_taken) = CountingBehavior::shared();
        bc.push(clean).unwrap();
        bc.push(taken.clone()).unwrap();

        // Attached behind the collection's back while the collection was
        // still detached.
        taken.lock().attach(first).unwrap();

        let result = bc.attach(second);

        assert!(matches!(result, Err(Error::AlreadyAttached)));
        assert_eq!(bc.associated_object(), None);
        assert_eq!(c_clean.attach_count(), 0);
        assert_eq!(c_taken.attach_count(), 1);
        assert_eq!(
            taken.lock().behavior_base().associated_object(),
            Some(first)
        );
    }

    #[test]
    fn remove_detaches_exactly_that_member() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();

        let (a, ca) = CountingBehavior::shared();
        let (b, cb) = CountingBehavior::shared();
        bc.push(a).unwrap();
        bc.push(b.clone()).unwrap();
        bc.attach(button).unwrap();

        let removed = bc.remove(0).unwrap();

        assert_eq!(ca.attach_count(), 1);
        assert_eq!(ca.detach_count(), 1);
        assert_eq!(cb.attach_count(), 1);
        assert_eq!(cb.detach_count(), 0);
        assert_eq!(removed.lock().behavior_base().associated_object(), None);
        assert_eq!(bc.len(), 1);
        assert!(Arc::ptr_eq(&bc.get(0).unwrap(), &b));
    }

    #[test]
    fn replace_detaches_old_and_attaches_new() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();

        let (old, c_old) = CountingBehavior::shared();
        let (keep, c_keep) = CountingBehavior::shared();
        bc.push(old).unwrap();
        bc.push(keep).unwrap();
        bc.attach(button).unwrap();

        let (new, c_new) = CountingBehavior::shared();
        let replaced = bc.replace(0, new.clone()).unwrap();

        assert_eq!(c_old.detach_count(), 1);
        assert_eq!(c_new.attach_count(), 1);
        assert_eq!(c_keep.attach_count(), 1);
        assert_eq!(c_keep.detach_count(), 0);
        assert_eq!(replaced.lock().behavior_base().associated_object(), None);
        assert!(Arc::ptr_eq(&bc.get(0).unwrap(), &new));
        assert_eq!(
            new.lock().behavior_base().associated_object(),
            Some(button)
        );
    }

    #[test]
    fn replace_with_existing_member_rejected() {
        let mut bc = BehaviorCollection::new();
        let (a, _) = CountingBehavior::shared();
        let (b, _) = CountingBehavior::shared();
        bc.push(a.clone()).unwrap();
        bc.push(b).unwrap();

        let result = bc.replace(1, a);
        assert!(matches!(result, Err(Error::DuplicateBehavior)));
        assert_eq!(bc.len(), 2);
    }

    #[test]
    fn replace_member_with_itself_allowed() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();
        let (a, counters) = CountingBehavior::shared();
        bc.push(a.clone()).unwrap();
        bc.attach(button).unwrap();

        bc.replace(0, a.clone()).unwrap();

        // Detached once and re-attached once.
        assert_eq!(counters.attach_count(), 2);
        assert_eq!(counters.detach_count(), 1);
        assert_eq!(
            a.lock().behavior_base().associated_object(),
            Some(button)
        );
    }

    #[test]
    fn clear_detaches_everything() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();

        let (a, ca) = CountingBehavior::shared();
        let (b, cb) = CountingBehavior::shared();
        bc.push(a).unwrap();
        bc.push(b).unwrap();
        bc.attach(button).unwrap();

        bc.clear();

        assert!(bc.is_empty());
        assert_eq!(ca.detach_count(), 1);
        assert_eq!(cb.detach_count(), 1);
        assert_eq!(bc.associated_object(), Some(button));
    }

    #[test]
    fn detach_tolerates_out_of_band_detach() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();

        let (a, ca) = CountingBehavior::shared();
        bc.push(a.clone()).unwrap();
        bc.attach(button).unwrap();

        // Detached behind the collection's back.
        a.lock().detach();
        assert_eq!(ca.detach_count(), 1);

        bc.detach();
        assert_eq!(ca.detach_count(), 1);
        assert_eq!(bc.associated_object(), None);
    }

    #[test]
    fn update_reconciles_with_reset_semantics() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();

        let (kept, c_kept) = CountingBehavior::shared();
        let (dropped, c_dropped) = CountingBehavior::shared();
        bc.push(kept.clone()).unwrap();
        bc.push(dropped).unwrap();
        bc.attach(button).unwrap();

        let (added, c_added) = CountingBehavior::shared();
        bc.update(|items| {
            items.remove(1);
            items.push(added.clone());
        })
        .unwrap();

        assert_eq!(bc.len(), 2);
        // The dropped member is detached and stays detached.
        assert_eq!(c_dropped.detach_count(), 1);
        // The kept member is detached and re-attached by the reset.
        assert_eq!(c_kept.attach_count(), 2);
        assert_eq!(c_kept.detach_count(), 1);
        // The added member is attached once.
        assert_eq!(c_added.attach_count(), 1);
        assert_eq!(
            kept.lock().behavior_base().associated_object(),
            Some(button)
        );
    }

    #[test]
    fn update_with_duplicates_rolls_back() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();

        let (a, counters) = CountingBehavior::shared();
        bc.push(a.clone()).unwrap();
        bc.attach(button).unwrap();

        let result = bc.update(|items| {
            let dup = items[0].clone();
            items.push(dup);
        });

        assert!(matches!(result, Err(Error::DuplicateBehavior)));
        assert_eq!(bc.len(), 1);
        // The member was never disturbed.
        assert_eq!(counters.attach_count(), 1);
        assert_eq!(counters.detach_count(), 0);
        assert_eq!(
            a.lock().behavior_base().associated_object(),
            Some(button)
        );
    }

    #[test]
    fn notifications_skip_detached_members() {
        let button = global_registry().create();
        let mut bc = BehaviorCollection::new();

        let (attached, c_attached) = CountingBehavior::shared();
        let (loose, c_loose) = CountingBehavior::shared();
        bc.push(attached).unwrap();
        bc.push(loose.clone()).unwrap();
        bc.attach(button).unwrap();

        loose.lock().detach();

        bc.notify_loaded();
        bc.notify_attached_to_visual_tree();

        assert_eq!(c_attached.loaded.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(
            c_attached
                .visual_attach
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
        assert_eq!(c_loose.loaded.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn null_host_rejected() {
        let mut bc = BehaviorCollection::new();
        assert!(matches!(
            bc.attach(ElementId::default()),
            Err(Error::NullHost)
        ));
    }
}
