//! Triggers: behaviors that execute an action list in response to a stimulus.
//!
//! A trigger is an ordinary [`Behavior`] that additionally owns an ordered
//! [`ActionCollection`] and fires it when its stimulus occurs. Concrete
//! triggers embed a [`TriggerBase`] and decide what the stimulus is;
//! [`EventTrigger`] is the built-in one, firing on a host lifecycle or input
//! event.
//!
//! Action failures during a fire are logged and swallowed: a failing action
//! must not tear down the event subscription or poison the host's signal.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use trellis_core::{EventArgs, EventKind, Signal, global_registry};

use crate::action::{ActionCollection, SharedActionCollection, execute_actions};
use crate::behavior::{Behavior, BehaviorBase};
use crate::subscriptions::Subscriptions;

/// Common state for implementing a trigger: a behavior base plus the owned
/// action list.
#[derive(Debug)]
pub struct TriggerBase {
    base: BehaviorBase,
    actions: SharedActionCollection,
}

impl TriggerBase {
    /// Create a new, unattached base with an empty action list.
    pub fn new() -> Self {
        Self {
            base: BehaviorBase::new(),
            actions: Arc::new(Mutex::new(ActionCollection::new())),
        }
    }

    /// The behavior base.
    pub fn behavior_base(&self) -> &BehaviorBase {
        &self.base
    }

    /// The behavior base, mutably.
    pub fn behavior_base_mut(&mut self) -> &mut BehaviorBase {
        &mut self.base
    }

    /// A handle to the trigger's action list.
    ///
    /// The list is shared: edits through the handle are visible to the
    /// trigger on its next fire, attached or not.
    pub fn actions(&self) -> SharedActionCollection {
        self.actions.clone()
    }
}

impl Default for TriggerBase {
    fn default() -> Self {
        Self::new()
    }
}

/// A behavior that owns an action list and fires it on a stimulus.
pub trait Trigger: Behavior {
    /// Get a reference to the trigger's base.
    fn trigger_base(&self) -> &TriggerBase;

    /// A handle to the trigger's action list.
    fn actions(&self) -> SharedActionCollection {
        self.trigger_base().actions()
    }
}

/// A trigger that fires its actions whenever the host raises a given event.
///
/// While attached, the trigger holds one subscription on the host's signal
/// for [`kind`](Self::kind). Each delivery executes the action list with the
/// raising element as sender and the event arguments as parameter. The
/// subscription is released on detach; a detached trigger never fires.
pub struct EventTrigger {
    trigger: TriggerBase,
    kind: EventKind,
    subscriptions: Subscriptions,
}

impl EventTrigger {
    /// Create a trigger for the given event kind.
    pub fn new(kind: EventKind) -> Self {
        Self {
            trigger: TriggerBase::new(),
            kind,
            subscriptions: Subscriptions::new(),
        }
    }

    /// The event kind this trigger fires on.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Change the event kind this trigger fires on.
    ///
    /// If the trigger is attached, the old subscription is released and a new
    /// one is taken out for the new kind; events of the old kind no longer
    /// fire the actions.
    pub fn set_kind(&mut self, kind: EventKind) {
        if kind == self.kind {
            return;
        }
        self.kind = kind;
        if self.trigger.base.is_attached() {
            self.subscriptions.release_all();
            self.subscribe();
        }
    }

    /// Subscribe to the host's signal for the current kind.
    ///
    /// Only called while attached.
    fn subscribe(&mut self) {
        let Some(host) = self.trigger.base.associated_object() else {
            return;
        };
        let signals = match global_registry().signals(host) {
            Ok(signals) => signals,
            Err(err) => {
                tracing::warn!(
                    target: "trellis_behaviors::trigger",
                    ?host,
                    %err,
                    "host has no signals; event trigger will not fire"
                );
                return;
            }
        };
        let signal = signals.event(self.kind);

        // The slot holds the action list weakly: the trigger owns the
        // actions, and a slot outliving its trigger must fall silent rather
        // than keep the list alive.
        let actions: Weak<Mutex<ActionCollection>> = Arc::downgrade(&self.trigger.actions);
        let kind = self.kind;
        let id = signal.connect(move |args: &EventArgs| {
            let Some(actions) = actions.upgrade() else {
                return;
            };
            let actions = actions.lock();
            if let Err(err) = execute_actions(Some(args.sender), Some(&actions), Some(args)) {
                tracing::error!(
                    target: "trellis_behaviors::trigger",
                    ?kind,
                    sender = ?args.sender,
                    %err,
                    "action failed while firing event trigger"
                );
            }
        });

        let signal_weak: Weak<Signal<EventArgs>> = Arc::downgrade(&signal);
        self.subscriptions.add(move || {
            if let Some(signal) = signal_weak.upgrade() {
                signal.disconnect(id);
            }
        });
        tracing::trace!(
            target: "trellis_behaviors::trigger",
            ?host,
            ?kind,
            "event trigger subscribed"
        );
    }
}

impl Behavior for EventTrigger {
    fn behavior_base(&self) -> &BehaviorBase {
        self.trigger.behavior_base()
    }

    fn behavior_base_mut(&mut self) -> &mut BehaviorBase {
        self.trigger.behavior_base_mut()
    }

    fn on_attached(&mut self) {
        self.subscribe();
    }

    fn on_detaching(&mut self) {
        self.subscriptions.release_all();
    }
}

impl Trigger for EventTrigger {
    fn trigger_base(&self) -> &TriggerBase {
        &self.trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{FnAction, shared_action};
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_action(count: &Arc<AtomicUsize>) -> crate::action::SharedAction {
        let count = count.clone();
        shared_action(FnAction::new(move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }))
    }

    #[test]
    fn fires_actions_on_host_event() {
        let host = global_registry().create();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut trigger = EventTrigger::new(EventKind::PointerPressed);
        trigger.actions().lock().push(counting_action(&fired));
        trigger.attach(host).unwrap();

        global_registry()
            .raise_event(host, EventKind::PointerPressed, None)
            .unwrap();
        global_registry()
            .raise_event(host, EventKind::PointerPressed, None)
            .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn other_events_do_not_fire() {
        let host = global_registry().create();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut trigger = EventTrigger::new(EventKind::PointerPressed);
        trigger.actions().lock().push(counting_action(&fired));
        trigger.attach(host).unwrap();

        global_registry()
            .raise_event(host, EventKind::PointerReleased, None)
            .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detach_releases_subscription() {
        let host = global_registry().create();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut trigger = EventTrigger::new(EventKind::GotFocus);
        trigger.actions().lock().push(counting_action(&fired));
        trigger.attach(host).unwrap();

        global_registry()
            .raise_event(host, EventKind::GotFocus, None)
            .unwrap();
        trigger.detach();
        global_registry()
            .raise_event(host, EventKind::GotFocus, None)
            .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        let signals = global_registry().signals(host).unwrap();
        assert_eq!(signals.event(EventKind::GotFocus).connection_count(), 0);
    }

    #[test]
    fn sender_and_parameter_reach_actions() {
        let host = global_registry().create();
        let seen = Arc::new(Mutex::new(None));

        let mut trigger = EventTrigger::new(EventKind::KeyDown);
        let seen_clone = seen.clone();
        trigger
            .actions()
            .lock()
            .push(shared_action(FnAction::new(move |sender, parameter| {
                *seen_clone.lock() = Some((sender, parameter.map(|p| p.kind)));
                Ok(None)
            })));
        trigger.attach(host).unwrap();

        global_registry()
            .raise_event(host, EventKind::KeyDown, None)
            .unwrap();

        assert_eq!(*seen.lock(), Some((Some(host), Some(EventKind::KeyDown))));
    }

    #[test]
    fn set_kind_while_attached_resubscribes() {
        let host = global_registry().create();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut trigger = EventTrigger::new(EventKind::PointerEntered);
        trigger.actions().lock().push(counting_action(&fired));
        trigger.attach(host).unwrap();

        trigger.set_kind(EventKind::PointerExited);

        global_registry()
            .raise_event(host, EventKind::PointerEntered, None)
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        global_registry()
            .raise_event(host, EventKind::PointerExited, None)
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_action_does_not_kill_subscription() {
        let host = global_registry().create();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut trigger = EventTrigger::new(EventKind::LostFocus);
        {
            let actions = trigger.actions();
            let mut actions = actions.lock();
            actions.push(counting_action(&fired));
            actions.push(shared_action(FnAction::new(|_, _| {
                Err(Error::action("boom"))
            })));
        }
        trigger.attach(host).unwrap();

        global_registry()
            .raise_event(host, EventKind::LostFocus, None)
            .unwrap();
        global_registry()
            .raise_event(host, EventKind::LostFocus, None)
            .unwrap();

        // The first action keeps running on later fires.
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn actions_editable_before_attach() {
        let host = global_registry().create();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut trigger = EventTrigger::new(EventKind::Loaded);
        let actions = trigger.actions();
        actions.lock().push(counting_action(&fired));

        trigger.attach(host).unwrap();
        global_registry()
            .raise_event(host, EventKind::Loaded, None)
            .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
