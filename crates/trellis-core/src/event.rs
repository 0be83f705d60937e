//! Host event kinds and per-element event signals.
//!
//! Trellis replaces reflection-based "subscribe to an event by name" with a
//! closed enumeration of event kinds: every element owns one
//! [`Signal<EventArgs>`](crate::Signal) per [`EventKind`], created lazily on
//! first access. Consumers subscribe with [`ElementSignals::event`] and
//! unsubscribe with the returned [`ConnectionId`](crate::ConnectionId) —
//! a typed capability map rather than runtime event-name lookup.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::element::ElementId;
use crate::signal::Signal;

/// The closed set of event kinds an element can raise.
///
/// Lifecycle kinds are raised by the registry during
/// [`mount`](crate::SharedElementRegistry::mount) /
/// [`unmount`](crate::SharedElementRegistry::unmount); input kinds are raised
/// by the embedding toolkit via
/// [`raise_event`](crate::SharedElementRegistry::raise_event).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The element entered the visual tree.
    AttachedToVisualTree,
    /// The element left the visual tree.
    DetachedFromVisualTree,
    /// The element entered the logical tree.
    AttachedToLogicalTree,
    /// The element left the logical tree.
    DetachedFromLogicalTree,
    /// The element finished loading (raised after visual-tree attachment).
    Loaded,
    /// The element is unloading (raised before visual-tree detachment).
    Unloaded,
    /// The element's data context changed.
    DataContextChanged,
    /// A pointer button was pressed over the element.
    PointerPressed,
    /// A pointer button was released over the element.
    PointerReleased,
    /// The pointer entered the element's bounds.
    PointerEntered,
    /// The pointer left the element's bounds.
    PointerExited,
    /// A key was pressed while the element had focus.
    KeyDown,
    /// A key was released while the element had focus.
    KeyUp,
    /// The element received keyboard focus.
    GotFocus,
    /// The element lost keyboard focus.
    LostFocus,
}

/// The opaque payload delivered to event subscribers.
///
/// The payload is toolkit-defined; subscribers downcast it when they know the
/// concrete type for the kind they subscribed to.
#[derive(Clone)]
pub struct EventArgs {
    /// The kind of event that was raised.
    pub kind: EventKind,
    /// The element the event was raised on.
    pub sender: ElementId,
    /// Optional kind-specific payload.
    pub payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl EventArgs {
    /// Create event args with no payload.
    pub fn new(kind: EventKind, sender: ElementId) -> Self {
        Self {
            kind,
            sender,
            payload: None,
        }
    }

    /// Create event args carrying a payload.
    pub fn with_payload(
        kind: EventKind,
        sender: ElementId,
        payload: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            kind,
            sender,
            payload: Some(payload),
        }
    }

    /// Downcast the payload to a concrete type.
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }
}

impl fmt::Debug for EventArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventArgs")
            .field("kind", &self.kind)
            .field("sender", &self.sender)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// The per-element map from [`EventKind`] to its signal.
///
/// Signals are created lazily on first subscription or raise, so elements that
/// never raise a given kind pay nothing for it. The map is shared via `Arc` so
/// the registry lock never has to be held while a signal is emitting.
pub struct ElementSignals {
    by_kind: Mutex<HashMap<EventKind, Arc<Signal<EventArgs>>>>,
}

impl ElementSignals {
    pub(crate) fn new() -> Self {
        Self {
            by_kind: Mutex::new(HashMap::new()),
        }
    }

    /// Get the signal for an event kind, creating it if needed.
    pub fn event(&self, kind: EventKind) -> Arc<Signal<EventArgs>> {
        self.by_kind
            .lock()
            .entry(kind)
            .or_insert_with(|| Arc::new(Signal::new()))
            .clone()
    }

    /// Raise an event, invoking subscribers of its kind.
    ///
    /// Does nothing if no subscriber ever touched this kind.
    pub fn raise(&self, args: &EventArgs) {
        let signal = self.by_kind.lock().get(&args.kind).cloned();
        if let Some(signal) = signal {
            signal.emit(args);
        }
    }
}

impl fmt::Debug for ElementSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementSignals")
            .field("kinds", &self.by_kind.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_signal_created_lazily() {
        let signals = ElementSignals::new();
        assert_eq!(signals.by_kind.lock().len(), 0);

        let _ = signals.event(EventKind::PointerPressed);
        assert_eq!(signals.by_kind.lock().len(), 1);

        // Same kind returns the same signal.
        let a = signals.event(EventKind::PointerPressed);
        let b = signals.event(EventKind::PointerPressed);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn raise_reaches_only_matching_kind() {
        let signals = ElementSignals::new();
        let pressed = Arc::new(Mutex::new(0));
        let released = Arc::new(Mutex::new(0));

        let pressed_clone = pressed.clone();
        signals.event(EventKind::PointerPressed).connect(move |_| {
            *pressed_clone.lock() += 1;
        });
        let released_clone = released.clone();
        signals.event(EventKind::PointerReleased).connect(move |_| {
            *released_clone.lock() += 1;
        });

        signals.raise(&EventArgs::new(
            EventKind::PointerPressed,
            ElementId::default(),
        ));

        assert_eq!(*pressed.lock(), 1);
        assert_eq!(*released.lock(), 0);
    }

    #[test]
    fn payload_downcast() {
        let args = EventArgs::with_payload(
            EventKind::KeyDown,
            ElementId::default(),
            Arc::new(42_u32),
        );
        assert_eq!(args.payload_as::<u32>(), Some(&42));
        assert_eq!(args.payload_as::<String>(), None);
    }
}
