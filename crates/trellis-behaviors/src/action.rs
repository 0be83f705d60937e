//! Actions: single executable operations invoked by triggers.
//!
//! An [`Action`] is a unit with one operation: `execute(sender, parameter)`.
//! Triggers own an ordered [`ActionCollection`] and run it through
//! [`execute_actions`], which preserves declaration order, collects the
//! non-empty results, and propagates the first error without running the
//! remaining actions. The collection is typed, so only values implementing
//! [`Action`] can ever enter it; a corrupt collection is unrepresentable.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::{ElementId, EventArgs};

use crate::error::{Error, Result};

/// The type-erased value an action may produce.
pub type ActionOutput = Box<dyn Any + Send>;

/// A single executable operation.
pub trait Action: Any + Send {
    /// Execute the action.
    ///
    /// - `sender`: the element that triggered the execution, if any.
    /// - `parameter`: the opaque event payload that caused the trigger to
    ///   fire, if any.
    ///
    /// Returns `Ok(Some(..))` for a meaningful result, `Ok(None)` when the
    /// action has no observable result, and `Err` to abort the batch.
    fn execute(
        &mut self,
        sender: Option<ElementId>,
        parameter: Option<&EventArgs>,
    ) -> Result<Option<ActionOutput>>;
}

/// An action shared between its owning trigger and the executor.
pub type SharedAction = Arc<Mutex<dyn Action>>;

/// Wrap a concrete action for use in a collection.
pub fn shared_action<A: Action>(action: A) -> SharedAction {
    Arc::new(Mutex::new(action))
}

/// An append-ordered list of actions.
///
/// Insertion order is execution order. The same action instance may appear
/// more than once; there is no uniqueness constraint.
#[derive(Default)]
pub struct ActionCollection {
    actions: Vec<SharedAction>,
}

/// An action collection shared between a trigger and its event subscriptions.
pub type SharedActionCollection = Arc<Mutex<ActionCollection>>;

impl ActionCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Append an action.
    pub fn push(&mut self, action: SharedAction) {
        self.actions.push(action);
    }

    /// Insert an action at `index`, shifting later actions.
    ///
    /// Fails with [`Error::IndexOutOfBounds`] if `index > len()`, leaving the
    /// collection unchanged.
    pub fn insert(&mut self, index: usize, action: SharedAction) -> Result<()> {
        if index > self.actions.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.actions.len(),
            });
        }
        self.actions.insert(index, action);
        Ok(())
    }

    /// Remove and return the action at `index`, or `None` if out of bounds.
    pub fn remove(&mut self, index: usize) -> Option<SharedAction> {
        if index < self.actions.len() {
            Some(self.actions.remove(index))
        } else {
            None
        }
    }

    /// Remove all actions.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// The number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over the actions in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedAction> {
        self.actions.iter()
    }
}

impl fmt::Debug for ActionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCollection")
            .field("len", &self.actions.len())
            .finish()
    }
}

/// An [`Action`] backed by a closure.
///
/// The idiomatic replacement for command-invocation actions: the embedding
/// application supplies the callback, Trellis supplies the lifecycle.
///
/// # Example
///
/// ```
/// use trellis_behaviors::{ActionCollection, ActionOutput, FnAction, execute_actions, shared_action};
///
/// let mut actions = ActionCollection::new();
/// actions.push(shared_action(FnAction::new(|_sender, _parameter| {
///     Ok(Some(Box::new("clicked") as ActionOutput))
/// })));
///
/// let results = execute_actions(None, Some(&actions), None).unwrap();
/// assert_eq!(results.len(), 1);
/// ```
pub struct FnAction<F> {
    callback: F,
}

impl<F> FnAction<F>
where
    F: FnMut(Option<ElementId>, Option<&EventArgs>) -> Result<Option<ActionOutput>>
        + Send
        + 'static,
{
    /// Create an action from a callback.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Action for FnAction<F>
where
    F: FnMut(Option<ElementId>, Option<&EventArgs>) -> Result<Option<ActionOutput>>
        + Send
        + 'static,
{
    fn execute(
        &mut self,
        sender: Option<ElementId>,
        parameter: Option<&EventArgs>,
    ) -> Result<Option<ActionOutput>> {
        (self.callback)(sender, parameter)
    }
}

/// Execute every action in `actions` in collection order.
///
/// - Results are collected in call order; actions returning `Ok(None)`
///   contribute nothing.
/// - The first `Err` propagates to the caller unmodified and the remaining
///   actions are not executed.
/// - `None` for `actions` is an explicit no-op: an empty result sequence, not
///   an error.
pub fn execute_actions(
    sender: Option<ElementId>,
    actions: Option<&ActionCollection>,
    parameter: Option<&EventArgs>,
) -> Result<Vec<ActionOutput>> {
    let Some(actions) = actions else {
        return Ok(Vec::new());
    };

    let mut results = Vec::new();
    for action in actions.iter() {
        if let Some(output) = action.lock().execute(sender, parameter)? {
            results.push(output);
        }
    }
    tracing::trace!(
        target: "trellis_behaviors::action",
        executed = actions.len(),
        results = results.len(),
        "executed actions"
    );
    Ok(results)
}
