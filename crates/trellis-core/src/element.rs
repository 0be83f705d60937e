//! Element model for Trellis.
//!
//! Provides the host-side substrate the behavior framework consumes:
//! - Unique element identifiers via arena-based storage
//! - Parent-child relationships with cascade destroy
//! - An attached-value side table (opaque key/value state per element)
//! - Lifecycle signals (tree attachment, load/unload, data context)
//!
//! Elements here stand in for the visual elements of an embedding UI toolkit.
//! The registry owns all per-element state; user code holds [`ElementId`]
//! handles, which stay stable as the tree changes and become invalid when the
//! element is destroyed.
//!
//! # Key Types
//!
//! - [`ElementId`] - Unique stable identifier for each element
//! - [`ElementRegistry`] - Central registry managing all elements
//! - [`SharedElementRegistry`] - Thread-safe wrapper around [`ElementRegistry`]
//! - [`global_registry`] - The process-wide registry instance

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use slotmap::{SlotMap, new_key_type};

use crate::error::{ElementError, ElementResult};
use crate::event::{ElementSignals, EventArgs, EventKind};

new_key_type! {
    /// A unique identifier for an element in the registry.
    ///
    /// `ElementId`s are stable handles that remain valid as the tree changes.
    /// They become invalid when the element is destroyed. The default value is
    /// the null key, which never names a live element.
    pub struct ElementId;
}

impl ElementId {
    /// Convert the ElementId to a raw u64 value.
    ///
    /// Useful for interop with external systems that need a numeric ID. The
    /// raw value can be converted back using [`ElementId::from_raw`].
    #[inline]
    pub fn as_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }

    /// Create an ElementId from a raw u64 value.
    ///
    /// Does not check whether the element exists in the registry.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self::from(slotmap::KeyData::from_ffi(raw))
    }
}

/// Internal data stored in the registry for each element.
struct ElementData {
    /// Human-readable name for debugging and lookup.
    name: String,
    /// Parent element (if any).
    parent: Option<ElementId>,
    /// Child elements (owned).
    children: Vec<ElementId>,
    /// Attached values (type-erased side table).
    attached_values: HashMap<String, Box<dyn Any + Send + Sync>>,
    /// Per-kind event signals.
    signals: Arc<ElementSignals>,
    /// Whether the element is currently in a mounted tree.
    in_tree: bool,
    /// The element's data context, if any.
    data_context: Option<Arc<dyn Any + Send + Sync>>,
}

impl ElementData {
    fn new() -> Self {
        Self {
            name: String::new(),
            parent: None,
            children: Vec::new(),
            attached_values: HashMap::new(),
            signals: Arc::new(ElementSignals::new()),
            in_tree: false,
            data_context: None,
        }
    }
}

/// The central registry that manages all elements and their relationships.
///
/// Uses arena-based storage via SlotMap for stable element IDs and efficient
/// parent-child relationship management.
pub struct ElementRegistry {
    elements: SlotMap<ElementId, ElementData>,
}

impl ElementRegistry {
    /// Create a new empty element registry.
    pub fn new() -> Self {
        Self {
            elements: SlotMap::with_key(),
        }
    }

    /// Register a new element and return its ID.
    pub fn create(&mut self) -> ElementId {
        let id = self.elements.insert(ElementData::new());
        tracing::trace!(target: "trellis_core::element", ?id, "created element");
        id
    }

    /// Remove an element and all its children from the registry.
    ///
    /// Destroying a parent also destroys all descendants. Attached values are
    /// dropped with the element.
    pub fn destroy(&mut self, id: ElementId) -> ElementResult<()> {
        let descendants = self.collect_descendants(id)?;
        tracing::trace!(target: "trellis_core::element", ?id, descendant_count = descendants.len(), "destroying element tree");

        if let Some(data) = self.elements.get(id) {
            if let Some(parent_id) = data.parent {
                if let Some(parent_data) = self.elements.get_mut(parent_id) {
                    parent_data.children.retain(|&child| child != id);
                }
            }
        }

        for child_id in descendants {
            self.elements.remove(child_id);
        }
        self.elements.remove(id);

        Ok(())
    }

    /// Collect all descendant IDs, children before parents.
    fn collect_descendants(&self, id: ElementId) -> ElementResult<Vec<ElementId>> {
        let mut result = Vec::new();
        self.collect_descendants_recursive(id, &mut result)?;
        Ok(result)
    }

    fn collect_descendants_recursive(
        &self,
        id: ElementId,
        result: &mut Vec<ElementId>,
    ) -> ElementResult<()> {
        let data = self
            .elements
            .get(id)
            .ok_or(ElementError::InvalidElementId)?;
        for &child_id in &data.children {
            self.collect_descendants_recursive(child_id, result)?;
            result.push(child_id);
        }
        Ok(())
    }

    /// Check if an element exists in the registry.
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(id)
    }

    /// Set the parent of an element.
    ///
    /// Handles removing from the old parent and adding to the new parent.
    /// Passing `None` makes the element a root.
    pub fn set_parent(
        &mut self,
        id: ElementId,
        new_parent: Option<ElementId>,
    ) -> ElementResult<()> {
        if !self.elements.contains_key(id) {
            return Err(ElementError::InvalidElementId);
        }

        if let Some(parent_id) = new_parent {
            if !self.elements.contains_key(parent_id) {
                return Err(ElementError::InvalidElementId);
            }
            if self.is_ancestor_of(id, parent_id)? {
                return Err(ElementError::CircularParentage);
            }
        }

        let old_parent = self.elements.get(id).and_then(|d| d.parent);
        if let Some(old_parent_id) = old_parent {
            if let Some(parent_data) = self.elements.get_mut(old_parent_id) {
                parent_data.children.retain(|&child| child != id);
            }
        }

        if let Some(data) = self.elements.get_mut(id) {
            data.parent = new_parent;
        }

        if let Some(parent_id) = new_parent {
            if let Some(parent_data) = self.elements.get_mut(parent_id) {
                parent_data.children.push(id);
            }
        }

        Ok(())
    }

    /// Check if `potential_ancestor` is an ancestor of `id`.
    fn is_ancestor_of(
        &self,
        potential_ancestor: ElementId,
        id: ElementId,
    ) -> ElementResult<bool> {
        let mut current = Some(id);
        while let Some(current_id) = current {
            if current_id == potential_ancestor {
                return Ok(true);
            }
            current = self.elements.get(current_id).and_then(|d| d.parent);
        }
        Ok(false)
    }

    /// Get the parent of an element.
    pub fn parent(&self, id: ElementId) -> ElementResult<Option<ElementId>> {
        self.elements
            .get(id)
            .map(|d| d.parent)
            .ok_or(ElementError::InvalidElementId)
    }

    /// Get the children of an element.
    pub fn children(&self, id: ElementId) -> ElementResult<&[ElementId]> {
        self.elements
            .get(id)
            .map(|d| d.children.as_slice())
            .ok_or(ElementError::InvalidElementId)
    }

    /// Get the element's name.
    pub fn name(&self, id: ElementId) -> ElementResult<&str> {
        self.elements
            .get(id)
            .map(|d| d.name.as_str())
            .ok_or(ElementError::InvalidElementId)
    }

    /// Set the element's name.
    pub fn set_name(&mut self, id: ElementId, name: String) -> ElementResult<()> {
        self.elements
            .get_mut(id)
            .map(|d| d.name = name)
            .ok_or(ElementError::InvalidElementId)
    }

    /// Set an attached value on an element, replacing any previous value
    /// stored under the same key.
    pub fn set_attached_value<T: Any + Send + Sync>(
        &mut self,
        id: ElementId,
        key: impl Into<String>,
        value: T,
    ) -> ElementResult<()> {
        let data = self
            .elements
            .get_mut(id)
            .ok_or(ElementError::InvalidElementId)?;
        data.attached_values.insert(key.into(), Box::new(value));
        Ok(())
    }

    /// Get an attached value from an element.
    ///
    /// Returns `None` if no value is stored under the key or the stored value
    /// has a different type.
    pub fn attached_value<T: Any>(&self, id: ElementId, key: &str) -> ElementResult<Option<&T>> {
        let data = self
            .elements
            .get(id)
            .ok_or(ElementError::InvalidElementId)?;
        Ok(data
            .attached_values
            .get(key)
            .and_then(|v| v.downcast_ref::<T>()))
    }

    /// Remove an attached value from an element.
    pub fn remove_attached_value(
        &mut self,
        id: ElementId,
        key: &str,
    ) -> ElementResult<Option<Box<dyn Any + Send + Sync>>> {
        let data = self
            .elements
            .get_mut(id)
            .ok_or(ElementError::InvalidElementId)?;
        Ok(data.attached_values.remove(key))
    }

    /// Get the event signals for an element.
    pub fn signals(&self, id: ElementId) -> ElementResult<Arc<ElementSignals>> {
        self.elements
            .get(id)
            .map(|d| d.signals.clone())
            .ok_or(ElementError::InvalidElementId)
    }

    /// Check whether an element is currently in a mounted tree.
    pub fn is_mounted(&self, id: ElementId) -> ElementResult<bool> {
        self.elements
            .get(id)
            .map(|d| d.in_tree)
            .ok_or(ElementError::InvalidElementId)
    }

    /// Get the element's data context, if any.
    pub fn data_context(
        &self,
        id: ElementId,
    ) -> ElementResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.elements
            .get(id)
            .map(|d| d.data_context.clone())
            .ok_or(ElementError::InvalidElementId)
    }

    /// Traverse the subtree rooted at `id` in depth-first pre-order.
    pub fn depth_first_preorder(&self, id: ElementId) -> ElementResult<Vec<ElementId>> {
        let mut result = Vec::new();
        self.depth_first_preorder_recursive(id, &mut result)?;
        Ok(result)
    }

    fn depth_first_preorder_recursive(
        &self,
        id: ElementId,
        result: &mut Vec<ElementId>,
    ) -> ElementResult<()> {
        let data = self
            .elements
            .get(id)
            .ok_or(ElementError::InvalidElementId)?;
        result.push(id);
        for &child_id in &data.children {
            self.depth_first_preorder_recursive(child_id, result)?;
        }
        Ok(())
    }

    /// Get the number of registered elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Mark the subtree rooted at `root` as mounted.
    ///
    /// Returns the affected elements in pre-order, paired with their signal
    /// maps so the caller can emit lifecycle events without holding any lock.
    pub(crate) fn begin_mount(
        &mut self,
        root: ElementId,
    ) -> ElementResult<Vec<(ElementId, Arc<ElementSignals>)>> {
        {
            let data = self
                .elements
                .get(root)
                .ok_or(ElementError::InvalidElementId)?;
            if data.in_tree {
                return Err(ElementError::AlreadyMounted);
            }
        }
        let ids = self.depth_first_preorder(root)?;
        let mut affected = Vec::with_capacity(ids.len());
        for id in ids {
            let data = self
                .elements
                .get_mut(id)
                .ok_or(ElementError::InvalidElementId)?;
            data.in_tree = true;
            affected.push((id, data.signals.clone()));
        }
        Ok(affected)
    }

    /// Mark the subtree rooted at `root` as unmounted.
    ///
    /// Returns the affected elements leaves-first (reverse pre-order).
    pub(crate) fn begin_unmount(
        &mut self,
        root: ElementId,
    ) -> ElementResult<Vec<(ElementId, Arc<ElementSignals>)>> {
        {
            let data = self
                .elements
                .get(root)
                .ok_or(ElementError::InvalidElementId)?;
            if !data.in_tree {
                return Err(ElementError::NotMounted);
            }
        }
        let mut ids = self.depth_first_preorder(root)?;
        ids.reverse();
        let mut affected = Vec::with_capacity(ids.len());
        for id in ids {
            let data = self
                .elements
                .get_mut(id)
                .ok_or(ElementError::InvalidElementId)?;
            data.in_tree = false;
            affected.push((id, data.signals.clone()));
        }
        Ok(affected)
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe wrapper around [`ElementRegistry`].
///
/// Provides concurrent read access with exclusive write access via `RwLock`.
/// Lifecycle signals are always emitted *after* the registry lock is released,
/// so subscribers may freely call back into the registry.
pub struct SharedElementRegistry {
    inner: RwLock<ElementRegistry>,
}

impl SharedElementRegistry {
    /// Create a new shared element registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ElementRegistry::new()),
        }
    }

    /// Register a new element.
    pub fn create(&self) -> ElementId {
        self.inner.write().create()
    }

    /// Destroy an element and its children.
    pub fn destroy(&self, id: ElementId) -> ElementResult<()> {
        self.inner.write().destroy(id)
    }

    /// Check if an element exists.
    pub fn contains(&self, id: ElementId) -> bool {
        self.inner.read().contains(id)
    }

    /// Set the parent of an element.
    pub fn set_parent(&self, id: ElementId, parent: Option<ElementId>) -> ElementResult<()> {
        self.inner.write().set_parent(id, parent)
    }

    /// Get the parent of an element.
    pub fn parent(&self, id: ElementId) -> ElementResult<Option<ElementId>> {
        self.inner.read().parent(id)
    }

    /// Get the children of an element (returns owned Vec for thread safety).
    pub fn children(&self, id: ElementId) -> ElementResult<Vec<ElementId>> {
        self.inner.read().children(id).map(|c| c.to_vec())
    }

    /// Get the element's name.
    pub fn name(&self, id: ElementId) -> ElementResult<String> {
        self.inner.read().name(id).map(|s| s.to_string())
    }

    /// Set the element's name.
    pub fn set_name(&self, id: ElementId, name: impl Into<String>) -> ElementResult<()> {
        self.inner.write().set_name(id, name.into())
    }

    /// Set an attached value.
    pub fn set_attached_value<T: Any + Send + Sync>(
        &self,
        id: ElementId,
        key: impl Into<String>,
        value: T,
    ) -> ElementResult<()> {
        self.inner.write().set_attached_value(id, key, value)
    }

    /// Get a clone of an attached value.
    pub fn attached_value<T: Any + Clone>(
        &self,
        id: ElementId,
        key: &str,
    ) -> ElementResult<Option<T>> {
        self.inner
            .read()
            .attached_value::<T>(id, key)
            .map(|v| v.cloned())
    }

    /// Remove an attached value.
    pub fn remove_attached_value(
        &self,
        id: ElementId,
        key: &str,
    ) -> ElementResult<Option<Box<dyn Any + Send + Sync>>> {
        self.inner.write().remove_attached_value(id, key)
    }

    /// Get the event signals for an element.
    pub fn signals(&self, id: ElementId) -> ElementResult<Arc<ElementSignals>> {
        self.inner.read().signals(id)
    }

    /// Check whether an element is currently in a mounted tree.
    pub fn is_mounted(&self, id: ElementId) -> ElementResult<bool> {
        self.inner.read().is_mounted(id)
    }

    /// Get the number of registered elements.
    pub fn element_count(&self) -> usize {
        self.inner.read().element_count()
    }

    /// Traverse the subtree rooted at `id` in depth-first pre-order.
    pub fn depth_first_preorder(&self, id: ElementId) -> ElementResult<Vec<ElementId>> {
        self.inner.read().depth_first_preorder(id)
    }

    /// Mount the subtree rooted at `root`.
    ///
    /// Marks every element in the subtree as in-tree, then emits lifecycle
    /// events in toolkit order: logical-tree attachment, visual-tree
    /// attachment, then loaded — each phase delivered to the whole subtree in
    /// pre-order before the next phase begins.
    pub fn mount(&self, root: ElementId) -> ElementResult<()> {
        let affected = self.inner.write().begin_mount(root)?;
        tracing::debug!(target: "trellis_core::element", ?root, count = affected.len(), "mounting subtree");

        for kind in [
            EventKind::AttachedToLogicalTree,
            EventKind::AttachedToVisualTree,
            EventKind::Loaded,
        ] {
            for (id, signals) in &affected {
                signals.raise(&EventArgs::new(kind, *id));
            }
        }
        Ok(())
    }

    /// Unmount the subtree rooted at `root`.
    ///
    /// Marks every element in the subtree as out-of-tree, then emits lifecycle
    /// events leaves-first in the reverse of the mount order: unloaded,
    /// visual-tree detachment, then logical-tree detachment.
    pub fn unmount(&self, root: ElementId) -> ElementResult<()> {
        let affected = self.inner.write().begin_unmount(root)?;
        tracing::debug!(target: "trellis_core::element", ?root, count = affected.len(), "unmounting subtree");

        for kind in [
            EventKind::Unloaded,
            EventKind::DetachedFromVisualTree,
            EventKind::DetachedFromLogicalTree,
        ] {
            for (id, signals) in &affected {
                signals.raise(&EventArgs::new(kind, *id));
            }
        }
        Ok(())
    }

    /// Raise an event on an element.
    ///
    /// The signal is emitted outside the registry lock.
    pub fn raise_event(
        &self,
        id: ElementId,
        kind: EventKind,
        payload: Option<Arc<dyn Any + Send + Sync>>,
    ) -> ElementResult<()> {
        let signals = self.inner.read().signals(id)?;
        let args = match payload {
            Some(payload) => EventArgs::with_payload(kind, id, payload),
            None => EventArgs::new(kind, id),
        };
        signals.raise(&args);
        Ok(())
    }

    /// Get the element's data context, if any.
    pub fn data_context(
        &self,
        id: ElementId,
    ) -> ElementResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.inner.read().data_context(id)
    }

    /// Set the element's data context and raise
    /// [`EventKind::DataContextChanged`].
    pub fn set_data_context(
        &self,
        id: ElementId,
        value: Option<Arc<dyn Any + Send + Sync>>,
    ) -> ElementResult<()> {
        let signals = {
            let mut inner = self.inner.write();
            let data = inner
                .elements
                .get_mut(id)
                .ok_or(ElementError::InvalidElementId)?;
            data.data_context = value;
            data.signals.clone()
        };
        signals.raise(&EventArgs::new(EventKind::DataContextChanged, id));
        Ok(())
    }

    /// Access the registry with a read lock for complex operations.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ElementRegistry) -> R,
    {
        f(&self.inner.read())
    }

    /// Access the registry with a write lock for complex operations.
    pub fn with_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ElementRegistry) -> R,
    {
        f(&mut self.inner.write())
    }
}

impl Default for SharedElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(SharedElementRegistry: Send, Sync);

/// Global element registry (lazily initialized on first access).
static GLOBAL_REGISTRY: OnceLock<SharedElementRegistry> = OnceLock::new();

/// Get the process-wide element registry.
pub fn global_registry() -> &'static SharedElementRegistry {
    GLOBAL_REGISTRY.get_or_init(SharedElementRegistry::new)
}
