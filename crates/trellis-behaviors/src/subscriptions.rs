//! Scoped subscription management for behaviors.
//!
//! Event subscriptions acquired in `on_attached`-style hooks are scoped
//! resources: a correct behavior releases every subscription it acquires in
//! the paired teardown hook. [`Subscriptions`] is the helper for that
//! contract: collect disposer closures while attaching, release them all in
//! `on_detaching`. Dropping the bag releases anything still held, so a
//! behavior discarded without a detach does not leak its subscriptions.

use std::fmt;

/// A bag of disposer closures, released in reverse acquisition order.
#[derive(Default)]
pub struct Subscriptions {
    disposers: Vec<Box<dyn FnOnce() + Send>>,
}

impl Subscriptions {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self {
            disposers: Vec::new(),
        }
    }

    /// Add a disposer to run when the bag is released.
    pub fn add<F>(&mut self, disposer: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.disposers.push(Box::new(disposer));
    }

    /// Run and drop every held disposer, most recent first.
    pub fn release_all(&mut self) {
        while let Some(disposer) = self.disposers.pop() {
            disposer();
        }
    }

    /// The number of held disposers.
    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    /// Whether the bag holds no disposers.
    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions")
            .field("held", &self.disposers.len())
            .finish()
    }
}
