//! Error types for the Trellis host substrate.

use std::fmt;

/// Errors that can occur during element registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    /// The element ID is invalid or has been destroyed.
    InvalidElementId,
    /// Attempted to set an element as its own parent/ancestor.
    CircularParentage,
    /// Attempted to mount a subtree whose root is already mounted.
    AlreadyMounted,
    /// Attempted to unmount a subtree whose root is not mounted.
    NotMounted,
}

impl fmt::Display for ElementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidElementId => write!(f, "Invalid or destroyed element ID"),
            Self::CircularParentage => {
                write!(f, "Cannot set an element as its own parent or ancestor")
            }
            Self::AlreadyMounted => write!(f, "Element is already mounted"),
            Self::NotMounted => write!(f, "Element is not mounted"),
        }
    }
}

impl std::error::Error for ElementError {}

/// Result type for element registry operations.
pub type ElementResult<T> = std::result::Result<T, ElementError>;
