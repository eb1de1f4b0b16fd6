//! Descriptors for the resources a controller resource depends on or owns.
//!
//! Concrete operators build these fresh for every invocation and keep a clone
//! of each descriptor's [`Binding`] to read the reconciled object afterwards.

mod child;
mod dependency;

pub use child::{ChildDescriptor, ChildResource};
pub use dependency::{DependencyDescriptor, DependencyResource};

use std::sync::{Arc, Mutex, PoisonError};

use crate::status::Status;

/// Shared output slot filled by the pipeline with the live object.
pub struct Binding<T>(Arc<Mutex<Option<T>>>);

impl<T> Binding<T> {
    pub fn new() -> Self {
        Binding(Arc::new(Mutex::new(None)))
    }

    pub fn set(&self, value: T) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn is_bound(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn take(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl<T: Clone> Binding<T> {
    pub fn get(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Binding(self.0.clone())
    }
}

impl<T> Default for Binding<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Result of a child generator.
#[derive(Clone, Debug)]
pub enum Generated<T> {
    /// Desired state of the child.
    Resource(T),
    /// The child should not exist right now; carries the name of the child
    /// whose status entry should be dropped, when known.
    Skip(Option<String>),
}

pub(crate) type StatusGetter<T> = Box<dyn Fn(&T) -> Status + Send + Sync>;

pub(crate) fn always_ready<T>() -> StatusGetter<T> {
    Box::new(|_| Status::ready())
}
