//! Thread-safe map from machine id to handle.
//!
//! Every operation takes the lock only for the duration of a single map
//! mutation or read, so no caller ever observes a half-inserted or
//! half-removed entry. A poisoned lock is recovered rather than propagated:
//! each critical section leaves the map consistent before it can panic.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::machine::{MachineHandle, MachineStatus};

/// Named failures of registry operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// Raised when inserting an id that is already registered.
    #[error("machine {id} is already registered")]
    Duplicate {
        /// Conflicting machine identifier.
        id: String,
    },
    /// Raised when the id is not registered.
    #[error("machine {id} is not registered")]
    NotFound {
        /// Requested machine identifier.
        id: String,
    },
}

/// Registry of live machine handles.
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: RwLock<HashMap<String, MachineHandle>>,
}

impl MachineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, MachineHandle>> {
        self.machines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, MachineHandle>> {
        self.machines.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts the handle under its id. Existing entries are never
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the id is already present.
    pub fn put(&self, handle: MachineHandle) -> Result<(), RegistryError> {
        match self.write().entry(handle.id.clone()) {
            Entry::Occupied(occupied) => Err(RegistryError::Duplicate {
                id: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(handle);
                Ok(())
            }
        }
    }

    /// Returns a copy of the handle registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the id is absent.
    pub fn get(&self, id: &str) -> Result<MachineHandle, RegistryError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Removes and returns the handle registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the id is absent.
    pub fn remove(&self, id: &str) -> Result<MachineHandle, RegistryError> {
        self.write().remove(id).ok_or_else(|| not_found(id))
    }

    /// Moves the handle to `status` and returns the updated copy.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the id is absent.
    pub fn set_status(
        &self,
        id: &str,
        status: MachineStatus,
    ) -> Result<MachineHandle, RegistryError> {
        let mut machines = self.write();
        let handle = machines.get_mut(id).ok_or_else(|| not_found(id))?;
        handle.status = status;
        Ok(handle.clone())
    }

    /// Returns `true` when `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Number of registered machines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Copies of every registered handle, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MachineHandle> {
        let mut handles: Vec<MachineHandle> = self.read().values().cloned().collect();
        handles.sort_by(|lhs, rhs| lhs.id.cmp(&rhs.id));
        handles
    }
}

fn not_found(id: &str) -> RegistryError {
    RegistryError::NotFound { id: id.to_owned() }
}
