use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::catalog::workspace::{CatalogError, WorkspaceCatalog, WorkspaceKind};

#[derive(Debug, Clone)]
enum Entry<T> {
    Dataset(T),
    Group(Vec<String>),
}

/// Thread-safe catalog keeping everything in memory.
///
/// `T` is whatever payload a dataset carries; the catalog never looks at it.
#[derive(Debug)]
pub struct InMemoryCatalog<T> {
    entries: RwLock<BTreeMap<String, Entry<T>>>,
}

impl<T> Default for InMemoryCatalog<T> {
    fn default() -> Self {
        InMemoryCatalog { entries: RwLock::new(BTreeMap::new()) }
    }
}

impl<T> InMemoryCatalog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Entry<T>>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Entry<T>>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a dataset, replacing whatever was stored under the name before.
    pub fn add_dataset(&self, name: &str, payload: T) {
        self.write().insert(name.to_string(), Entry::Dataset(payload));
    }

    pub fn add_group(&self, name: &str, members: &[String]) -> Result<(), CatalogError> {
        let mut entries = self.write();
        if let Some(missing) = members.iter().find(|m| !entries.contains_key(m.as_str())) {
            return Err(CatalogError::MissingMember {
                group: name.to_string(),
                member: missing.clone(),
            });
        }
        entries.insert(name.to_string(), Entry::Group(members.to_vec()));
        Ok(())
    }

    // sorted, since entries live in a BTreeMap
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl<T: Clone> InMemoryCatalog<T> {
    /// Payload of a dataset, `None` for unknown names and groups.
    pub fn dataset(&self, name: &str) -> Option<T> {
        match self.read().get(name) {
            Some(Entry::Dataset(payload)) => Some(payload.clone()),
            _ => None,
        }
    }
}

impl<T: Send + Sync> WorkspaceCatalog for InMemoryCatalog<T> {
    fn kind(&self, name: &str) -> Result<WorkspaceKind, CatalogError> {
        match self.read().get(name) {
            Some(Entry::Dataset(_)) => Ok(WorkspaceKind::Single),
            Some(Entry::Group(members)) => Ok(WorkspaceKind::Group(members.clone())),
            None => Err(CatalogError::NotFound(name.to_string())),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    fn remove(&self, name: &str) -> Result<(), CatalogError> {
        self.write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    fn group(&self, name: &str, members: &[String]) -> Result<(), CatalogError> {
        self.add_group(name, members)
    }
}
