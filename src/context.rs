//! Shared bookkeeping owned by a registry context.
//!
//! Holds the two append-only tables the service system consults:
//!
//! - the set of claimed [`ServiceType`](crate::ServiceType) names;
//! - the mapping from service name to the type names declared acceptable for it.
//!
//! A context is created explicitly and handed to every [`System`](crate::System) that should
//! share these tables, instead of living in a process-wide static.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use tracing::debug;

use crate::{RegistryError, Result};

#[derive(Debug, Default)]
pub struct RegistryContext {
    type_names: Mutex<HashSet<String>>,
    service_types: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl RegistryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `type_name` for a new service type descriptor.
    ///
    /// Names are never released.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidValue`] when `type_name` is empty
    /// - [`RegistryError::TypeNameTaken`] when the name was claimed before
    pub fn claim_type_name(&self, type_name: &str) -> Result<()> {
        if type_name.is_empty() {
            return Err(RegistryError::InvalidValue { what: "type name" });
        }

        let mut names = self.type_names.lock().unwrap_or_else(|p| p.into_inner());
        if !names.insert(type_name.to_owned()) {
            return Err(RegistryError::TypeNameTaken {
                type_name: type_name.to_owned(),
            });
        }
        Ok(())
    }

    pub fn is_type_name_claimed(&self, type_name: &str) -> bool {
        self.type_names
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(type_name)
    }

    /// Record `type_name` as acceptable for service `name`. Declarations accumulate.
    pub fn declare_service_type(&self, name: &str, type_name: &str) {
        let mut mapping = self.service_types.lock().unwrap_or_else(|p| p.into_inner());
        let inserted = mapping
            .entry(name.to_owned())
            .or_default()
            .insert(type_name.to_owned());

        if inserted {
            debug!(service = name, type_name, "declared accepted service type");
        }
    }

    /// Whether `type_name` was declared for service `name`.
    pub fn is_service_type_declared(&self, name: &str, type_name: &str) -> bool {
        self.service_types
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .is_some_and(|types| types.contains(type_name))
    }

    /// Snapshot of the type names declared for service `name`, sorted.
    pub fn declared_types(&self, name: &str) -> Vec<String> {
        self.service_types
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .map(|types| types.iter().cloned().collect())
            .unwrap_or_default()
    }
}
