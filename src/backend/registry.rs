//! Driver registry
//!
//! Explicit name -> driver mapping owned by the host process (or a test). Controllers that
//! resolve cross-backend associations receive a registry handle instead of consulting any
//! global state, so differently-configured controllers can run side by side.

use crate::backend::BackendDriver;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registered backend drivers, keyed by driver name
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn BackendDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under its own name, returning any driver it replaces.
    pub fn register(&mut self, driver: Arc<dyn BackendDriver>) -> Option<Arc<dyn BackendDriver>> {
        self.drivers.insert(driver.name().to_string(), driver)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BackendDriver>> {
        self.drivers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .finish()
    }
}
