//! Suite name to suite lookup

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::suite::TestSuite;

/// Registered test suites, keyed by name
#[derive(Default)]
pub struct SuiteRegistry {
    suites: BTreeMap<String, Arc<dyn TestSuite>>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `suite` under `name`, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, suite: Arc<dyn TestSuite>) {
        self.suites.insert(name.into(), suite);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TestSuite>> {
        self.suites.get(name).cloned()
    }

    /// All suite names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.suites.keys().map(String::as_str).collect()
    }
}
