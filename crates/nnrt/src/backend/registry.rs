//! Backend registry for selecting backends by name at compile time.
//!
//! Unlike a process-wide table, a registry is an ordinary value: the embedder builds one,
//! lets each backend crate add itself (`nnrt_backend_tflite::register(&mut registry)`), and
//! hands it to [`compile`](crate::compiler::compile).

use super::spec::Backend;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Factory function that creates a new backend instance.
pub type BackendConstructor = Box<dyn Fn() -> Arc<dyn Backend> + Send + Sync>;

#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend by name. A later registration replaces an earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn Backend> + Send + Sync + 'static,
    {
        self.backends.insert(name.into(), Box::new(constructor));
    }

    /// Create a backend instance by name.
    ///
    /// Returns `None` if no backend with the given name has been registered.
    pub fn create(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(name).map(|constructor| constructor())
    }

    /// List all registered backend names, sorted.
    pub fn list_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_backend(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.list_backends())
            .finish()
    }
}
