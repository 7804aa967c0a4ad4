//! Schema Registry
//!
//! Maps action names to schemas. Registration happens once at startup;
//! afterwards the registry is only read, typically behind an `Arc`, and
//! each lookup hands out a shared reference to an immutable schema.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::definition::SchemaDocument;
use crate::error::{Result, SchemaError};
use crate::evaluator::{EvaluationOptions, Evaluator};
use crate::report::ValidationReport;
use crate::schema::Schema;

/// Action name to schema mapping
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
    evaluator: Evaluator,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EvaluationOptions) -> Self {
        Self {
            schemas: HashMap::new(),
            evaluator: Evaluator::new(options),
        }
    }

    /// Build a registry from the declaration files named in `config`
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut registry = Self::with_options(config.evaluation_options());
        for path in &config.registry.definitions {
            if path.is_dir() {
                registry.load_dir(path)?;
            } else {
                registry.load_file(path)?;
            }
        }
        Ok(registry)
    }

    /// Register a schema for an action that has none yet
    pub fn register(&mut self, action: impl Into<String>, schema: Schema) -> Result<()> {
        let action = action.into();
        if self.schemas.contains_key(&action) {
            return Err(SchemaError::AlreadyRegistered(action));
        }
        debug!(action = %action, "registered schema");
        self.schemas.insert(action, Arc::new(schema));
        Ok(())
    }

    /// Explicit re-registration; returns the schema that was replaced
    pub fn replace(&mut self, action: impl Into<String>, schema: Schema) -> Option<Arc<Schema>> {
        let action = action.into();
        debug!(action = %action, "replaced schema");
        self.schemas.insert(action, Arc::new(schema))
    }

    pub fn remove(&mut self, action: &str) -> Option<Arc<Schema>> {
        let removed = self.schemas.remove(action);
        if removed.is_some() {
            debug!(action, "removed schema");
        }
        removed
    }

    pub fn get(&self, action: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(action)
    }

    /// Like [`get`](Self::get), for callers that require a schema
    pub fn require(&self, action: &str) -> Result<&Arc<Schema>> {
        self.get(action)
            .ok_or_else(|| SchemaError::NotFound(action.to_string()))
    }

    pub fn contains(&self, action: &str) -> bool {
        self.schemas.contains_key(action)
    }

    /// Registered action names, sorted
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Validate a payload for `action`.
    ///
    /// An action without a schema has no validation configured and is
    /// always valid.
    pub fn validate(&self, action: &str, value: &Value) -> ValidationReport {
        match self.schemas.get(action) {
            Some(schema) => self.evaluator.validate(schema, value),
            None => {
                debug!(action, "no schema registered, skipping validation");
                ValidationReport::vacuous()
            }
        }
    }

    /// Register every action of a document; returns how many were added.
    ///
    /// Either all actions are registered or none are.
    pub fn load_document(&mut self, document: &SchemaDocument) -> Result<usize> {
        self.register_all(document.build()?)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let document = SchemaDocument::from_path(path)?;
        self.load_document(&document)
    }

    /// Load every `.toml` and `.json` document below `dir`, in path order.
    ///
    /// All documents are read and built before anything is registered, so a
    /// failure leaves the registry unchanged.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let mut paths: Vec<_> = WalkDir::new(dir.as_ref())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext == "toml" || ext == "json")
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut schemas = Vec::new();
        for path in paths {
            schemas.extend(SchemaDocument::from_path(&path)?.build()?);
        }
        self.register_all(schemas)
    }

    /// Register a batch after checking every key, against the registry and
    /// within the batch
    fn register_all(&mut self, schemas: Vec<(String, Schema)>) -> Result<usize> {
        let mut incoming = HashSet::new();
        for (action, _) in &schemas {
            if self.schemas.contains_key(action) || !incoming.insert(action.as_str()) {
                return Err(SchemaError::AlreadyRegistered(action.clone()));
            }
        }

        let count = schemas.len();
        for (action, schema) in schemas {
            debug!(action = %action, "registered schema");
            self.schemas.insert(action, Arc::new(schema));
        }
        Ok(count)
    }
}
