//! Named, read-only request payloads

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// A fixture document. Cloning shares the underlying body.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    name: String,
    body: Arc<Value>,
}

impl Fixture {
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// An owned copy of the body, for callers that need to build on it.
    pub fn to_value(&self) -> Value {
        self.body.as_ref().clone()
    }

    /// SHA-256 of the canonical serialization
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self.body.as_ref()).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Loads fixtures by exact name from a directory, with in-memory overrides
pub struct FixtureStore {
    dir: Option<PathBuf>,
    registered: RwLock<HashMap<String, Arc<Value>>>,
    cache: RwLock<HashMap<String, Arc<Value>>>,
}

impl FixtureStore {
    /// Store backed by `<dir>/<name>.json` files
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            registered: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Store with no backing directory
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            registered: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Register a fixture in memory. Shadows a file of the same name.
    pub fn register(&self, name: impl Into<String>, body: Value) {
        let name = normalize(&name.into()).to_string();
        self.cache.write().remove(&name);
        self.registered.write().insert(name, Arc::new(body));
    }

    pub fn load(&self, name: &str) -> E2eResult<Fixture> {
        let name = normalize(name);

        if let Some(body) = self.registered.read().get(name) {
            return Ok(Fixture {
                name: name.to_string(),
                body: Arc::clone(body),
            });
        }

        if let Some(body) = self.cache.read().get(name) {
            return Ok(Fixture {
                name: name.to_string(),
                body: Arc::clone(body),
            });
        }

        let path = self
            .path_for(name)
            .ok_or_else(|| E2eError::FixtureNotFound(name.to_string()))?;
        if !path.is_file() {
            return Err(E2eError::FixtureNotFound(name.to_string()));
        }

        let content = std::fs::read(&path)?;
        let body: Value = serde_json::from_slice(&content)?;
        let body = Arc::new(body);

        debug!("Loaded fixture '{}' from {}", name, path.display());

        // A concurrent loader may have won the race; keep whichever landed first.
        let body = Arc::clone(
            self.cache
                .write()
                .entry(name.to_string())
                .or_insert(body),
        );

        Ok(Fixture {
            name: name.to_string(),
            body,
        })
    }

    /// All fixture names available to `load`, sorted
    pub fn names(&self) -> E2eResult<Vec<String>> {
        let mut names: Vec<String> = self.registered.read().keys().cloned().collect();

        if let Some(dir) = self.dir.as_ref().filter(|d| d.is_dir()) {
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    if let Some(stem) = path.file_stem() {
                        names.push(stem.to_string_lossy().into_owned());
                    }
                }
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        // Names are plain file stems, never paths.
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        self.dir.as_ref().map(|dir| dir.join(format!("{}.json", name)))
    }
}

fn normalize(name: &str) -> &str {
    name.strip_suffix(".json").unwrap_or(name)
}
