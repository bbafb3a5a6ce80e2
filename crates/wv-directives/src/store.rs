//! Keyed widget state shared by every directive on a page.
//!
//! Keys have the form `scope#dotted.path`, for example
//! `page#elements.serialized.queryTable.<uuid>` or
//! `hardcoded#queryType.sparql.dng.afsr`.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

/// Scope part of a store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Metadata of the current page.
    Page,
    /// Metadata of the document the page belongs to.
    Document,
    /// Static values from configuration; read-only.
    Hardcoded,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Document => "document",
            Self::Hardcoded => "hardcoded",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(Self::Page),
            "document" => Ok(Self::Document),
            "hardcoded" => Ok(Self::Hardcoded),
            other => Err(StoreError::UnknownScope(other.to_owned())),
        }
    }
}

/// Object store error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    #[error("invalid store key \"{0}\"; expected scope#path")]
    InvalidKey(String),

    #[error("unknown store scope \"{0}\"")]
    UnknownScope(String),

    #[error("store scope \"{0}\" is read-only")]
    ReadOnly(Scope),

    /// A path segment runs through a non-object value.
    #[error("\"{0}\" is not an object")]
    NotAnObject(String),
}

/// Parsed store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKey {
    pub scope: Scope,
    pub path: Vec<String>,
}

impl FromStr for StoreKey {
    type Err = StoreError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let (scope, path) = key
            .split_once('#')
            .ok_or_else(|| StoreError::InvalidKey(key.to_owned()))?;
        let scope = scope.parse()?;
        let path: Vec<String> = path.split('.').map(str::to_owned).collect();
        if path.iter().any(String::is_empty) {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        Ok(Self { scope, path })
    }
}

#[derive(Debug)]
struct Scopes {
    page: Value,
    document: Value,
    hardcoded: Value,
}

impl Scopes {
    fn get(&self, scope: Scope) -> &Value {
        match scope {
            Scope::Page => &self.page,
            Scope::Document => &self.document,
            Scope::Hardcoded => &self.hardcoded,
        }
    }
}

/// Object store over the page, document and hardcoded scopes.
///
/// Access goes through an internal lock, so a shared reference is enough to
/// write.
#[derive(Debug)]
pub struct ObjectStore {
    scopes: Mutex<Scopes>,
}

impl ObjectStore {
    /// Create a store. Non-object roots are replaced by empty objects.
    pub fn new(page: Value, document: Value, hardcoded: Value) -> Self {
        let object = |value: Value| {
            if value.is_object() {
                value
            } else {
                Value::Object(Map::new())
            }
        };
        Self {
            scopes: Mutex::new(Scopes {
                page: object(page),
                document: object(document),
                hardcoded: object(hardcoded),
            }),
        }
    }

    /// Value at `key`, cloned.
    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let key: StoreKey = key.parse()?;
        let scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut current = scopes.get(key.scope);
        for segment in &key.path {
            match current.get(segment) {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current.clone()))
    }

    /// Store `value` at `key`, creating intermediate objects.
    pub fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let key: StoreKey = key.parse()?;
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        let root = match key.scope {
            Scope::Page => &mut scopes.page,
            Scope::Document => &mut scopes.document,
            Scope::Hardcoded => return Err(StoreError::ReadOnly(Scope::Hardcoded)),
        };

        let Some((last, parents)) = key.path.split_last() else {
            return Err(StoreError::InvalidKey(String::new()));
        };
        let mut current = root;
        for (depth, segment) in parents.iter().enumerate() {
            let Value::Object(map) = current else {
                return Err(StoreError::NotAnObject(key.path[..depth].join(".")));
            };
            current = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let Value::Object(map) = current else {
            return Err(StoreError::NotAnObject(parents.join(".")));
        };
        map.insert(last.clone(), value);
        Ok(())
    }

    /// Value at `key`, or `default` after storing it.
    pub fn get_or_insert(&self, key: &str, default: Value) -> Result<Value, StoreError> {
        if let Some(existing) = self.get(key)? {
            return Ok(existing);
        }
        self.set(key, default.clone())?;
        Ok(default)
    }

    /// Snapshot of a whole scope.
    pub fn scope(&self, scope: Scope) -> Value {
        self.scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .clone()
    }
}
