//! Run context threaded between the steps of one workflow run.
//!
//! The context is an insertion-ordered map of named values. Order only
//! matters for logging and debugging; lookups are always by key.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single value stored in the run context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Value {
    /// Free text (generated content, user input)
    Text(String),

    /// Boolean switch (feature flags for optional steps)
    Flag(bool),

    /// Filesystem path (artifact locations)
    Path(PathBuf),

    /// Structured record
    Record(serde_json::Value),
}

impl Value {
    /// Name of the variant, used in type mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Flag(_) => "flag",
            Self::Path(_) => "path",
            Self::Record(_) => "record",
        }
    }

    /// Convert to JSON for capability context data
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::Flag(flag) => serde_json::Value::Bool(*flag),
            Self::Path(path) => serde_json::Value::String(path.display().to_string()),
            Self::Record(record) => record.clone(),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<PathBuf> for Value {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Record(value)
    }
}

/// Errors raised when reading the run context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("missing context key '{key}'")]
    MissingKey { key: String },

    #[error("context key '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Mutable bag of named values for one workflow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunContext {
    values: IndexMap<String, Value>,
}

impl RunContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from initial parameters
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut context = Self::new();
        for (key, value) in params {
            context.set(key, value);
        }
        context
    }

    /// Read a value, failing if the key was never written
    pub fn get(&self, key: &str) -> Result<&Value, ContextError> {
        self.values.get(key).ok_or_else(|| ContextError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Read a value that may legitimately be absent
    pub fn get_opt(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Check whether a key has been written
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Read a text value
    pub fn get_text(&self, key: &str) -> Result<&str, ContextError> {
        match self.get(key)? {
            Value::Text(text) => Ok(text),
            other => Err(mismatch(key, "text", other)),
        }
    }

    /// Read an optional text value; present values of another type are an error
    pub fn get_text_opt(&self, key: &str) -> Result<Option<&str>, ContextError> {
        match self.get_opt(key) {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text)),
            Some(other) => Err(mismatch(key, "text", other)),
        }
    }

    /// Read a flag value
    pub fn get_flag(&self, key: &str) -> Result<bool, ContextError> {
        match self.get(key)? {
            Value::Flag(flag) => Ok(*flag),
            other => Err(mismatch(key, "flag", other)),
        }
    }

    /// Read a path value
    pub fn get_path(&self, key: &str) -> Result<&Path, ContextError> {
        match self.get(key)? {
            Value::Path(path) => Ok(path),
            other => Err(mismatch(key, "path", other)),
        }
    }

    /// Read a structured record
    pub fn get_record(&self, key: &str) -> Result<&serde_json::Value, ContextError> {
        match self.get(key)? {
            Value::Record(record) => Ok(record),
            other => Err(mismatch(key, "record", other)),
        }
    }

    /// Write a value, returning the one it replaced (last write wins)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// New context holding only the listed keys; every key must exist
    pub fn derive<'a, I>(&self, keys: I) -> Result<RunContext, ContextError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut derived = RunContext::new();
        for key in keys {
            let value = self.get(key)?.clone();
            derived.set(key, value);
        }
        Ok(derived)
    }

    /// New context holding whichever of the listed keys exist
    pub fn subset<'a, I>(&self, keys: I) -> RunContext
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut subset = RunContext::new();
        for key in keys {
            if let Some(value) = self.values.get(key) {
                subset.set(key, value.clone());
            }
        }
        subset
    }

    /// Merge another set of values into this context
    pub fn merge(&mut self, other: impl IntoIterator<Item = (String, Value)>) {
        for (key, value) in other {
            self.values.insert(key, value);
        }
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize the whole context as a JSON object (capability context data)
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl IntoIterator for RunContext {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

fn mismatch(key: &str, expected: &'static str, found: &Value) -> ContextError {
    ContextError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}
