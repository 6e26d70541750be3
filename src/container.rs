//! Write-once plugin container.
//!
//! Generated units receive a [`Container`] through their `register` entry
//! point and add the plugin value under its name. Names cannot be registered
//! twice, and iteration follows registration order.

use rhai::{CustomType, Dynamic, EvalAltResult, ImmutableString, Position, TypeBuilder};
use std::collections::HashMap;
use thiserror::Error;

/// Name scripts see for the container type, and the value of `host::CONTAINER`.
pub const CONTAINER_TYPE_NAME: &str = "Container";

/// Container registration failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// A plugin with the same name was already registered.
    #[error("plugin:{0} exists")]
    Duplicate(String),
}

/// Insertion-ordered map from plugin name to the value the plugin registered.
#[derive(Debug, Clone, Default)]
pub struct Container {
    entries: Vec<(String, Dynamic)>,
    index: HashMap<String, usize>,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` under `name`. Fails if `name` is taken.
    pub fn register(&mut self, name: impl Into<String>, value: Dynamic) -> Result<(), ContainerError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ContainerError::Duplicate(name));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
        Ok(())
    }

    /// Value registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Dynamic> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Whether `name` has been registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dynamic)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl IntoIterator for Container {
    type Item = (String, Dynamic);
    type IntoIter = std::vec::IntoIter<(String, Dynamic)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// Script-facing methods. Rhai needs `&mut self` receivers.

fn script_register(
    container: &mut Container,
    name: ImmutableString,
    value: Dynamic,
) -> Result<(), Box<EvalAltResult>> {
    container
        .register(name.as_str(), value)
        .map_err(|e| Box::new(EvalAltResult::ErrorRuntime(e.to_string().into(), Position::NONE)))
}

fn script_len(container: &mut Container) -> i64 {
    i64::try_from(container.len()).unwrap_or(i64::MAX)
}

fn script_contains(container: &mut Container, name: ImmutableString) -> bool {
    container.contains(name.as_str())
}

impl CustomType for Container {
    fn build(mut builder: TypeBuilder<Self>) {
        builder
            .with_name(CONTAINER_TYPE_NAME)
            .with_fn("register", script_register)
            .with_fn("contains", script_contains)
            .with_get("len", script_len);
    }
}
