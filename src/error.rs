//! Custom error types for the picker.
//!
//! This module defines the two error types callers deal with:
//!
//! - **`PickerError`**: everything that can go wrong while building a
//!   [`Picker`](crate::Picker) or looking a plugin up afterwards. Construction
//!   is all-or-nothing, so every construction variant names the offending
//!   plugin and keeps the underlying cause as its `source`.
//! - **`PluginError`**: the error half of a fallible plugin signature such as
//!   `fn(i64) -> Result<i64, PluginError>`. It is produced while a plugin is
//!   *invoked*, either because the script threw a value or because the
//!   safety wrapper recovered a fault.
//!
//! ## Error Hierarchy
//!
//! - **`Decode`** / **`Io`**: the configuration could not be read or parsed.
//! - **`Validation`**: a plugin description is malformed (see [`ValidationError`]).
//! - **`InjectedPathInvalid`**: a custom object key is not `name` or `pkg/name`.
//! - **`EngineSetup`**: the standard surface or the injected symbols could not be loaded.
//! - **`CodeGeneration`**: template rendering failed. Not expected with validated input.
//! - **`Evaluation`**: the generated unit failed to compile or run.
//! - **`Registration`**: the `register` entry point is missing, has the wrong
//!   shape, or raised an error (duplicate plugin names end up here).
//! - **`CreatePanicked`**: a Rust panic escaped while a plugin was being created.
//! - **`TypeMismatch`**: the registered value does not fit the requested signature.
//! - **`NotFound`**: lookup of an unknown plugin name.

use crate::scripting::ScriptError;
use crate::validate::ValidationError;
use rhai::Dynamic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the picker error type.
pub type PickerResult<T> = std::result::Result<T, PickerError>;

/// Errors raised while building a picker or looking plugins up.
#[derive(Error, Debug)]
pub enum PickerError {
    /// The configuration document could not be decoded.
    #[error("decode {format} data failed: {source}")]
    Decode {
        /// Name of the serialization format.
        format: &'static str,
        /// Decoder diagnostic.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A configuration file could not be read.
    #[error("read plugin file {path:?} failed: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A plugin description failed validation.
    #[error("validate plugin config failed, idx:{index}, name:{name}: {source}")]
    Validation {
        /// Position of the description in the plugin set.
        index: usize,
        /// Declared plugin name (may be empty).
        name: String,
        /// Which check failed.
        #[source]
        source: ValidationError,
    },

    /// A custom object key has more than one `/` or an empty segment.
    #[error("custom object path should contain at most one slash, data:{0}")]
    InjectedPathInvalid(String),

    /// The standard surface or the injected symbol table could not be loaded.
    #[error("engine setup failed: {0}")]
    EngineSetup(#[source] ScriptError),

    /// The plugin template could not be rendered.
    #[error("build code for plugin {name} failed: {source}")]
    CodeGeneration {
        /// Plugin being generated.
        name: String,
        /// Template engine diagnostic.
        #[source]
        source: minijinja::Error,
    },

    /// The generated unit did not compile or its top level failed.
    #[error("eval plugin {name} code failed: {source}")]
    Evaluation {
        /// Plugin being evaluated.
        name: String,
        /// Engine diagnostic.
        #[source]
        source: ScriptError,
    },

    /// The registration entry point is missing, malformed or failed.
    #[error("register plugin {name} failed: {source}")]
    Registration {
        /// Plugin being registered.
        name: String,
        /// Engine diagnostic.
        #[source]
        source: ScriptError,
    },

    /// A panic escaped while the plugin was being created.
    #[error("create plugin {name} panic: {message}, stack:{backtrace}")]
    CreatePanicked {
        /// Plugin being created.
        name: String,
        /// Panic payload rendered as text.
        message: String,
        /// Backtrace captured when the panic was recovered.
        backtrace: String,
    },

    /// The registered value does not match the requested signature.
    #[error("plugin:{plugin} function type not match, need:{expected}, current_type:{actual}")]
    TypeMismatch {
        /// Offending plugin.
        plugin: String,
        /// Requested signature, e.g. `fn(i64) -> i64`.
        expected: String,
        /// Registered value, e.g. `fn(x, y)` or `non-func type (i64)`.
        actual: String,
    },

    /// No plugin with this name was loaded.
    #[error("plugin:{0} not found")]
    NotFound(String),

    /// Settings could not be extracted.
    #[error("settings error: {0}")]
    Settings(#[from] figment::Error),
}

impl PickerError {
    /// Name of the plugin this error is about, if any.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            PickerError::Validation { name, .. }
            | PickerError::CodeGeneration { name, .. }
            | PickerError::Evaluation { name, .. }
            | PickerError::Registration { name, .. }
            | PickerError::CreatePanicked { name, .. }
            | PickerError::NotFound(name) => Some(name),
            PickerError::TypeMismatch { plugin, .. } => Some(plugin),
            _ => None,
        }
    }
}

/// Error returned by a plugin invocation with a fallible signature.
#[derive(Error, Debug, Clone)]
pub enum PluginError {
    /// The script raised a value with `throw`.
    #[error("plugin:{plugin} returned error: {value}")]
    Thrown {
        /// Plugin that threw.
        plugin: String,
        /// The thrown value.
        value: Dynamic,
    },

    /// A fault was recovered by the safety wrapper.
    #[error("panic recover from plugin:{plugin}, recover:{message}, stack:{backtrace}")]
    Panicked {
        /// Plugin that faulted.
        plugin: String,
        /// Fault description.
        message: String,
        /// Backtrace captured at the fault site when available.
        backtrace: String,
    },
}

impl PluginError {
    /// Plugin that produced the error.
    pub fn plugin(&self) -> &str {
        match self {
            PluginError::Thrown { plugin, .. } | PluginError::Panicked { plugin, .. } => plugin,
        }
    }
}
