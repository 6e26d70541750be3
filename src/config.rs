//! Picker construction options and settings.
//!
//! [`Options`] is the programmatic builder: host objects, host types and a
//! [`Settings`] block. `Settings` can also be loaded with figment from
//! defaults, an optional TOML file and `PICKER_`-prefixed environment
//! variables, later sources winning:
//!
//! ```text
//! PICKER_SAFE_WRAP=false
//! PICKER_TRACE_SOURCE=true
//! ```

use crate::error::PickerResult;
use crate::inject::{register_type, TypeRegistrar};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rhai::{CustomType, Dynamic};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::path::Path;

/// Environment variable prefix for settings.
pub const ENV_PREFIX: &str = "PICKER_";

/// Tunable picker behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Convert plugin faults into `Err(PluginError::Panicked)` for fallible shapes.
    pub safe_wrap: bool,
    /// Log every generated unit at debug level before it is evaluated.
    pub trace_source: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            safe_wrap: true,
            trace_source: false,
        }
    }
}

impl Settings {
    /// The layered figment: defaults, then `path` if given, then environment.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Defaults overridden by environment variables.
    pub fn load() -> PickerResult<Self> {
        let settings = Self::figment(None).extract()?;
        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }

    /// Defaults overridden by a TOML file, then by environment variables.
    pub fn load_from<P: AsRef<Path>>(path: P) -> PickerResult<Self> {
        let settings = Self::figment(Some(path.as_ref())).extract()?;
        tracing::debug!(path = %path.as_ref().display(), ?settings, "settings loaded");
        Ok(settings)
    }
}

/// Options for building a [`Picker`](crate::Picker).
#[derive(Clone, Default)]
pub struct Options {
    objects: Vec<(String, Dynamic)>,
    types: Vec<TypeRegistrar>,
    settings: Settings,
}

impl Options {
    /// Default options: no host objects, safe wrapping on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `value` to plugins as `host::key`, or `pkg::name` for a `pkg/name` key.
    ///
    /// Types with methods or properties also need [`with_custom_type`](Self::with_custom_type).
    #[must_use]
    pub fn with_custom_object<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Any + Clone + Send + Sync,
    {
        self.objects.push((key.into(), Dynamic::from(value)));
        self
    }

    /// Expose several values at once.
    #[must_use]
    pub fn with_custom_objects<K, I>(mut self, objects: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Dynamic)>,
    {
        self.objects
            .extend(objects.into_iter().map(|(key, value)| (key.into(), value)));
        self
    }

    /// Register the script API of a host type before any plugin is evaluated.
    #[must_use]
    pub fn with_custom_type<T: CustomType>(mut self) -> Self {
        self.types.push(register_type::<T>);
        self
    }

    /// Turn safe wrapping on or off.
    #[must_use]
    pub fn with_safe_func_wrap(mut self, enabled: bool) -> Self {
        self.settings.safe_wrap = enabled;
        self
    }

    /// Replace the settings block.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Host objects in the order they were added.
    pub fn objects(&self) -> impl Iterator<Item = (&str, &Dynamic)> {
        self.objects.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Host type registrars.
    pub fn types(&self) -> &[TypeRegistrar] {
        &self.types
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("objects", &self.objects.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("types", &self.types.len())
            .field("settings", &self.settings)
            .finish()
    }
}
