//! The plugin picker.
//!
//! [`Picker`] turns a [`PluginSet`] into named, strongly typed callables.
//! Loading is all-or-nothing: every description is validated, rendered,
//! evaluated, registered and type-checked against the requested shape `S`
//! before the picker is handed back.
//!
//! # Example
//!
//! ```
//! use script_picker::{Options, Picker, PluginDescription, PluginSet};
//!
//! let set = PluginSet::new(vec![PluginDescription::new("double", "|x| x * 2")]);
//! let picker = Picker::<fn(i64) -> i64>::load(&set, Options::new())?;
//!
//! let double = picker.get("double")?;
//! assert_eq!(double(21), 42);
//! assert_eq!(picker.list(), ["double"]);
//! # Ok::<(), script_picker::PickerError>(())
//! ```

use crate::config::{Options, Settings};
use crate::container::Container;
use crate::decoder::{read_file, Decoder, Format};
use crate::error::{PickerError, PickerResult};
use crate::inject::build_symbol_table;
use crate::model::{PluginDescription, PluginSet};
use crate::safe;
use crate::scripting::{EvaluatedUnit, RhaiEngine, ScriptEngine, ScriptError};
use crate::signature::{FnShape, Signature};
use crate::template;
use crate::validate::validate;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Where a load currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Engine created, nothing loaded.
    Created,
    /// Standard modules installed.
    StdlibLoaded,
    /// Host symbols installed.
    CustomSymbolsLoaded,
    /// Plugins are being created.
    Initializing,
    /// All plugins are available.
    Ready,
    /// Loading stopped on an error.
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::Created => "Created",
            LoadState::StdlibLoaded => "StdlibLoaded",
            LoadState::CustomSymbolsLoaded => "CustomSymbolsLoaded",
            LoadState::Initializing => "Initializing",
            LoadState::Ready => "Ready",
            LoadState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Named plugin callables of shape `S`.
///
/// `S` is a fn-pointer type such as `fn(i64) -> i64` or
/// `fn(Context) -> Result<String, PluginError>`. Callables are
/// `Arc<dyn Fn(..) -> R + Send + Sync>` and can be cloned out and shared
/// across threads.
pub struct Picker<S: Signature> {
    plugins: HashMap<String, S::Callable>,
    names: Vec<String>,
    shape: FnShape,
    settings: Settings,
    state: LoadState,
}

impl<S: Signature> Picker<S> {
    /// Build a picker from decoded plugin descriptions.
    pub fn load(set: &PluginSet, options: Options) -> PickerResult<Self> {
        let mut loader = Loader {
            state: LoadState::Created,
        };
        match loader.run::<S>(set, &options) {
            Ok((plugins, names)) => {
                tracing::info!(plugins = names.len(), shape = %S::shape(), "plugins loaded");
                Ok(Self {
                    plugins,
                    names,
                    shape: S::shape(),
                    settings: options.settings().clone(),
                    state: loader.state,
                })
            }
            Err(err) => {
                loader.advance(LoadState::Failed);
                tracing::warn!(error = %err, "load plugins failed");
                Err(err)
            }
        }
    }

    /// Decode `data` with `decoder`, then [`load`](Self::load).
    pub fn parse_data<D: Decoder + ?Sized>(data: &[u8], decoder: &D, options: Options) -> PickerResult<Self> {
        let set = decoder.decode(data)?;
        Self::load(&set, options)
    }

    /// Load a file, picking the format from its extension
    /// (`.yaml`/`.yml`, `.json`, `.toml`).
    pub fn parse_file<P: AsRef<Path>>(path: P, options: Options) -> PickerResult<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path).ok_or_else(|| PickerError::Decode {
            format: "unknown",
            source: format!("unsupported plugin file extension: {}", path.display()).into(),
        })?;
        Self::parse_data(&read_file(path)?, &format, options)
    }

    /// Load a YAML file.
    pub fn parse_yaml_file<P: AsRef<Path>>(path: P, options: Options) -> PickerResult<Self> {
        Self::parse_data(&read_file(path.as_ref())?, &Format::Yaml, options)
    }

    /// Load a JSON file.
    pub fn parse_json_file<P: AsRef<Path>>(path: P, options: Options) -> PickerResult<Self> {
        Self::parse_data(&read_file(path.as_ref())?, &Format::Json, options)
    }

    /// Load a TOML file.
    pub fn parse_toml_file<P: AsRef<Path>>(path: P, options: Options) -> PickerResult<Self> {
        Self::parse_data(&read_file(path.as_ref())?, &Format::Toml, options)
    }

    /// The callable registered as `name`.
    pub fn get(&self, name: &str) -> PickerResult<S::Callable> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| PickerError::NotFound(name.to_string()))
    }

    /// Plugin names in load order.
    pub fn list(&self) -> &[String] {
        &self.names
    }

    /// Number of plugins.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no plugins were loaded.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Load state. Always [`LoadState::Ready`] for a picker that was returned.
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// The requested shape.
    pub fn shape(&self) -> &FnShape {
        &self.shape
    }

    /// Settings the picker was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<S: Signature> fmt::Debug for Picker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picker")
            .field("shape", &self.shape.to_string())
            .field("plugins", &self.names)
            .field("state", &self.state)
            .finish()
    }
}

type Loaded<C> = (HashMap<String, C>, Vec<String>);

struct Loader {
    state: LoadState,
}

impl Loader {
    fn advance(&mut self, next: LoadState) {
        tracing::debug!(from = %self.state, to = %next, "picker state changed");
        self.state = next;
    }

    fn run<S: Signature>(&mut self, set: &PluginSet, options: &Options) -> PickerResult<Loaded<S::Callable>> {
        let shape = S::shape();
        let settings = options.settings();
        let mut engine = RhaiEngine::new();

        engine.load_stdlib().map_err(PickerError::EngineSetup)?;
        self.advance(LoadState::StdlibLoaded);

        let table = build_symbol_table(options.objects(), options.types())?;
        engine.load_symbols(&table).map_err(PickerError::EngineSetup)?;
        self.advance(LoadState::CustomSymbolsLoaded);

        self.advance(LoadState::Initializing);
        let mut container = Container::new();
        let mut units: Vec<EvaluatedUnit> = Vec::with_capacity(set.plugins.len());
        let mut owner: HashMap<String, usize> = HashMap::new();

        for (index, desc) in set.plugins.iter().enumerate() {
            validate(desc).map_err(|source| PickerError::Validation {
                index,
                name: desc.name.clone(),
                source,
            })?;

            let before = container.len();
            let (unit, next) = create(&mut engine, desc, &set.imports, container, settings)?;
            container = next;
            for name in container.names().skip(before) {
                owner.insert(name.to_string(), units.len());
            }
            units.push(unit);
        }

        for (name, value) in container.iter() {
            let unit = owning_unit(&units, &owner, name)?;
            let actual = engine.inspect(unit, value);
            if !actual.fits(&shape) {
                return Err(PickerError::TypeMismatch {
                    plugin: name.to_string(),
                    expected: shape.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        let sealed = engine.seal();
        let mut plugins = HashMap::with_capacity(container.len());
        let mut names = Vec::with_capacity(container.len());
        for (name, value) in container {
            let unit = owning_unit(&units, &owner, &name)?;
            let func = sealed
                .bind(unit, value)
                .map_err(|source| PickerError::Registration {
                    name: name.clone(),
                    source,
                })?;
            let callable = safe::wrap::<S>(&name, S::bind(&name, func), settings.safe_wrap);
            plugins.insert(name.clone(), callable);
            names.push(name);
        }

        self.advance(LoadState::Ready);
        Ok((plugins, names))
    }
}

/// The unit whose `register` call put `name` into the container.
fn owning_unit<'u>(
    units: &'u [EvaluatedUnit],
    owner: &HashMap<String, usize>,
    name: &str,
) -> PickerResult<&'u EvaluatedUnit> {
    owner
        .get(name)
        .and_then(|&index| units.get(index))
        .ok_or_else(|| PickerError::Registration {
            name: name.to_string(),
            source: ScriptError::FunctionNotFound {
                name: format!("unit registering {name}"),
            },
        })
}

/// Render, evaluate and register one plugin, turning panics into errors.
fn create(
    engine: &mut RhaiEngine,
    desc: &PluginDescription,
    global_imports: &[String],
    container: Container,
    settings: &Settings,
) -> PickerResult<(EvaluatedUnit, Container)> {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> PickerResult<(EvaluatedUnit, Container)> {
        let unit = template::generate(desc, global_imports)?;
        if settings.trace_source {
            tracing::debug!(plugin = %desc.name, package = %unit.package, "generated unit:\n{}", unit.source);
        }

        let evaluated = engine
            .evaluate(&unit)
            .map_err(|source| PickerError::Evaluation {
                name: desc.name.clone(),
                source,
            })?;
        let container = engine
            .register(&evaluated, container)
            .map_err(|source| PickerError::Registration {
                name: desc.name.clone(),
                source,
            })?;
        Ok((evaluated, container))
    }));

    outcome.unwrap_or_else(|payload| {
        let (message, backtrace) = safe::payload_details(payload.as_ref());
        tracing::warn!(plugin = %desc.name, "plugin creation panicked: {}", message);
        Err(PickerError::CreatePanicked {
            name: desc.name.clone(),
            message,
            backtrace,
        })
    })
}
