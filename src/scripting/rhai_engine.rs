//! Rhai implementation of the [`ScriptEngine`] capability.
//!
//! Every module a unit can import (`context`, `fmt`, `host` and any injected
//! package) is installed twice: in a static module resolver, so
//! `import "pkg" as pkg;` works, and as a static module, so `pkg::name` also
//! resolves inside closures called long after the unit's imports have gone
//! out of scope.
//!
//! Once all units are registered, [`RhaiEngine::seal`] freezes the engine
//! behind an `Arc` and [`SealedEngine::bind`] turns registered closures into
//! [`ScriptFn`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut engine = RhaiEngine::new();
//! engine.load_stdlib()?;
//! engine.load_symbols(&table)?;
//!
//! let unit = engine.evaluate(&generated)?;
//! let container = engine.register(&unit, Container::new())?;
//!
//! let sealed = engine.seal();
//! let double = sealed.bind(&unit, container.get("double").cloned().unwrap())?;
//! assert_eq!(double(vec![21_i64.into()])?.as_int()?, 42);
//! ```

use super::script_engine::{EvaluatedUnit, ScriptEngine, ScriptError};
use super::stdlib::{self, Context};
use crate::container::Container;
use crate::inject::SymbolTable;
use crate::signature::ValueShape;
use crate::template::GeneratedUnit;
use once_cell::sync::Lazy;
use regex::Regex;
use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, Module, Scope};
use std::collections::BTreeMap;
use std::sync::Arc;

/// `tracing` target for script `print` and `debug` output.
pub const SCRIPT_LOG_TARGET: &str = "script_picker::script";

/// A script closure bound to the engine and unit that created it.
pub type ScriptFn = Arc<dyn Fn(Vec<Dynamic>) -> Result<Dynamic, ScriptError> + Send + Sync>;

#[allow(clippy::expect_used)]
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

// =============================================================================
// RhaiEngine Implementation
// =============================================================================

/// Rhai-based implementation of [`ScriptEngine`].
///
/// The engine is owned outright while plugins load. Operation limits are
/// left at Rhai's defaults.
pub struct RhaiEngine {
    engine: Engine,
    modules: BTreeMap<String, Module>,
}

impl RhaiEngine {
    /// Create an engine with script output routed to `tracing`.
    pub fn new() -> Self {
        let mut engine = Engine::new();

        engine.on_print(|text| {
            tracing::info!(target: SCRIPT_LOG_TARGET, "{}", text);
        });
        engine.on_debug(|text, source, pos| {
            tracing::debug!(
                target: SCRIPT_LOG_TARGET,
                source = source.unwrap_or(""),
                position = %pos,
                "{}",
                text
            );
        });

        Self {
            engine,
            modules: BTreeMap::new(),
        }
    }

    /// Names of installed modules.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Freeze the engine for concurrent use by bound closures.
    pub fn seal(self) -> SealedEngine {
        SealedEngine {
            engine: Arc::new(self.engine),
        }
    }

    fn module_entry(&mut self, name: &str) -> &mut Module {
        self.modules.entry(name.to_string()).or_default()
    }

    fn install_modules(&mut self) {
        let mut resolver = StaticModuleResolver::new();
        for (name, module) in &self.modules {
            resolver.insert(name.as_str(), module.clone());
            self.engine
                .register_static_module(name.as_str(), module.clone().into());
        }
        self.engine.set_module_resolver(resolver);
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ScriptEngine Trait Implementation
// =============================================================================

impl ScriptEngine for RhaiEngine {
    fn load_stdlib(&mut self) -> Result<(), ScriptError> {
        self.engine.build_type::<Container>();
        self.engine.build_type::<Context>();
        self.modules
            .insert(stdlib::CONTEXT_PACKAGE.to_string(), stdlib::context_module());
        self.modules
            .insert(stdlib::FMT_PACKAGE.to_string(), stdlib::fmt_module());
        self.install_modules();
        Ok(())
    }

    fn load_symbols(&mut self, table: &SymbolTable) -> Result<(), ScriptError> {
        for register in table.types() {
            register(&mut self.engine);
        }

        for (package, symbols) in table.packages() {
            for (name, value) in symbols {
                if !IDENTIFIER.is_match(package) || !IDENTIFIER.is_match(name) {
                    return Err(ScriptError::BackendError {
                        backend: self.backend_name().to_string(),
                        message: format!("{}/{} is not a valid script identifier", package, name),
                    });
                }
                self.module_entry(package).set_var(name.as_str(), value.clone());
            }
        }

        self.install_modules();
        Ok(())
    }

    fn evaluate(&mut self, unit: &GeneratedUnit) -> Result<EvaluatedUnit, ScriptError> {
        let mut ast = self
            .engine
            .compile(&unit.source)
            .map_err(|e| convert_rhai_error(e.into()))?;
        ast.set_source(unit.package.as_str());

        self.engine
            .run_ast_with_scope(&mut Scope::new(), &ast)
            .map_err(convert_rhai_error)?;

        tracing::debug!(package = %unit.package, "evaluated plugin unit");

        Ok(EvaluatedUnit {
            name: unit.name.clone(),
            package: unit.package.clone(),
            register: unit.register.clone(),
            ast: Arc::new(ast),
        })
    }

    fn register(&self, unit: &EvaluatedUnit, container: Container) -> Result<Container, ScriptError> {
        let qualified = format!("{}::{}", unit.package, unit.register);
        match unit.ast.iter_functions().find(|f| f.name == unit.register) {
            None => return Err(ScriptError::FunctionNotFound { name: qualified }),
            Some(f) if f.params.len() != 1 => {
                return Err(ScriptError::FunctionNotFound {
                    name: format!("{}(container), found {}({})", qualified, f.name, f.params.join(", ")),
                })
            }
            Some(_) => {}
        }

        self.engine
            .call_fn::<Container>(&mut Scope::new(), &unit.ast, &unit.register, (container,))
            .map_err(convert_rhai_error)
    }

    fn inspect(&self, unit: &EvaluatedUnit, value: &Dynamic) -> ValueShape {
        let value = value.clone().flatten();
        match value.try_cast_result::<FnPtr>() {
            Ok(fn_ptr) => {
                let curried = fn_ptr.curry().len();
                match unit.ast.iter_functions().find(|f| f.name == fn_ptr.fn_name()) {
                    Some(meta) => ValueShape::Function {
                        params: meta.params.iter().skip(curried).map(|p| p.to_string()).collect(),
                    },
                    None => ValueShape::Native {
                        name: fn_ptr.fn_name().to_string(),
                    },
                }
            }
            Err(value) => ValueShape::Value {
                type_name: self.engine.map_type_name(value.type_name()).to_string(),
            },
        }
    }

    fn backend_name(&self) -> &str {
        "Rhai"
    }
}

// =============================================================================
// Sealed engine
// =============================================================================

/// A frozen engine shared by every bound closure of a picker.
#[derive(Clone)]
pub struct SealedEngine {
    engine: Arc<Engine>,
}

impl SealedEngine {
    /// Bind a registered closure to this engine and its unit.
    pub fn bind(&self, unit: &EvaluatedUnit, value: Dynamic) -> Result<ScriptFn, ScriptError> {
        let fn_ptr = value.flatten().try_cast_result::<FnPtr>().map_err(|found| {
            ScriptError::TypeConversionError {
                expected: "Fn".to_string(),
                found: self.engine.map_type_name(found.type_name()).to_string(),
            }
        })?;
        let engine = Arc::clone(&self.engine);
        let ast = Arc::clone(&unit.ast);

        Ok(Arc::new(move |args: Vec<Dynamic>| {
            fn_ptr
                .call::<Dynamic>(&engine, &ast, args)
                .map_err(convert_rhai_error)
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Convert Rhai's EvalAltResult to our ScriptError type
///
/// Errors raised inside nested calls are unwrapped to the innermost cause.
pub(crate) fn convert_rhai_error(error: Box<EvalAltResult>) -> ScriptError {
    match error.unwrap_inner() {
        EvalAltResult::ErrorParsing(parse_error, pos) => ScriptError::CompilationError {
            message: format!("{}", parse_error),
            line: pos.line(),
            column: pos.position(),
        },
        EvalAltResult::ErrorRuntime(value, _) => ScriptError::Thrown {
            value: value.clone(),
        },
        EvalAltResult::ErrorMismatchDataType(expected, actual, _)
        | EvalAltResult::ErrorMismatchOutputType(expected, actual, _) => {
            ScriptError::TypeConversionError {
                expected: expected.clone(),
                found: actual.clone(),
            }
        }
        EvalAltResult::ErrorFunctionNotFound(name, _) => ScriptError::FunctionNotFound {
            name: name.clone(),
        },
        _ => ScriptError::RuntimeError {
            message: format!("{}", error),
            backtrace: None,
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
