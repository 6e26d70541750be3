//! Engine capability used by the picker.
//!
//! The picker needs only a narrow slice of an embedded engine: load the
//! standard modules, load host symbols, evaluate a generated unit, call its
//! registration entry point and describe the values it registered. This
//! module defines that slice as the [`ScriptEngine`] trait together with the
//! backend-neutral [`ScriptError`].
//!
//! # Lifecycle
//!
//! ```text
//! load_stdlib -> load_symbols -> (evaluate -> register)* -> inspect*
//! ```
//!
//! `load_stdlib` and `load_symbols` mutate the engine and must run before the
//! first `evaluate`. See [`RhaiEngine`](super::RhaiEngine) for the only
//! implementation.

use crate::container::Container;
use crate::inject::SymbolTable;
use crate::signature::ValueShape;
use crate::template::GeneratedUnit;
use rhai::{Dynamic, AST};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Error Types
// =============================================================================

/// Errors reported by a scripting backend.
#[derive(Debug, Clone)]
pub enum ScriptError {
    /// Compilation or parsing error
    CompilationError {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    /// Runtime execution error
    RuntimeError {
        message: String,
        backtrace: Option<String>,
    },

    /// The script raised a value on purpose (`throw`)
    Thrown { value: Dynamic },

    /// Type conversion error between Rust and script types
    TypeConversionError { expected: String, found: String },

    /// An entry point the picker relies on is missing or has the wrong shape
    FunctionNotFound { name: String },

    /// Backend-specific error
    BackendError { backend: String, message: String },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::CompilationError { message, line, column } => {
                write!(f, "Compilation error: {}", message)?;
                if let Some(line) = line {
                    write!(f, " at line {}", line)?;
                }
                if let Some(col) = column {
                    write!(f, ", column {}", col)?;
                }
                Ok(())
            }
            ScriptError::RuntimeError { message, backtrace } => {
                write!(f, "Runtime error: {}", message)?;
                if let Some(bt) = backtrace {
                    write!(f, "\n{}", bt)?;
                }
                Ok(())
            }
            ScriptError::Thrown { value } => write!(f, "Script error: {}", value),
            ScriptError::TypeConversionError { expected, found } => {
                write!(f, "Type conversion error: expected {}, found {}", expected, found)
            }
            ScriptError::FunctionNotFound { name } => {
                write!(f, "Function not found: {}", name)
            }
            ScriptError::BackendError { backend, message } => {
                write!(f, "{} backend error: {}", backend, message)
            }
        }
    }
}

impl std::error::Error for ScriptError {}

// =============================================================================
// Evaluated units
// =============================================================================

/// A generated unit after its top level has run.
#[derive(Debug, Clone)]
pub struct EvaluatedUnit {
    /// Plugin name.
    pub name: String,
    /// Unit name.
    pub package: String,
    /// Name of the registration entry point.
    pub register: String,
    /// Compiled unit. Closures registered by the unit resolve against it.
    pub ast: Arc<AST>,
}

// =============================================================================
// ScriptEngine Trait
// =============================================================================

/// What the picker needs from an embedded engine.
pub trait ScriptEngine: Send + Sync {
    /// Install the standard modules and host-side types.
    fn load_stdlib(&mut self) -> Result<(), ScriptError>;

    /// Install injected host modules and types.
    fn load_symbols(&mut self, table: &SymbolTable) -> Result<(), ScriptError>;

    /// Compile `unit` and run its top-level statements.
    fn evaluate(&mut self, unit: &GeneratedUnit) -> Result<EvaluatedUnit, ScriptError>;

    /// Call the unit's registration entry point with `container` and return
    /// the container it hands back.
    fn register(&self, unit: &EvaluatedUnit, container: Container) -> Result<Container, ScriptError>;

    /// Describe a registered value for type checking and diagnostics.
    fn inspect(&self, unit: &EvaluatedUnit, value: &Dynamic) -> ValueShape;

    /// Backend name for logs.
    fn backend_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_error_display() {
        let err = ScriptError::CompilationError {
            message: "Expecting ';'".into(),
            line: Some(3),
            column: Some(7),
        };
        assert_eq!(err.to_string(), "Compilation error: Expecting ';' at line 3, column 7");
    }

    #[test]
    fn test_thrown_display() {
        let err = ScriptError::Thrown {
            value: Dynamic::from("boom".to_string()),
        };
        assert_eq!(err.to_string(), "Script error: boom");
    }
}
