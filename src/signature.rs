//! Requested callable shapes and typed binding.
//!
//! A picker is parameterized by a fn-pointer type such as `fn(i64) -> i64`.
//! That type never gets called directly; it only names the parameter and
//! return types through the [`Signature`] trait, which turns a script closure
//! into an `Arc<dyn Fn(..) -> R + Send + Sync>` with exactly that shape.
//!
//! `Signature` is implemented for fn pointers of up to six parameters whose
//! types implement [`PluginValue`] and whose return type implements
//! [`PluginOutput`]. Anything else is rejected by the compiler (see the
//! crate-level docs).
//!
//! # Invocation
//!
//! A bound callable converts its arguments to [`Dynamic`], calls the script
//! closure and converts the result back:
//!
//! - a returned value of the declared type is returned as is;
//! - `throw v` under a `Result<_, E>` return becomes
//!   `Err(PluginError::Thrown { .. }.into())`;
//! - anything else is a fault and unwinds with a [`PluginFault`] payload,
//!   which [`safe::wrap`](crate::safe::wrap) can turn into
//!   `Err(PluginError::Panicked { .. })`.

use crate::error::PluginError;
use crate::safe::{self, PluginFault};
use crate::scripting::{ScriptError, ScriptFn};
use crate::scripting::stdlib::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use rhai::{Array, Blob, Dynamic, FnPtr, ImmutableString, Map};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[allow(clippy::expect_used)]
static TYPE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:[A-Za-z_][A-Za-z0-9_]*::)+").expect("valid type path pattern"));

/// Short, path-free name of `T`, e.g. `Result<i64, PluginError>`.
pub fn type_label<T: ?Sized>() -> String {
    TYPE_PATH
        .replace_all(std::any::type_name::<T>(), "")
        .into_owned()
}

// =============================================================================
// Shapes
// =============================================================================

/// The shape a picker asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnShape {
    /// Parameter type labels.
    pub params: Vec<String>,
    /// Return type label.
    pub output: String,
    /// Whether the return type is `Result<_, E>` with `E: From<PluginError>`.
    pub fallible: bool,
}

impl FnShape {
    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for FnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({})", self.params.join(", "))?;
        if self.output != "()" {
            write!(f, " -> {}", self.output)?;
        }
        Ok(())
    }
}

/// What a plugin actually registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueShape {
    /// A script function or closure. Captured variables are not counted.
    Function {
        /// Declared parameter names.
        params: Vec<String>,
    },
    /// A pointer to a function the unit does not define.
    Native {
        /// Function name.
        name: String,
    },
    /// Not a function at all.
    Value {
        /// Script type name.
        type_name: String,
    },
}

impl ValueShape {
    /// Parameter count when known.
    pub fn arity(&self) -> Option<usize> {
        match self {
            ValueShape::Function { params } => Some(params.len()),
            _ => None,
        }
    }

    /// Whether a value of this shape can be bound as `shape`.
    pub fn fits(&self, shape: &FnShape) -> bool {
        self.arity() == Some(shape.arity())
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueShape::Function { params } => write!(f, "fn({})", params.join(", ")),
            ValueShape::Native { name } => write!(f, "fn {}(?)", name),
            ValueShape::Value { type_name } => write!(f, "non-func type ({})", type_name),
        }
    }
}

// =============================================================================
// Value conversion
// =============================================================================

/// A type that can cross the host/script boundary as a parameter or result.
///
/// Implemented for the Rhai primitives, [`Dynamic`], [`Context`] and the
/// container types. Host types exposed to scripts opt in with an empty impl:
///
/// ```
/// # use script_picker::PluginValue;
/// #[derive(Clone)]
/// struct Widget;
/// impl PluginValue for Widget {}
/// ```
pub trait PluginValue: Any + Clone + Send + Sync {
    /// Convert into a script value.
    fn into_dynamic(self) -> Dynamic {
        Dynamic::from(self)
    }

    /// Convert a script value back.
    fn from_dynamic(value: Dynamic) -> Result<Self, ScriptError> {
        value
            .try_cast_result::<Self>()
            .map_err(|found| ScriptError::TypeConversionError {
                expected: type_label::<Self>(),
                found: found.type_name().to_string(),
            })
    }
}

impl PluginValue for () {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::UNIT
    }

    // Whatever the closure evaluates to is discarded.
    fn from_dynamic(_value: Dynamic) -> Result<Self, ScriptError> {
        Ok(())
    }
}

impl PluginValue for Dynamic {
    fn into_dynamic(self) -> Dynamic {
        self
    }

    fn from_dynamic(value: Dynamic) -> Result<Self, ScriptError> {
        Ok(value.flatten())
    }
}

impl PluginValue for bool {}
impl PluginValue for i64 {}
impl PluginValue for f64 {}
impl PluginValue for char {}
impl PluginValue for String {}
impl PluginValue for ImmutableString {}
impl PluginValue for Array {}
impl PluginValue for Blob {}
impl PluginValue for Map {}
impl PluginValue for FnPtr {}
impl PluginValue for Context {}

/// A type a bound callable can return.
pub trait PluginOutput: Sized + Send + 'static {
    /// Whether faults can be reported through the return value.
    const FALLIBLE: bool;

    /// Type label for diagnostics.
    fn describe() -> String;

    /// Convert the outcome of a script call, unwinding with a
    /// [`PluginFault`] when it cannot be expressed as `Self`.
    fn from_call(plugin: &str, outcome: Result<Dynamic, ScriptError>) -> Self;

    /// Express a recovered fault as `Self`, when the type allows it.
    fn recover(error: PluginError) -> Option<Self>;
}

impl<T: PluginValue> PluginOutput for T {
    const FALLIBLE: bool = false;

    fn describe() -> String {
        type_label::<T>()
    }

    fn from_call(plugin: &str, outcome: Result<Dynamic, ScriptError>) -> Self {
        match outcome.and_then(T::from_dynamic) {
            Ok(value) => value,
            Err(err) => safe::fault(PluginFault::capture(plugin, err.to_string())),
        }
    }

    fn recover(_error: PluginError) -> Option<Self> {
        None
    }
}

impl<T, E> PluginOutput for Result<T, E>
where
    T: PluginValue,
    E: From<PluginError> + Send + 'static,
{
    const FALLIBLE: bool = true;

    fn describe() -> String {
        type_label::<Self>()
    }

    fn from_call(plugin: &str, outcome: Result<Dynamic, ScriptError>) -> Self {
        match outcome.and_then(T::from_dynamic) {
            Ok(value) => Ok(value),
            Err(ScriptError::Thrown { value }) => Err(E::from(PluginError::Thrown {
                plugin: plugin.to_string(),
                value,
            })),
            Err(err) => safe::fault(PluginFault::capture(plugin, err.to_string())),
        }
    }

    fn recover(error: PluginError) -> Option<Self> {
        Some(Err(E::from(error)))
    }
}

// =============================================================================
// Signature
// =============================================================================

/// A requested callable shape.
pub trait Signature: 'static {
    /// The typed callable handed out by the picker.
    type Callable: Clone + Send + Sync + 'static;

    /// Describe the shape.
    fn shape() -> FnShape;

    /// Wrap a script closure as a typed callable.
    fn bind(plugin: &str, func: ScriptFn) -> Self::Callable;

    /// Wrap `callable` so faults come back as `Err(PluginError::Panicked)`.
    /// Returns `callable` unchanged when the return type is not fallible.
    fn guard(plugin: &str, callable: Self::Callable) -> Self::Callable;
}

macro_rules! impl_signature {
    ($($arg:ident: $ty:ident),*) => {
        impl<$($ty: PluginValue,)* R: PluginOutput> Signature for fn($($ty),*) -> R {
            type Callable = Arc<dyn Fn($($ty),*) -> R + Send + Sync>;

            fn shape() -> FnShape {
                FnShape {
                    params: vec![$(type_label::<$ty>()),*],
                    output: R::describe(),
                    fallible: R::FALLIBLE,
                }
            }

            fn bind(plugin: &str, func: ScriptFn) -> Self::Callable {
                let plugin = plugin.to_string();
                Arc::new(move |$($arg: $ty),*| {
                    let args: Vec<Dynamic> = vec![$($arg.into_dynamic()),*];
                    R::from_call(&plugin, func(args))
                })
            }

            fn guard(plugin: &str, callable: Self::Callable) -> Self::Callable {
                if !R::FALLIBLE {
                    return callable;
                }
                let plugin = plugin.to_string();
                Arc::new(move |$($arg: $ty),*| {
                    match catch_unwind(AssertUnwindSafe(|| callable($($arg),*))) {
                        Ok(output) => output,
                        Err(payload) => match R::recover(safe::recover(&plugin, payload.as_ref())) {
                            Some(output) => output,
                            None => resume_unwind(payload),
                        },
                    }
                })
            }
        }
    };
}

impl_signature!();
impl_signature!(a: A);
impl_signature!(a: A, b: B);
impl_signature!(a: A, b: B, c: C);
impl_signature!(a: A, b: B, c: C, d: D);
impl_signature!(a: A, b: B, c: C, d: D, e: E);
impl_signature!(a: A, b: B, c: C, d: D, e: E, f: F);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_label() {
        assert_eq!(type_label::<String>(), "String");
        assert_eq!(type_label::<Dynamic>(), "Dynamic");
        assert_eq!(
            type_label::<Result<i64, PluginError>>(),
            "Result<i64, PluginError>"
        );
    }

    #[test]
    fn test_fn_shape_display() {
        assert_eq!(<fn(i64) -> i64 as Signature>::shape().to_string(), "fn(i64) -> i64");
        assert_eq!(<fn() -> i64 as Signature>::shape().to_string(), "fn() -> i64");
        assert_eq!(<fn(Context)>::shape().to_string(), "fn(Context)");

        let fallible = <fn(i64, i64) -> Result<i64, PluginError>>::shape();
        assert!(fallible.fallible);
        assert_eq!(fallible.arity(), 2);
        assert_eq!(fallible.to_string(), "fn(i64, i64) -> Result<i64, PluginError>");
    }

    #[test]
    fn test_value_shape() {
        let func = ValueShape::Function {
            params: vec!["x".into(), "y".into()],
        };
        assert_eq!(func.to_string(), "fn(x, y)");
        assert!(func.fits(&<fn(i64, i64) -> i64>::shape()));
        assert!(!func.fits(&<fn(i64) -> i64>::shape()));

        let value = ValueShape::Value {
            type_name: "i64".into(),
        };
        assert_eq!(value.to_string(), "non-func type (i64)");
        assert!(!value.fits(&<fn() -> i64>::shape()));
    }

    fn script(result: Result<Dynamic, ScriptError>) -> ScriptFn {
        Arc::new(move |_args: Vec<Dynamic>| result.clone())
    }

    #[test]
    fn test_bind_converts_arguments_and_result() {
        let func: ScriptFn = Arc::new(|args: Vec<Dynamic>| -> Result<Dynamic, ScriptError> {
            let sum: i64 = args.iter().map(|a| a.as_int().unwrap_or(0)).sum();
            Ok(Dynamic::from(sum))
        });
        let add = <fn(i64, i64) -> i64>::bind("add", func);
        assert_eq!(add(40, 2), 42);
    }

    #[test]
    fn test_thrown_value_becomes_error() {
        let thrown = script(Err(ScriptError::Thrown {
            value: Dynamic::from("bad".to_string()),
        }));
        let call = <fn() -> Result<i64, PluginError>>::bind("p", thrown);
        match call() {
            Err(PluginError::Thrown { plugin, value }) => {
                assert_eq!(plugin, "p");
                assert_eq!(value.into_string().unwrap(), "bad");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_conversion_failure_is_fault() {
        let call = <fn() -> i64>::bind("p", script(Ok(Dynamic::from("text".to_string()))));
        let payload = catch_unwind(AssertUnwindSafe(|| call())).unwrap_err();
        let fault = payload.downcast_ref::<PluginFault>().unwrap();
        assert_eq!(fault.plugin, "p");
        assert!(fault.message.contains("i64"));
    }

    #[test]
    fn test_guard_recovers_faults() {
        let failing = script(Err(ScriptError::RuntimeError {
            message: "Division by zero".into(),
            backtrace: None,
        }));
        let call = <fn() -> Result<i64, PluginError>>::bind("div", failing);
        let call = <fn() -> Result<i64, PluginError>>::guard("div", call);
        match call() {
            Err(PluginError::Panicked { plugin, message, .. }) => {
                assert_eq!(plugin, "div");
                assert!(message.contains("Division by zero"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_guard_leaves_infallible_shapes_alone() {
        let call = <fn() -> i64>::bind("p", script(Ok(Dynamic::from(1_i64))));
        let guarded = <fn() -> i64>::guard("p", call.clone());
        assert!(Arc::ptr_eq(&call, &guarded));
    }
}
