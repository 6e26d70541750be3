//! Modules every plugin unit can import.
//!
//! - `context`: request-scoped key/value bags, `context::background()`.
//! - `fmt`: `fmt::println(v)`, `fmt::printf(template, args)` and
//!   `fmt::sprintf(template, args)`, where each `{}` in the template takes the
//!   next argument.
//!
//! `host` is not built here. It comes from the injected symbol table.

use rhai::{Array, CustomType, Dynamic, ImmutableString, Module, TypeBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the context module.
pub const CONTEXT_PACKAGE: &str = "context";

/// Name of the formatting module.
pub const FMT_PACKAGE: &str = "fmt";

/// Script type name of [`Context`].
pub const CONTEXT_TYPE_NAME: &str = "Context";

/// Immutable key/value bag handed to plugins.
///
/// Adding a value produces a new context; existing clones are unaffected.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Arc<BTreeMap<String, Dynamic>>,
}

impl Context {
    /// The empty root context.
    pub fn background() -> Self {
        Self::default()
    }

    /// A copy of this context with `key` set to `value`.
    #[must_use]
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<Dynamic>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            values: Arc::new(values),
        }
    }

    /// Value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&Dynamic> {
        self.values.get(key)
    }

    /// Stored keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

fn context_get(ctx: &mut Context, key: ImmutableString) -> Dynamic {
    ctx.value(key.as_str()).cloned().unwrap_or(Dynamic::UNIT)
}

fn context_contains(ctx: &mut Context, key: ImmutableString) -> bool {
    ctx.value(key.as_str()).is_some()
}

fn context_with_value(ctx: &mut Context, key: ImmutableString, value: Dynamic) -> Context {
    ctx.with_value(key.as_str(), value)
}

impl CustomType for Context {
    fn build(mut builder: TypeBuilder<Self>) {
        builder
            .with_name(CONTEXT_TYPE_NAME)
            .with_fn("get", context_get)
            .with_fn("contains", context_contains)
            .with_fn("with_value", context_with_value);
    }
}

/// Build the `context` module.
pub fn context_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("background", || Ok(Context::background()));
    module
}

/// Substitute each `{}` in `template` with the next argument.
///
/// Placeholders without a matching argument are kept; extra arguments are
/// ignored.
pub fn sprintf(template: &str, args: &[Dynamic]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(at) = rest.find("{}") {
        out.push_str(&rest[..at]);
        match args.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => out.push_str("{}"),
        }
        rest = &rest[at + 2..];
    }
    out.push_str(rest);
    out
}

/// Build the `fmt` module.
pub fn fmt_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("println", |value: Dynamic| {
        println!("{value}");
        Ok(())
    });
    module.set_native_fn("printf", |template: ImmutableString, args: Array| {
        print!("{}", sprintf(&template, &args));
        Ok(())
    });
    module.set_native_fn("sprintf", |template: ImmutableString, args: Array| {
        Ok(sprintf(&template, &args))
    });
    module.set_native_fn("sprintf", |template: ImmutableString| Ok(template.to_string()));
    module
}
