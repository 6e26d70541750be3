//! Embedded scripting backend.
//!
//! The picker talks to its engine through the [`ScriptEngine`] trait. Rhai is
//! the only backend.
//!
//! # Architecture
//!
//! ```text
//! ScriptEngine trait
//!     └── RhaiEngine (load phase, owns the Rhai Engine)
//!             └── seal() -> SealedEngine (Arc<Engine>, binds closures to ScriptFn)
//!
//! Standard modules (stdlib)
//!     ├── context  (Context type, context::background())
//!     └── fmt      (println, printf, sprintf)
//! ```
//!
//! Script `print` and `debug` output goes to `tracing` under
//! [`SCRIPT_LOG_TARGET`].

pub mod rhai_engine;
pub mod script_engine;
pub mod stdlib;

pub use rhai_engine::{RhaiEngine, ScriptFn, SealedEngine, SCRIPT_LOG_TARGET};
pub use script_engine::{EvaluatedUnit, ScriptEngine, ScriptError};
pub use stdlib::Context;
