//! Typed plugin functions compiled at runtime from Rhai snippets.
//!
//! Plugins are declared in YAML, JSON or TOML as a name, optional imports,
//! optional definition lines and a closure literal. Each description is
//! rendered into a small script unit, evaluated in an embedded Rhai engine
//! and registered into a [`Container`]. The [`Picker`] then checks every
//! registered value against the requested fn-pointer shape and hands out
//! thread-safe callables.
//!
//! ```yaml
//! import: [context]
//! plugins:
//!   - name: greet
//!     define: |
//!       let prefix = "hello, ";
//!     function: "|who| prefix + who"
//! ```
//!
//! Plugins may only be requested as fn-pointer shapes:
//!
//! ```compile_fail
//! use script_picker::{Options, Picker, PluginSet};
//!
//! let _ = Picker::<i64>::load(&PluginSet::default(), Options::new());
//! ```

pub mod config;
pub mod container;
pub mod decoder;
pub mod error;
pub mod inject;
pub mod model;
pub mod picker;
pub mod safe;
pub mod scripting;
pub mod signature;
pub mod template;
pub mod validate;

pub use config::{Options, Settings};
pub use container::Container;
pub use decoder::{Decoder, Format};
pub use error::{PickerError, PickerResult, PluginError};
pub use model::{PluginDescription, PluginSet};
pub use picker::{LoadState, Picker};
pub use safe::PluginFault;
pub use scripting::Context;
pub use signature::{FnShape, PluginOutput, PluginValue, Signature, ValueShape};
pub use validate::{validate, ValidationError};
