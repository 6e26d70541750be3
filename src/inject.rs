//! Host symbol injection.
//!
//! Host values are keyed either by a bare name, which lands in the `host`
//! module, or by `pkg/name`, which lands in module `pkg`. Generated units
//! reach them as `host::name` / `pkg::name`, or through an
//! `import "pkg" as pkg;` line.

use crate::container::CONTAINER_TYPE_NAME;
use crate::error::{PickerError, PickerResult};
use rhai::{CustomType, Dynamic, Engine};
use std::collections::BTreeMap;
use std::fmt;

/// Module holding bare-named host symbols.
pub const HOST_PACKAGE: &str = "host";

/// Symbol in [`HOST_PACKAGE`] holding the container's script type name.
pub const CONTAINER_SYMBOL: &str = "CONTAINER";

/// Registers a host type's API on an engine.
pub type TypeRegistrar = fn(&mut Engine);

/// [`TypeRegistrar`] for any `CustomType`.
pub fn register_type<T: CustomType>(engine: &mut Engine) {
    engine.build_type::<T>();
}

/// Host values grouped by module, plus the host types they need.
#[derive(Clone, Default)]
pub struct SymbolTable {
    packages: BTreeMap<String, BTreeMap<String, Dynamic>>,
    types: Vec<TypeRegistrar>,
}

impl SymbolTable {
    /// Modules in name order, each with its symbols in name order.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, Dynamic>)> {
        self.packages.iter().map(|(name, symbols)| (name.as_str(), symbols))
    }

    /// Look up `pkg::name`.
    pub fn get(&self, package: &str, name: &str) -> Option<&Dynamic> {
        self.packages.get(package).and_then(|symbols| symbols.get(name))
    }

    /// Type registrars, in the order they were supplied.
    pub fn types(&self) -> &[TypeRegistrar] {
        &self.types
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether there are no modules.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("packages", &self.packages)
            .field("types", &self.types.len())
            .finish()
    }
}

/// Split a custom object key into `(package, name)`.
pub fn split_path(path: &str) -> PickerResult<(&str, &str)> {
    let mut parts = path.split('/');
    let (package, name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => (HOST_PACKAGE, name),
        (Some(package), Some(name), None) => (package, name),
        _ => return Err(PickerError::InjectedPathInvalid(path.to_string())),
    };
    if package.is_empty() || name.is_empty() {
        return Err(PickerError::InjectedPathInvalid(path.to_string()));
    }
    Ok((package, name))
}

/// Build the symbol table from host objects and types.
///
/// Shared values are flattened so scripts receive plain values. Later
/// duplicates of the same key replace earlier ones. `host::CONTAINER` is
/// always present and cannot be overridden.
pub fn build_symbol_table<'a, I>(objects: I, types: &[TypeRegistrar]) -> PickerResult<SymbolTable>
where
    I: IntoIterator<Item = (&'a str, &'a Dynamic)>,
{
    let mut table = SymbolTable {
        packages: BTreeMap::new(),
        types: types.to_vec(),
    };

    for (path, value) in objects {
        let (package, name) = split_path(path)?;
        table
            .packages
            .entry(package.to_string())
            .or_default()
            .insert(name.to_string(), value.clone().flatten());
    }

    let host = table.packages.entry(HOST_PACKAGE.to_string()).or_default();
    if host.contains_key(CONTAINER_SYMBOL) {
        tracing::warn!(
            "custom object {}/{} is reserved and will be replaced",
            HOST_PACKAGE,
            CONTAINER_SYMBOL
        );
    }
    host.insert(CONTAINER_SYMBOL.to_string(), CONTAINER_TYPE_NAME.into());

    Ok(table)
}
