//! Code generation for plugin units.
//!
//! Every plugin becomes one Rhai source unit with a fixed layout:
//!
//! ```text
//! // plugin unit picker_double, generated for plugin double
//! import "host" as host;
//! import "context" as context;
//! import "fmt" as fmt;
//!
//! fn factory_double() {
//!     return |x| x * 2;
//! }
//!
//! fn register(ct) {
//!     if type_of(ct) != host::CONTAINER {
//!         throw "register: argument is not a plugin container";
//!     }
//!     ct.register("double", factory_double());
//!     ct
//! }
//! ```
//!
//! `define` lines land inside the factory ahead of the `return`, so the
//! closure captures whatever they bind. Rendering is deterministic: the same
//! description always yields the same text.

use crate::error::{PickerError, PickerResult};
use crate::model::PluginDescription;
use minijinja::Environment;
use serde::Serialize;

/// Modules every generated unit imports, in this order.
pub const SYSTEM_IMPORTS: [&str; 3] = ["host", "context", "fmt"];

/// Name of the registration entry point in every generated unit.
pub const REGISTER_FN: &str = "register";

const TEMPLATE_NAME: &str = "plugin.rhai";

const PLUGIN_TEMPLATE: &str = r#"// plugin unit {{ package }}, generated for plugin {{ name }}
{% for import in imports %}
import "{{ import.path }}" as {{ import.alias }};
{% endfor %}

fn {{ factory }}() {
{% for line in define %}
    {{ line }}
{% endfor %}
    return {{ function }};
}

fn {{ register }}(ct) {
    if type_of(ct) != host::CONTAINER {
        throw "{{ register }}: argument is not a plugin container";
    }
    ct.register("{{ name }}", {{ factory }}());
    ct
}
"#;

/// One `import "path" as alias;` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    /// Module path handed to the resolver.
    pub path: String,
    /// Local alias, the last `/` segment of the path.
    pub alias: String,
}

impl Import {
    /// Build an import for `path`, aliased by its last segment.
    pub fn new(path: &str) -> Self {
        let alias = path.rsplit('/').next().unwrap_or(path);
        Self {
            path: path.to_string(),
            alias: alias.to_string(),
        }
    }
}

/// Values substituted into the plugin template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateArgs {
    /// Unit name, `picker_<name>`.
    pub package: String,
    /// Plugin name.
    pub name: String,
    /// Merged imports, system modules first.
    pub imports: Vec<Import>,
    /// Statements emitted verbatim inside the factory.
    pub define: Vec<String>,
    /// The closure literal, trimmed.
    pub function: String,
    /// Factory function name, `factory_<name>`.
    pub factory: String,
    /// Registration entry point name.
    pub register: String,
}

impl TemplateArgs {
    /// Assemble arguments for `desc` with extra imports applied to every plugin.
    pub fn new(desc: &PluginDescription, global_imports: &[String]) -> Self {
        let imports = merge_imports(&[global_imports, &desc.imports])
            .iter()
            .map(|path| Import::new(path))
            .collect();
        let function = desc.function.trim().trim_end_matches(';').trim_end();
        Self {
            package: package_name(&desc.name),
            name: desc.name.clone(),
            imports,
            define: desc.define.clone(),
            function: function.to_string(),
            factory: factory_name(&desc.name),
            register: REGISTER_FN.to_string(),
        }
    }
}

/// A rendered plugin unit, ready to be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Plugin name.
    pub name: String,
    /// Unit name, used as the AST source tag.
    pub package: String,
    /// Rendered Rhai source.
    pub source: String,
    /// Factory function name.
    pub factory: String,
    /// Registration entry point name.
    pub register: String,
}

impl GeneratedUnit {
    /// `<package>::<symbol>`, the name used in diagnostics.
    pub fn qualified(&self, symbol: &str) -> String {
        format!("{}::{}", self.package, symbol)
    }

    /// Qualified name of the registration entry point.
    pub fn qualified_register(&self) -> String {
        self.qualified(&self.register)
    }

    /// Qualified name of the factory.
    pub fn qualified_factory(&self) -> String {
        self.qualified(&self.factory)
    }
}

/// Unit name for a plugin.
pub fn package_name(plugin: &str) -> String {
    format!("picker_{plugin}")
}

/// Factory function name for a plugin.
pub fn factory_name(plugin: &str) -> String {
    format!("factory_{plugin}")
}

/// Merge import lists: system modules first, then each list in order.
///
/// Entries are trimmed, blanks dropped, and only the first occurrence of a
/// path is kept.
pub fn merge_imports(lists: &[&[String]]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let system = SYSTEM_IMPORTS.iter().copied();
    let extra = lists.iter().flat_map(|list| list.iter().map(String::as_str));
    for path in system.chain(extra) {
        let path = path.trim();
        if path.is_empty() || merged.iter().any(|seen| seen == path) {
            continue;
        }
        merged.push(path.to_string());
    }
    merged
}

/// Render the plugin template.
pub fn render(args: &TemplateArgs) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template(TEMPLATE_NAME, PLUGIN_TEMPLATE)?;
    let tmpl = env.get_template(TEMPLATE_NAME)?;
    tmpl.render(args)
}

/// Generate the unit for one validated description.
pub fn generate(desc: &PluginDescription, global_imports: &[String]) -> PickerResult<GeneratedUnit> {
    let args = TemplateArgs::new(desc, global_imports);
    let source = render(&args).map_err(|source| PickerError::CodeGeneration {
        name: desc.name.clone(),
        source,
    })?;
    Ok(GeneratedUnit {
        name: args.name,
        package: args.package,
        source,
        factory: args.factory,
        register: args.register,
    })
}
