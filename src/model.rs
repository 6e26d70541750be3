//! Plugin description model.
//!
//! These are plain data types produced by decoding a configuration document.
//! `import` and `define` accept either a sequence of strings or a single
//! newline-delimited string; both are normalized to a sequence of lines.

use serde::{Deserialize, Deserializer, Serialize};

/// One plugin as declared in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescription {
    /// Unique plugin name, `[A-Za-z0-9_]+`.
    #[serde(default)]
    pub name: String,
    /// Extra modules imported by the generated unit.
    #[serde(
        default,
        rename = "import",
        alias = "imports",
        deserialize_with = "deserialize_lines"
    )]
    pub imports: Vec<String>,
    /// Statements run before the closure is built; their bindings are visible to it.
    #[serde(default, deserialize_with = "deserialize_lines")]
    pub define: Vec<String>,
    /// A single closure literal, e.g. `|x| x * 2`.
    #[serde(default)]
    pub function: String,
}

impl PluginDescription {
    /// Create a description with just a name and a closure.
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            ..Self::default()
        }
    }

    /// Add an import path.
    pub fn with_import(mut self, path: impl Into<String>) -> Self {
        self.imports.push(path.into());
        self
    }

    /// Add a define line.
    pub fn with_define(mut self, line: impl Into<String>) -> Self {
        self.define.push(line.into());
        self
    }
}

/// The decoded configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSet {
    /// Plugins in declaration order.
    #[serde(default)]
    pub plugins: Vec<PluginDescription>,
    /// Imports applied to every plugin.
    #[serde(
        default,
        rename = "import",
        alias = "imports",
        deserialize_with = "deserialize_lines"
    )]
    pub imports: Vec<String>,
}

impl PluginSet {
    /// Create a set from descriptions, without global imports.
    pub fn new(plugins: Vec<PluginDescription>) -> Self {
        Self {
            plugins,
            imports: Vec::new(),
        }
    }

    /// Add a global import path.
    pub fn with_import(mut self, path: impl Into<String>) -> Self {
        self.imports.push(path.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lines {
    Text(String),
    List(Vec<String>),
}

fn deserialize_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Lines>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Lines::Text(text)) => text.lines().map(str::to_owned).collect(),
        Some(Lines::List(lines)) => lines,
    })
}
