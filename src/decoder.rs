//! Configuration decoding.
//!
//! Turns raw bytes into a [`PluginSet`]. The three built-in formats match the
//! file variants the picker accepts; any other format can be plugged in by
//! implementing [`Decoder`].

use crate::error::{PickerError, PickerResult};
use crate::model::PluginSet;
use std::fmt;
use std::path::Path;

/// Something that can turn configuration bytes into a plugin set.
pub trait Decoder {
    /// Decode `data` into a plugin set.
    fn decode(&self, data: &[u8]) -> PickerResult<PluginSet>;
}

impl<F> Decoder for F
where
    F: Fn(&[u8]) -> PickerResult<PluginSet>,
{
    fn decode(&self, data: &[u8]) -> PickerResult<PluginSet> {
        self(data)
    }
}

/// Built-in serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// YAML via `serde_yaml`.
    Yaml,
    /// JSON via `serde_json`.
    Json,
    /// TOML via `toml`.
    Toml,
}

impl Format {
    /// Short lowercase name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Toml => "toml",
        }
    }

    /// Detect the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    fn error(self, source: impl std::error::Error + Send + Sync + 'static) -> PickerError {
        PickerError::Decode {
            format: self.name(),
            source: Box::new(source),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Decoder for Format {
    fn decode(&self, data: &[u8]) -> PickerResult<PluginSet> {
        match self {
            Format::Yaml => serde_yaml::from_slice(data).map_err(|e| self.error(e)),
            Format::Json => serde_json::from_slice(data).map_err(|e| self.error(e)),
            Format::Toml => {
                let text = std::str::from_utf8(data).map_err(|e| self.error(e))?;
                toml::from_str(text).map_err(|e| self.error(e))
            }
        }
    }
}

/// Read a file into memory, naming the path on failure.
pub(crate) fn read_file(path: &Path) -> PickerResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| PickerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
import:
  - fmt
plugins:
  - name: testplugin
    import:
      - context
    define: |
      let a = 1;
      let b = 2;
    function: |
      |ctx| a + b
"#;

    #[test]
    fn test_yaml() {
        let set = Format::Yaml.decode(YAML.as_bytes()).unwrap();
        assert_eq!(set.imports, vec!["fmt"]);
        assert_eq!(set.plugins.len(), 1);
        let plugin = &set.plugins[0];
        assert_eq!(plugin.name, "testplugin");
        assert_eq!(plugin.imports, vec!["context"]);
        assert_eq!(plugin.define, vec!["let a = 1;", "let b = 2;"]);
        assert_eq!(plugin.function.trim(), "|ctx| a + b");
    }

    #[test]
    fn test_json_with_string_define() {
        let json = r#"{
            "plugins": [
                {
                    "name": "testjson",
                    "import": ["fmt"],
                    "define": "let a = 1;\nlet b = 2;",
                    "function": "|| a + b"
                }
            ]
        }"#;
        let set = Format::Json.decode(json.as_bytes()).unwrap();
        assert_eq!(set.plugins[0].define.len(), 2);
        assert_eq!(set.plugins[0].imports, vec!["fmt"]);
    }

    #[test]
    fn test_toml() {
        let text = r#"
import = ["fmt"]

[[plugins]]
name = "double"
function = "|x| x * 2"

[[plugins]]
name = "triple"
define = ["let k = 3;"]
function = "|x| x * k"
"#;
        let set = Format::Toml.decode(text.as_bytes()).unwrap();
        let names: Vec<_> = set.plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["double", "triple"]);
        assert_eq!(set.plugins[1].define, vec!["let k = 3;"]);
    }

    #[test]
    fn test_decode_error_names_format() {
        let err = Format::Json.decode(b"{not json").unwrap_err();
        assert!(matches!(err, PickerError::Decode { format: "json", .. }));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/b.yml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("b.JSON")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("b.toml")), Some(Format::Toml));
        assert_eq!(Format::from_path(Path::new("b.ini")), None);
        assert_eq!(Format::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_closure_decoder() {
        let decoder = |_: &[u8]| Ok(PluginSet::default());
        assert!(decoder.decode(b"anything").unwrap().plugins.is_empty());
    }
}
