//! Plugin description validation.

use crate::model::PluginDescription;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[allow(clippy::expect_used)]
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid name pattern"));

// A closure literal: optional leading whitespace, then `|params|`, then anything.
#[allow(clippy::expect_used)]
static FUNCTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|.*\|.*").expect("valid function pattern"));

/// Which check a plugin description failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `name` is empty.
    #[error("plugin name missing")]
    NameMissing,
    /// `name` contains characters outside `[A-Za-z0-9_]`.
    #[error("plugin name:{0} invalid, only [A-Za-z0-9_] allowed")]
    NameInvalid(String),
    /// `function` is empty or whitespace.
    #[error("plugin function missing")]
    FunctionMissing,
    /// `function` does not start with a closure literal.
    #[error("plugin function invalid, should be a closure literal like `|x| x + 1`")]
    FunctionInvalid,
}

/// Check a description before any code is generated for it.
///
/// Checks run in order: name present, name well-formed, function present,
/// function shaped like a closure literal. The first failure is returned.
/// Whitespace-only function text counts as missing, not invalid.
pub fn validate(desc: &PluginDescription) -> Result<(), ValidationError> {
    if desc.name.is_empty() {
        return Err(ValidationError::NameMissing);
    }
    if !NAME_PATTERN.is_match(&desc.name) {
        return Err(ValidationError::NameInvalid(desc.name.clone()));
    }
    if desc.function.trim().is_empty() {
        return Err(ValidationError::FunctionMissing);
    }
    if !FUNCTION_PATTERN.is_match(&desc.function) {
        return Err(ValidationError::FunctionInvalid);
    }
    Ok(())
}
