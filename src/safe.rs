//! Fault containment for plugin calls.
//!
//! A plugin call that fails in a way its signature cannot express unwinds
//! with a [`PluginFault`] payload. With safe wrapping enabled, callables
//! whose return type is `Result<_, E: From<PluginError>>` catch the unwind
//! and return `Err(PluginError::Panicked)` instead. Other shapes, or safe
//! wrapping disabled, let the unwind reach the caller.

use crate::error::PluginError;
use crate::signature::Signature;
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;

/// Unwind payload raised when a plugin call faults.
#[derive(Debug, Clone)]
pub struct PluginFault {
    /// Plugin that faulted.
    pub plugin: String,
    /// What went wrong.
    pub message: String,
    /// Backtrace captured where the fault was raised.
    pub backtrace: String,
}

impl PluginFault {
    /// Record a fault, capturing the current backtrace.
    pub fn capture(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
            backtrace: Backtrace::force_capture().to_string(),
        }
    }
}

impl fmt::Display for PluginFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plugin:{} fault: {}", self.plugin, self.message)
    }
}

impl std::error::Error for PluginFault {}

/// Unwind with `fault` as the payload.
pub fn fault(fault: PluginFault) -> ! {
    tracing::debug!(plugin = %fault.plugin, "plugin call faulted: {}", fault.message);
    std::panic::panic_any(fault)
}

/// Text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(fault) = payload.downcast_ref::<PluginFault>() {
        fault.message.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Message and backtrace of a caught unwind.
///
/// The backtrace comes from the [`PluginFault`] when there is one, otherwise
/// it is captured here.
pub fn payload_details(payload: &(dyn Any + Send)) -> (String, String) {
    match payload.downcast_ref::<PluginFault>() {
        Some(fault) => (fault.message.clone(), fault.backtrace.clone()),
        None => (
            panic_message(payload),
            Backtrace::force_capture().to_string(),
        ),
    }
}

/// Turn a caught unwind into [`PluginError::Panicked`].
pub fn recover(plugin: &str, payload: &(dyn Any + Send)) -> PluginError {
    let (message, backtrace) = payload_details(payload);
    tracing::warn!(plugin, "recovered plugin fault: {}", message);
    PluginError::Panicked {
        plugin: plugin.to_string(),
        message,
        backtrace,
    }
}

/// Apply safe wrapping to `callable` when `enabled`.
pub fn wrap<S: Signature>(plugin: &str, callable: S::Callable, enabled: bool) -> S::Callable {
    if enabled {
        S::guard(plugin, callable)
    } else {
        callable
    }
}
