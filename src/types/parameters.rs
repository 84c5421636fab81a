//! Parameter overrides
//!
//! Parameters are the knobs adaptation turns: memory ceilings, timeouts,
//! configuration sources. They reach commands as environment variables and
//! through `{key}` placeholders in the command line.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A parameter value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(u64),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<u64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ParamValue {
    fn from(n: u64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

/// Ordered parameter map; ordering keeps environment export deterministic
pub type Parameters = BTreeMap<String, ParamValue>;

/// An absolute assignment proposed by adaptation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterChange {
    pub key: String,
    pub value: ParamValue,
}

impl ParameterChange {
    pub fn set(key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ParameterChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Declared maxima for numeric parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterBounds {
    maxima: BTreeMap<String, u64>,
}

impl ParameterBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a maximum for a numeric parameter
    pub fn with_max(mut self, key: impl Into<String>, max: u64) -> Self {
        self.maxima.insert(key.into(), max);
        self
    }

    pub fn max_for(&self, key: &str) -> Option<u64> {
        self.maxima.get(key).copied()
    }

    /// Clamp a change to its declared maximum
    pub fn clamp(&self, change: &ParameterChange) -> ParameterChange {
        match (self.max_for(&change.key), change.value.as_number()) {
            (Some(max), Some(value)) if value > max => ParameterChange::set(change.key.clone(), max),
            _ => change.clone(),
        }
    }
}

/// Environment variable name for a parameter key
pub fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Substitute `{key}` placeholders; unknown placeholders are left as-is
pub fn render_command(template: &str, params: &Parameters) -> String {
    let mut rendered = template.to_string();
    for (key, value) in params {
        rendered = rendered.replace(&format!("{{{}}}", key), &value.to_string());
    }
    rendered
}
