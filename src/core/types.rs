//! Option value types.
//!
//! Options are staged on a node as plain strings and only become typed
//! values when the node is initialized and the strings are parsed against
//! the kind's option schema. Using an enum keeps the set of option types
//! closed and exhaustively matched.

use crate::core::error::ProcessingError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of value an option accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Integer,
    Float,
    String,
    Boolean,
}

/// A parsed option value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum OptionValue {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value
    Boolean(bool),
}

// ============================================================================
// OptionKind Implementation
// ============================================================================

impl OptionKind {
    /// Parse a raw staged string into a typed value.
    pub fn parse(&self, raw: &str) -> Result<OptionValue, String> {
        let trimmed = raw.trim();
        match self {
            OptionKind::Integer => trimmed
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|_| format!("'{}' is not an integer", raw)),
            OptionKind::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(OptionValue::Float)
                .ok_or_else(|| format!("'{}' is not a finite number", raw)),
            OptionKind::String => Ok(OptionValue::String(raw.to_string())),
            OptionKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(OptionValue::Boolean(true)),
                "0" | "false" | "no" | "off" => Ok(OptionValue::Boolean(false)),
                _ => Err(format!("'{}' is not a boolean", raw)),
            },
        }
    }

    /// Get a human-readable name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            OptionKind::Integer => "Integer",
            OptionKind::Float => "Float",
            OptionKind::String => "String",
            OptionKind::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// OptionValue Implementation
// ============================================================================

impl OptionValue {
    /// Get the kind of this value.
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Integer(_) => OptionKind::Integer,
            OptionValue::Float(_) => OptionKind::Float,
            OptionValue::String(_) => OptionKind::String,
            OptionValue::Boolean(_) => OptionKind::Boolean,
        }
    }

    /// Try to get this value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        if let OptionValue::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Try to get this value as a float.
    /// Integers are automatically converted to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            OptionValue::Float(f) => Some(*f),
            OptionValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        if let OptionValue::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if let OptionValue::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Integer(i) => write!(f, "{}", i),
            OptionValue::Float(fl) => write!(f, "{}", fl),
            OptionValue::String(s) => write!(f, "\"{}\"", s),
            OptionValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

// ============================================================================
// Resolved option set
// ============================================================================

/// Typed options handed to a filter at initialization.
///
/// Every option declared by the kind is present: staged values where the
/// caller provided one, schema defaults otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionValues {
    values: HashMap<String, OptionValue>,
}

impl OptionValues {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value.
    pub fn insert(&mut self, name: impl Into<String>, value: OptionValue) {
        self.values.insert(name.into(), value);
    }

    /// Get a value by name.
    pub fn get(&self, name: &str) -> Result<&OptionValue, ProcessingError> {
        self.values
            .get(name)
            .ok_or_else(|| ProcessingError::UnknownOption(name.to_string()))
    }

    /// Get a value as an integer.
    pub fn get_integer(&self, name: &str) -> Result<i64, ProcessingError> {
        self.get(name)?
            .as_integer()
            .ok_or_else(|| type_error(name, OptionKind::Integer))
    }

    /// Get a value as a float.
    pub fn get_float(&self, name: &str) -> Result<f64, ProcessingError> {
        self.get(name)?
            .as_float()
            .ok_or_else(|| type_error(name, OptionKind::Float))
    }

    /// Get a value as a string.
    pub fn get_string(&self, name: &str) -> Result<&str, ProcessingError> {
        self.get(name)?
            .as_str()
            .ok_or_else(|| type_error(name, OptionKind::String))
    }

    /// Get a value as a boolean.
    pub fn get_bool(&self, name: &str) -> Result<bool, ProcessingError> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| type_error(name, OptionKind::Boolean))
    }

    /// Check if a value exists.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn type_error(name: &str, expected: OptionKind) -> ProcessingError {
    ProcessingError::InvalidOption {
        option: name.to_string(),
        reason: format!("expected {}", expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer() {
        assert_eq!(OptionKind::Integer.parse(" 42 "), Ok(OptionValue::Integer(42)));
        assert!(OptionKind::Integer.parse("4.2").is_err());
        assert!(OptionKind::Integer.parse("abc").is_err());
    }

    #[test]
    fn test_parse_float_rejects_non_finite() {
        assert_eq!(OptionKind::Float.parse("0.5"), Ok(OptionValue::Float(0.5)));
        assert!(OptionKind::Float.parse("inf").is_err());
        assert!(OptionKind::Float.parse("NaN").is_err());
    }

    #[test]
    fn test_parse_boolean_spellings() {
        for raw in ["1", "true", "Yes", "ON"] {
            assert_eq!(OptionKind::Boolean.parse(raw), Ok(OptionValue::Boolean(true)));
        }
        assert_eq!(OptionKind::Boolean.parse("off"), Ok(OptionValue::Boolean(false)));
        assert!(OptionKind::Boolean.parse("maybe").is_err());
    }

    #[test]
    fn test_integer_reads_as_float() {
        let mut values = OptionValues::new();
        values.insert("gain", OptionValue::Integer(2));
        assert_eq!(values.get_float("gain").unwrap(), 2.0);
        assert!(values.get_bool("gain").is_err());
        assert!(matches!(
            values.get("missing"),
            Err(ProcessingError::UnknownOption(_))
        ));
    }
}
