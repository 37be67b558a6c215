//! Pad and option definitions.
//!
//! Pads are the numbered connection points of a node. Options are the
//! string-keyed settings a node accepts before initialization. Both are
//! declared by the node kind and are only checked for arity and names by
//! the graph itself.

use crate::core::error::ProcessingError;
use crate::core::types::{OptionKind, OptionValue, OptionValues};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Direction of a pad (input or output).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PadDirection {
    Input,
    Output,
}

impl fmt::Display for PadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PadDirection::Input => write!(f, "input"),
            PadDirection::Output => write!(f, "output"),
        }
    }
}

/// Definition of a node pad.
///
/// Pads are addressed by zero-based index in declaration order; the name
/// is for diagnostics and display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PadDefinition {
    /// Name within the node
    pub name: String,
    /// Direction (input or output)
    pub direction: PadDirection,
    /// Description for documentation
    pub description: String,
}

impl PadDefinition {
    /// Create a new input pad definition.
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PadDirection::Input,
            description: String::new(),
        }
    }

    /// Create a new output pad definition.
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PadDirection::Output,
            description: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Definition of a node option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDefinition {
    /// Key used with `set_option`
    pub name: String,
    /// Type the raw string is parsed into
    pub kind: OptionKind,
    /// Value used when the option is not staged
    pub default_value: OptionValue,
    /// Description for documentation
    pub description: String,
    /// Constraints checked after parsing
    pub constraints: Vec<Constraint>,
}

/// Constraints that can be applied to option values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "params")]
pub enum Constraint {
    /// Numeric value must be within range [min, max]
    Range { min: f64, max: f64 },
    /// Numeric value must be >= min
    MinValue(f64),
    /// Numeric value must be <= max
    MaxValue(f64),
    /// Numeric value must be > 0
    Positive,
    /// Numeric value must be >= 0
    NonNegative,
    /// String must be one of the listed values
    OneOf(Vec<String>),
    /// String must not be empty
    NotEmpty,
}

// ============================================================================
// OptionDefinition Builder Pattern
// ============================================================================

impl OptionDefinition {
    /// Create a new option definition.
    ///
    /// The kind is taken from the default value.
    pub fn new(name: impl Into<String>, default_value: OptionValue) -> Self {
        Self {
            name: name.into(),
            kind: default_value.kind(),
            default_value,
            description: String::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a range constraint.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Parse a raw staged value and check it against the constraints.
    pub fn parse(&self, raw: &str) -> Result<OptionValue, ProcessingError> {
        let value = self
            .kind
            .parse(raw)
            .map_err(|reason| self.invalid(reason))?;

        for constraint in &self.constraints {
            constraint.validate(&value).map_err(|reason| self.invalid(reason))?;
        }

        Ok(value)
    }

    fn invalid(&self, reason: String) -> ProcessingError {
        ProcessingError::InvalidOption {
            option: self.name.clone(),
            reason,
        }
    }
}

/// Resolve a staged key/value set against an option schema.
///
/// Unknown keys and unparsable values fail; options that were not staged
/// take their schema default.
pub fn resolve_options(
    schema: &[OptionDefinition],
    staged: &HashMap<String, String>,
) -> Result<OptionValues, ProcessingError> {
    let mut values = OptionValues::new();

    for (key, raw) in staged {
        let definition = schema
            .iter()
            .find(|d| &d.name == key)
            .ok_or_else(|| ProcessingError::UnknownOption(key.clone()))?;
        values.insert(key.clone(), definition.parse(raw)?);
    }

    for definition in schema {
        if !values.contains(&definition.name) {
            values.insert(definition.name.clone(), definition.default_value.clone());
        }
    }

    Ok(values)
}

// ============================================================================
// Constraint Validation
// ============================================================================

impl Constraint {
    /// Validate a value against this constraint.
    pub fn validate(&self, value: &OptionValue) -> Result<(), String> {
        match self {
            Constraint::Range { min, max } => {
                if let Some(num) = value.as_float() {
                    if num < *min || num > *max {
                        return Err(format!("value {} is out of range [{}, {}]", num, min, max));
                    }
                }
            }

            Constraint::MinValue(min) => {
                if let Some(num) = value.as_float() {
                    if num < *min {
                        return Err(format!("value {} is below minimum {}", num, min));
                    }
                }
            }

            Constraint::MaxValue(max) => {
                if let Some(num) = value.as_float() {
                    if num > *max {
                        return Err(format!("value {} is above maximum {}", num, max));
                    }
                }
            }

            Constraint::Positive => {
                if let Some(num) = value.as_float() {
                    if num <= 0.0 {
                        return Err(format!("value {} must be positive", num));
                    }
                }
            }

            Constraint::NonNegative => {
                if let Some(num) = value.as_float() {
                    if num < 0.0 {
                        return Err(format!("value {} must be non-negative", num));
                    }
                }
            }

            Constraint::OneOf(options) => {
                if let Some(s) = value.as_str() {
                    if !options.iter().any(|o| o == s) {
                        return Err(format!("'{}' is not one of {:?}", s, options));
                    }
                }
            }

            Constraint::NotEmpty => {
                if value.as_str().is_some_and(|s| s.is_empty()) {
                    return Err("value cannot be empty".to_string());
                }
            }
        }

        Ok(())
    }

    /// Get a human-readable description of this constraint.
    pub fn description(&self) -> String {
        match self {
            Constraint::Range { min, max } => format!("Must be between {} and {}", min, max),
            Constraint::MinValue(min) => format!("Must be at least {}", min),
            Constraint::MaxValue(max) => format!("Must be at most {}", max),
            Constraint::Positive => "Must be positive".to_string(),
            Constraint::NonNegative => "Must be non-negative".to_string(),
            Constraint::OneOf(options) => format!("One of {}", options.join(", ")),
            Constraint::NotEmpty => "Cannot be empty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<OptionDefinition> {
        vec![
            OptionDefinition::new("volume", OptionValue::Float(1.0)).with_range(0.0, 16.0),
            OptionDefinition::new("mode", OptionValue::String("longest".to_string()))
                .with_constraint(Constraint::OneOf(vec![
                    "longest".to_string(),
                    "shortest".to_string(),
                ])),
        ]
    }

    #[test]
    fn test_option_definition_builder() {
        let option = OptionDefinition::new("channels", OptionValue::Integer(2))
            .with_description("Channel count")
            .with_range(1.0, 64.0);

        assert_eq!(option.name, "channels");
        assert_eq!(option.kind, OptionKind::Integer);
        assert_eq!(option.constraints.len(), 1);
    }

    #[test]
    fn test_constraint_range_validation() {
        let constraint = Constraint::Range { min: 0.0, max: 100.0 };

        assert!(constraint.validate(&OptionValue::Float(50.0)).is_ok());
        assert!(constraint.validate(&OptionValue::Float(0.0)).is_ok());
        assert!(constraint.validate(&OptionValue::Integer(100)).is_ok());
        assert!(constraint.validate(&OptionValue::Float(-1.0)).is_err());
        assert!(constraint.validate(&OptionValue::Float(101.0)).is_err());
    }

    #[test]
    fn test_constraint_not_empty() {
        let constraint = Constraint::NotEmpty;

        assert!(constraint.validate(&OptionValue::String("x".to_string())).is_ok());
        assert!(constraint.validate(&OptionValue::String(String::new())).is_err());
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let mut staged = HashMap::new();
        staged.insert("volume".to_string(), "0.25".to_string());

        let values = resolve_options(&schema(), &staged).unwrap();
        assert_eq!(values.get_float("volume").unwrap(), 0.25);
        assert_eq!(values.get_string("mode").unwrap(), "longest");
    }

    #[test]
    fn test_resolve_rejects_unknown_and_bad_values() {
        let mut staged = HashMap::new();
        staged.insert("gain".to_string(), "2".to_string());
        assert_eq!(
            resolve_options(&schema(), &staged),
            Err(ProcessingError::UnknownOption("gain".to_string()))
        );

        let mut staged = HashMap::new();
        staged.insert("volume".to_string(), "loud".to_string());
        assert!(matches!(
            resolve_options(&schema(), &staged),
            Err(ProcessingError::InvalidOption { .. })
        ));

        let mut staged = HashMap::new();
        staged.insert("mode".to_string(), "first".to_string());
        assert!(resolve_options(&schema(), &staged).is_err());
    }
}
