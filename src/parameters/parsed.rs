//! Parsed parameter values

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use super::definition::ParameterDefinition;

/// One step in the history of a parsed value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseStep {
    /// Where the value came from (`defaults`, `query`, `form`, `alias`, `override`, ...)
    pub source: String,
    pub value: Value,
}

/// A value bound to its definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedParameter {
    pub definition: ParameterDefinition,
    pub value: Value,
    pub log: Vec<ParseStep>,
}

impl ParsedParameter {
    /// Source of the current value
    pub fn source(&self) -> Option<&str> {
        self.log.last().map(|s| s.source.as_str())
    }
}

/// Parsed values of one layer, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedParameters(IndexMap<String, ParsedParameter>);

impl ParsedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, appending to its parse log
    pub fn set(&mut self, definition: &ParameterDefinition, value: Value, source: &str) {
        let step = ParseStep {
            source: source.to_string(),
            value: value.clone(),
        };
        match self.0.get_mut(&definition.name) {
            Some(existing) => {
                existing.value = value;
                existing.log.push(step);
            }
            None => {
                self.0.insert(
                    definition.name.clone(),
                    ParsedParameter {
                        definition: definition.clone(),
                        value,
                        log: vec![step],
                    },
                );
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParsedParameter> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name).map(|p| &p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParsedParameter> {
        self.0.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParsedParameter)> {
        self.0.iter()
    }

    /// Merge `other` into this set. Values from `other` win and their logs
    /// are appended to ours.
    pub fn merge(&mut self, other: ParsedParameters) {
        for (name, parsed) in other.0 {
            match self.0.get_mut(&name) {
                Some(existing) => {
                    existing.value = parsed.value;
                    existing.log.extend(parsed.log);
                }
                None => {
                    self.0.insert(name, parsed);
                }
            }
        }
    }

    /// Plain name → value map
    pub fn to_map(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterType;
    use serde_json::json;

    #[test]
    fn test_set_records_history() {
        let def = ParameterDefinition::new("limit", ParameterType::Integer);
        let mut params = ParsedParameters::new();
        params.set(&def, json!(10), "defaults");
        params.set(&def, json!(20), "query");

        let parsed = params.get("limit").unwrap();
        assert_eq!(parsed.value, json!(20));
        assert_eq!(parsed.log.len(), 2);
        assert_eq!(parsed.source(), Some("query"));
    }

    #[test]
    fn test_merge_other_wins() {
        let a = ParameterDefinition::new("a", ParameterType::String);
        let b = ParameterDefinition::new("b", ParameterType::String);

        let mut left = ParsedParameters::new();
        left.set(&a, json!("left"), "defaults");

        let mut right = ParsedParameters::new();
        right.set(&a, json!("right"), "override");
        right.set(&b, json!("only-right"), "override");

        left.merge(right);
        assert_eq!(left.value("a"), Some(&json!("right")));
        assert_eq!(left.get("a").unwrap().log.len(), 2);
        assert_eq!(left.value("b"), Some(&json!("only-right")));
        assert_eq!(
            serde_json::Value::Object(left.to_map()),
            json!({"a": "right", "b": "only-right"})
        );
    }
}
