//! Parameter definitions and string coercion

use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::date::{format_date, parse_date};
use super::types::ParameterType;
use super::{ParameterError, ParameterResult};

/// A declared command parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,

    /// One-line help shown next to form inputs
    #[serde(default, rename = "help", skip_serializing_if = "String::is_empty")]
    pub short_help: String,

    #[serde(rename = "type")]
    pub parameter_type: ParameterType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Allowed values for `choice` and `choice-list`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    #[serde(default)]
    pub required: bool,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            short_help: String::new(),
            parameter_type,
            default: None,
            choices: Vec::new(),
            required: false,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.short_help = help.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Coerce raw request strings into a typed value.
    ///
    /// Scalar types take exactly one value, list types parse every item.
    pub fn parse(&self, values: &[String]) -> ParameterResult<Value> {
        let raw = values.join(",");

        if self.parameter_type.is_file_loading() {
            return self.parse_from_str(&values.join("\n"));
        }

        if self.parameter_type == ParameterType::KeyValue {
            return self.parse_key_values(values);
        }

        if self.parameter_type.is_list() {
            let item_type = self.parameter_type.item_type();
            let items = values
                .iter()
                .map(|v| self.parse_item(item_type, v))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|reason| ParameterError::invalid(&self.name, &raw, reason))?;
            return Ok(Value::Array(items));
        }

        match values {
            [single] => self
                .parse_item(self.parameter_type, single)
                .map_err(|reason| ParameterError::invalid(&self.name, &raw, reason)),
            [] => Err(ParameterError::invalid(&self.name, raw, "no value given")),
            _ => Err(ParameterError::invalid(
                &self.name,
                &raw,
                format!("expected a single value, got {}", values.len()),
            )),
        }
    }

    /// Parse file-backed content read from `reader`
    pub fn parse_from_reader<R: Read>(&self, mut reader: R) -> ParameterResult<Value> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| ParameterError::invalid(&self.name, "<reader>", e.to_string()))?;
        self.parse_from_str(&content)
    }

    /// Coerce an already-typed JSON value, as found in config overrides.
    ///
    /// Strings go through [`parse`](Self::parse) (comma-split for lists), arrays
    /// are parsed item by item and other scalars are parsed from their JSON text.
    pub fn coerce(&self, value: &Value) -> ParameterResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if self.parameter_type.is_file_loading() => self.parse_from_str(s),
            Value::String(s) if self.parameter_type.is_list() => {
                let items: Vec<String> = s.split(',').map(str::to_owned).collect();
                self.parse(&items)
            }
            Value::String(s) => self.parse(std::slice::from_ref(s)),
            Value::Object(_) if self.parameter_type == ParameterType::KeyValue => Ok(value.clone()),
            Value::Array(items)
                if self.parameter_type.is_list() && !self.parameter_type.is_file_loading() =>
            {
                let raw: Vec<String> = items.iter().map(raw_text).collect();
                self.parse(&raw)
            }
            other if self.parameter_type.is_file_loading() => self.parse_from_str(&raw_text(other)),
            other => self.parse(&[raw_text(other)]),
        }
    }

    /// The declared default, coerced to the parameter type.
    ///
    /// String defaults of date parameters are parsed as dates.
    pub fn default_value(&self) -> ParameterResult<Option<Value>> {
        match (&self.default, self.parameter_type) {
            (None, _) => Ok(None),
            (Some(Value::String(s)), ParameterType::Date) => parse_date(s)
                .map(|d| Some(Value::String(format_date(&d))))
                .map_err(|e| ParameterError::InvalidDefault {
                    name: self.name.clone(),
                    reason: e.to_string(),
                }),
            (Some(value), _) => Ok(Some(value.clone())),
        }
    }

    fn parse_from_str(&self, content: &str) -> ParameterResult<Value> {
        match self.parameter_type {
            ParameterType::StringFromFile => Ok(Value::String(content.to_string())),
            ParameterType::StringListFromFile => Ok(Value::Array(
                content
                    .lines()
                    .map(|l| l.trim_end_matches('\r'))
                    .filter(|l| !l.is_empty())
                    .map(|l| Value::String(l.to_string()))
                    .collect(),
            )),
            ParameterType::ObjectFromFile => match self.parse_document(content)? {
                obj @ Value::Object(_) => Ok(obj),
                _ => Err(ParameterError::invalid(&self.name, content, "expected an object")),
            },
            ParameterType::ObjectListFromFile => match self.parse_document(content)? {
                obj @ Value::Object(_) => Ok(Value::Array(vec![obj])),
                Value::Array(items) if items.iter().all(Value::is_object) => Ok(Value::Array(items)),
                _ => Err(ParameterError::invalid(
                    &self.name,
                    content,
                    "expected a list of objects",
                )),
            },
            other => Err(ParameterError::invalid(
                &self.name,
                content,
                format!("parameter of type {} is not file-backed", other),
            )),
        }
    }

    /// JSON is valid YAML, so one parser covers both
    fn parse_document(&self, content: &str) -> ParameterResult<Value> {
        serde_yaml::from_str::<Value>(content)
            .map_err(|e| ParameterError::invalid(&self.name, content, e.to_string()))
    }

    fn parse_key_values(&self, values: &[String]) -> ParameterResult<Value> {
        let mut map = Map::new();
        for item in values.iter().filter(|v| !v.is_empty()) {
            let (key, value) = item.split_once(':').ok_or_else(|| {
                ParameterError::invalid(&self.name, item, "expected key:value")
            })?;
            map.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
        }
        Ok(Value::Object(map))
    }

    fn parse_item(&self, item_type: ParameterType, raw: &str) -> Result<Value, String> {
        match item_type {
            ParameterType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| e.to_string()),
            ParameterType::Float => {
                let f = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| "not a finite number".to_string())
            }
            ParameterType::Bool => parse_bool(raw).map(Value::Bool),
            ParameterType::Date => parse_date(raw)
                .map(|d| Value::String(format_date(&d)))
                .map_err(|e| e.to_string()),
            ParameterType::Choice => {
                if self.choices.iter().any(|c| c == raw) {
                    Ok(Value::String(raw.to_string()))
                } else {
                    Err(format!("'{}' is not one of: {}", raw, self.choices.join(", ")))
                }
            }
            _ => Ok(Value::String(raw.to_string())),
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

/// Text form of a JSON value as it would appear in a query string
pub(crate) fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scalar_parsing() {
        let count = ParameterDefinition::new("count", ParameterType::Integer);
        assert_eq!(count.parse(&strings(&["42"])).unwrap(), json!(42));
        assert!(count.parse(&strings(&["4x"])).is_err());
        assert!(count.parse(&strings(&["1", "2"])).is_err());

        let ratio = ParameterDefinition::new("ratio", ParameterType::Float);
        assert_eq!(ratio.parse(&strings(&["0.5"])).unwrap(), json!(0.5));

        let flag = ParameterDefinition::new("verbose", ParameterType::Bool);
        assert_eq!(flag.parse(&strings(&["yes"])).unwrap(), json!(true));
        assert_eq!(flag.parse(&strings(&["OFF"])).unwrap(), json!(false));
        assert!(flag.parse(&strings(&["maybe"])).is_err());
    }

    #[test]
    fn test_choice_parsing() {
        let role = ParameterDefinition::new("role", ParameterType::Choice)
            .with_choices(["admin", "user"]);
        assert_eq!(role.parse(&strings(&["admin"])).unwrap(), json!("admin"));

        let err = role.parse(&strings(&["root"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for parameter 'role': (root) 'root' is not one of: admin, user"
        );

        let roles = ParameterDefinition::new("roles", ParameterType::ChoiceList)
            .with_choices(["admin", "user"]);
        assert_eq!(
            roles.parse(&strings(&["admin", "user"])).unwrap(),
            json!(["admin", "user"])
        );
        assert!(roles.parse(&strings(&["admin", "root"])).is_err());
    }

    #[test]
    fn test_list_parsing() {
        let ids = ParameterDefinition::new("ids", ParameterType::IntegerList);
        assert_eq!(ids.parse(&strings(&["1", "2", "3"])).unwrap(), json!([1, 2, 3]));

        let err = ids.parse(&strings(&["1", "two"])).unwrap_err();
        assert!(err.to_string().contains("(1,two)"));
    }

    #[test]
    fn test_date_parsing() {
        let since = ParameterDefinition::new("since", ParameterType::Date);
        assert_eq!(
            since.parse(&strings(&["2023-05-01"])).unwrap(),
            json!("2023-05-01T00:00:00Z")
        );
    }

    #[test]
    fn test_key_value_parsing() {
        let labels = ParameterDefinition::new("labels", ParameterType::KeyValue);
        assert_eq!(
            labels.parse(&strings(&["env:prod", "team: core"])).unwrap(),
            json!({"env": "prod", "team": "core"})
        );
        assert!(labels.parse(&strings(&["broken"])).is_err());
    }

    #[test]
    fn test_file_loading() {
        let body = ParameterDefinition::new("body", ParameterType::StringFromFile);
        assert_eq!(
            body.parse_from_reader("hello\nworld".as_bytes()).unwrap(),
            json!("hello\nworld")
        );

        let lines = ParameterDefinition::new("lines", ParameterType::StringListFromFile);
        assert_eq!(
            lines.parse_from_reader("a\r\nb\n\n".as_bytes()).unwrap(),
            json!(["a", "b"])
        );

        let obj = ParameterDefinition::new("filter", ParameterType::ObjectFromFile);
        assert_eq!(
            obj.parse_from_reader(r#"{"a": 1}"#.as_bytes()).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(obj.parse_from_reader("a: 1".as_bytes()).unwrap(), json!({"a": 1}));
        assert!(obj.parse_from_reader("[1, 2]".as_bytes()).is_err());

        let list = ParameterDefinition::new("items", ParameterType::ObjectListFromFile);
        assert_eq!(
            list.parse_from_reader(r#"[{"a": 1}, {"a": 2}]"#.as_bytes()).unwrap(),
            json!([{"a": 1}, {"a": 2}])
        );
    }

    #[test]
    fn test_coerce_config_values() {
        let count = ParameterDefinition::new("count", ParameterType::Integer);
        assert_eq!(count.coerce(&json!(7)).unwrap(), json!(7));
        assert_eq!(count.coerce(&json!("7")).unwrap(), json!(7));

        let tags = ParameterDefinition::new("tags", ParameterType::StringList);
        assert_eq!(tags.coerce(&json!("a,b")).unwrap(), json!(["a", "b"]));
        assert_eq!(tags.coerce(&json!(["a", "b"])).unwrap(), json!(["a", "b"]));

        let flag = ParameterDefinition::new("flag", ParameterType::Bool);
        assert_eq!(flag.coerce(&json!(true)).unwrap(), json!(true));
    }

    #[test]
    fn test_date_default_is_parsed() {
        let since = ParameterDefinition::new("since", ParameterType::Date).with_default("2020-01-01");
        assert_eq!(
            since.default_value().unwrap(),
            Some(json!("2020-01-01T00:00:00Z"))
        );

        let broken = ParameterDefinition::new("since", ParameterType::Date).with_default("soon");
        assert!(matches!(
            broken.default_value(),
            Err(ParameterError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn test_yaml_definition() {
        let def: ParameterDefinition = serde_yaml::from_str(
            "name: role\ntype: choice\nchoices: [a, b]\nhelp: Pick one\nrequired: true\n",
        )
        .unwrap();
        assert_eq!(def.parameter_type, ParameterType::Choice);
        assert_eq!(def.short_help, "Pick one");
        assert!(def.required);
    }
}
