//! The `output` layer: how rows are formatted

use serde_json::Value;

use super::{ParameterLayer, ParsedLayers, OUTPUT_LAYER};
use crate::parameters::{ParameterDefinition, ParameterType};

/// Definitions every command inherits for output formatting
pub fn output_layer() -> ParameterLayer {
    ParameterLayer::new(OUTPUT_LAYER, "Output")
        .with_description("Output formatting options")
        .with_definitions([
            ParameterDefinition::new("output", ParameterType::Choice)
                .with_choices(["table", "json", "yaml"])
                .with_default("table")
                .with_help("Output format"),
            ParameterDefinition::new("table-format", ParameterType::Choice)
                .with_choices(["ascii", "markdown", "html", "csv", "tsv"])
                .with_default("ascii")
                .with_help("Table format when output is table"),
            ParameterDefinition::new("output-file", ParameterType::String)
                .with_help("Write output to this file"),
            ParameterDefinition::new("fields", ParameterType::StringList)
                .with_help("Only keep these columns, in this order"),
            ParameterDefinition::new("filter", ParameterType::StringList)
                .with_help("Drop these columns"),
        ])
}

/// Output settings read back from parsed layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub output: String,
    pub table_format: String,
    pub output_file: Option<String>,
    pub fields: Vec<String>,
    pub filter: Vec<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output: "table".to_string(),
            table_format: "ascii".to_string(),
            output_file: None,
            fields: Vec::new(),
            filter: Vec::new(),
        }
    }
}

impl OutputSettings {
    pub fn from_parsed(parsed: &ParsedLayers) -> Self {
        let defaults = Self::default();
        let get = |name: &str| parsed.get_value(OUTPUT_LAYER, name);

        Self {
            output: get("output")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or(defaults.output),
            table_format: get("table-format")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .unwrap_or(defaults.table_format),
            output_file: get("output-file")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            fields: string_list(get("fields")),
            filter: string_list(get("filter")),
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}
