//! Form layout
//!
//! One section per parameter layer and one input per definition, carrying
//! the value currently bound so forms can be redisplayed filled in.

use serde::Serialize;
use serde_json::Value;

use crate::commands::CommandDescription;
use crate::layers::{ParsedLayers, OUTPUT_LAYER};
use crate::parameters::{ParameterDefinition, ParameterType};
use crate::processor::cell_text;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub inputs: Vec<Input>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Input {
    pub name: String,
    /// HTML input type: `text`, `password`, `number`, `checkbox`, `date`, `select`, `textarea`
    pub input_type: &'static str,
    pub parameter_type: ParameterType,
    pub value: Value,
    pub value_text: String,
    pub help: String,
    pub required: bool,
    pub multiple: bool,
    pub options: Vec<InputOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputOption {
    pub value: String,
    pub selected: bool,
}

/// Layout of every layer except `output`, which pages render as download links
pub fn compute_layout(description: &CommandDescription, parsed: &ParsedLayers) -> Layout {
    let sections = description
        .layers
        .iter()
        .filter(|l| l.slug != OUTPUT_LAYER && !l.definitions.is_empty())
        .map(|layer| Section {
            slug: layer.slug.clone(),
            title: layer.name.clone(),
            description: layer.description.clone(),
            inputs: layer
                .definitions
                .iter()
                .map(|d| input(d, parsed.get_value(&layer.slug, &d.name)))
                .collect(),
        })
        .collect();
    Layout { sections }
}

fn input(definition: &ParameterDefinition, value: Option<&Value>) -> Input {
    let value = value.cloned().unwrap_or(Value::Null);
    let ty = definition.parameter_type;

    let input_type = match ty {
        ParameterType::Secret => "password",
        ParameterType::Integer | ParameterType::Float => "number",
        ParameterType::Bool => "checkbox",
        ParameterType::Date => "date",
        ParameterType::Choice | ParameterType::ChoiceList => "select",
        t if t.is_file_loading() => "textarea",
        _ => "text",
    };

    let selected: Vec<String> = match &value {
        Value::Array(items) => items.iter().map(|i| cell_text(Some(i))).collect(),
        Value::Null => Vec::new(),
        other => vec![cell_text(Some(other))],
    };

    let options = definition
        .choices
        .iter()
        .map(|c| InputOption {
            value: c.clone(),
            selected: selected.contains(c),
        })
        .collect();

    Input {
        name: definition.name.clone(),
        input_type,
        parameter_type: ty,
        value_text: value_text(ty, &value),
        value,
        help: definition.short_help.clone(),
        required: definition.required,
        multiple: ty == ParameterType::ChoiceList,
        options,
    }
}

fn value_text(ty: ParameterType, value: &Value) -> String {
    match (ty, value) {
        (_, Value::Null) => String::new(),
        // date inputs take YYYY-MM-DD
        (ParameterType::Date, Value::String(s)) => s.chars().take(10).collect(),
        (ParameterType::KeyValue, Value::Object(map)) => map
            .iter()
            .map(|(k, v)| format!("{}:{}", k, cell_text(Some(v))))
            .collect::<Vec<_>>()
            .join(","),
        (ParameterType::StringListFromFile, Value::Array(items)) => items
            .iter()
            .map(|i| cell_text(Some(i)))
            .collect::<Vec<_>>()
            .join("\n"),
        (ParameterType::ObjectFromFile | ParameterType::ObjectListFromFile, v) => {
            serde_json::to_string_pretty(v).unwrap_or_default()
        }
        (_, Value::Array(items)) => items
            .iter()
            .map(|i| cell_text(Some(i)))
            .collect::<Vec<_>>()
            .join(","),
        (_, other) => cell_text(Some(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::DEFAULT_LAYER;
    use serde_json::json;

    #[test]
    fn test_layout_sections_and_values() {
        let description = CommandDescription::builder("users")
            .flags([
                ParameterDefinition::new("roles", ParameterType::ChoiceList)
                    .with_choices(["admin", "user", "guest"]),
                ParameterDefinition::new("since", ParameterType::Date),
                ParameterDefinition::new("token", ParameterType::Secret).required(),
                ParameterDefinition::new("ids", ParameterType::IntegerList),
            ])
            .build();

        let mut parsed = ParsedLayers::new();
        let layer = description.layers.get(DEFAULT_LAYER).unwrap();
        let params = &mut parsed.get_or_create(DEFAULT_LAYER).parameters;
        params.set(layer.get("roles").unwrap(), json!(["admin", "guest"]), "query");
        params.set(layer.get("since").unwrap(), json!("2024-02-03T00:00:00Z"), "query");
        params.set(layer.get("ids").unwrap(), json!([1, 2]), "query");

        let layout = compute_layout(&description, &parsed);
        assert_eq!(layout.sections.len(), 1);
        let inputs = &layout.sections[0].inputs;

        assert_eq!(inputs[0].input_type, "select");
        assert!(inputs[0].multiple);
        let selected: Vec<_> = inputs[0].options.iter().filter(|o| o.selected).map(|o| o.value.as_str()).collect();
        assert_eq!(selected, vec!["admin", "guest"]);

        assert_eq!(inputs[1].value_text, "2024-02-03");
        assert_eq!(inputs[2].input_type, "password");
        assert!(inputs[2].required);
        assert_eq!(inputs[2].value, Value::Null);
        assert_eq!(inputs[3].value_text, "1,2");
    }
}
