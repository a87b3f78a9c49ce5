//! Fixed overrides

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use super::{LayerValues, Middleware, Next};
use crate::layers::{ParameterLayers, ParsedLayers, OUTPUT_LAYER};
use crate::parameters::ParameterResult;

/// Overwrites parameters with configured values after the rest of the chain ran
#[derive(Debug, Clone, Default)]
pub struct UpdateFromMap {
    values: LayerValues,
    source: String,
}

impl UpdateFromMap {
    pub fn new(values: LayerValues) -> Self {
        Self::with_source(values, "override")
    }

    pub fn with_source(values: LayerValues, source: impl Into<String>) -> Self {
        Self {
            values,
            source: source.into(),
        }
    }
}

impl Middleware for UpdateFromMap {
    fn handle(
        &self,
        layers: &ParameterLayers,
        parsed: &mut ParsedLayers,
        next: Next<'_>,
    ) -> ParameterResult<()> {
        next.run(layers, parsed)?;

        for (slug, values) in &self.values {
            let Some(layer) = layers.get(slug) else {
                continue;
            };
            let target = &mut parsed.get_or_create(slug).parameters;
            for (name, raw) in values {
                let Some(definition) = layer.get(name) else {
                    warn!(layer = %slug, parameter = %name, "override for unknown parameter ignored");
                    continue;
                };
                let value = definition.coerce(raw)?;
                target.set(definition, value, &self.source);
            }
        }
        Ok(())
    }
}

/// Force the output format, e.g. `("table", "html")` or `("json", "")`
pub fn output_override(output: &str, table_format: &str) -> UpdateFromMap {
    let mut settings = IndexMap::new();
    settings.insert("output".to_string(), Value::String(output.to_string()));
    if !table_format.is_empty() {
        settings.insert(
            "table-format".to_string(),
            Value::String(table_format.to_string()),
        );
    }

    let mut values = LayerValues::new();
    values.insert(OUTPUT_LAYER.to_string(), settings);
    UpdateFromMap::with_source(values, "handler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{output_layer, OutputSettings};
    use crate::middlewares::{execute_middlewares, RequestValues, SharedMiddleware, UpdateFromRequest};
    use crate::parameters::ParameterError;
    use serde_json::json;
    use std::sync::Arc;

    fn layers() -> ParameterLayers {
        let mut layers = ParameterLayers::new();
        layers.add(output_layer());
        layers
    }

    #[test]
    fn test_output_override_beats_request() {
        let chain: Vec<SharedMiddleware> = vec![
            Arc::new(output_override("table", "html")),
            Arc::new(UpdateFromRequest::query(RequestValues::from_query_string(
                "output=json&table-format=csv",
            ))),
        ];
        let mut parsed = ParsedLayers::new();
        execute_middlewares(&layers(), &mut parsed, &chain).unwrap();

        let settings = OutputSettings::from_parsed(&parsed);
        assert_eq!(settings.output, "table");
        assert_eq!(settings.table_format, "html");
    }

    #[test]
    fn test_override_is_validated() {
        let mut values = LayerValues::new();
        values.insert(
            OUTPUT_LAYER.to_string(),
            [("output".to_string(), json!("xml"))].into_iter().collect(),
        );
        let chain: Vec<SharedMiddleware> = vec![Arc::new(UpdateFromMap::new(values))];
        let err = execute_middlewares(&layers(), &mut ParsedLayers::new(), &chain).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidValue { .. }));
    }
}
