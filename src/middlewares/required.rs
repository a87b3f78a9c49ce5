//! Required parameter enforcement

use serde_json::Value;

use super::{Middleware, Next};
use crate::layers::{ParameterLayers, ParsedLayers};
use crate::parameters::{ParameterError, ParameterResult};

/// Fails when a required parameter is still unset once the rest of the
/// chain has run. Belongs at the head of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnforceRequired;

impl Middleware for EnforceRequired {
    fn handle(
        &self,
        layers: &ParameterLayers,
        parsed: &mut ParsedLayers,
        next: Next<'_>,
    ) -> ParameterResult<()> {
        next.run(layers, parsed)?;

        for layer in layers.iter() {
            for definition in layer.definitions.iter().filter(|d| d.required) {
                match parsed.get_value(&layer.slug, &definition.name) {
                    None | Some(Value::Null) => {
                        return Err(ParameterError::MissingRequired(definition.name.clone()))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{ParameterLayer, DEFAULT_LAYER};
    use crate::middlewares::{execute_middlewares, RequestValues, SetFromDefaults, SharedMiddleware, UpdateFromRequest};
    use crate::parameters::{ParameterDefinition, ParameterType};
    use std::sync::Arc;

    fn layers() -> ParameterLayers {
        let mut layers = ParameterLayers::new();
        layers.add(
            ParameterLayer::new(DEFAULT_LAYER, "Flags")
                .with_definition(ParameterDefinition::new("name", ParameterType::String).required()),
        );
        layers
    }

    fn chain(query: &str) -> Vec<SharedMiddleware> {
        vec![
            Arc::new(EnforceRequired),
            Arc::new(SetFromDefaults),
            Arc::new(UpdateFromRequest::query(RequestValues::from_query_string(query))),
        ]
    }

    #[test]
    fn test_missing_required_fails() {
        let err = execute_middlewares(&layers(), &mut ParsedLayers::new(), &chain("")).unwrap_err();
        assert_eq!(err, ParameterError::MissingRequired("name".to_string()));
    }

    #[test]
    fn test_present_required_passes() {
        let mut parsed = ParsedLayers::new();
        execute_middlewares(&layers(), &mut parsed, &chain("name=x")).unwrap();
        assert!(parsed.get_value(DEFAULT_LAYER, "name").is_some());
    }
}
