//! Layer and parameter filters
//!
//! Filters narrow the layers seen by the inner part of the chain. Placed
//! around the request binding they decide which parameters a client may set.

use indexmap::IndexMap;

use super::{Middleware, Next};
use crate::layers::{ParameterLayers, ParsedLayers};
use crate::parameters::ParameterResult;

#[derive(Debug, Clone, Default)]
pub struct WhitelistLayers {
    slugs: Vec<String>,
}

impl WhitelistLayers {
    pub fn new(slugs: Vec<String>) -> Self {
        Self { slugs }
    }
}

impl Middleware for WhitelistLayers {
    fn handle(&self, layers: &ParameterLayers, parsed: &mut ParsedLayers, next: Next<'_>) -> ParameterResult<()> {
        next.run(&layers.with_only_slugs(&self.slugs), parsed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlacklistLayers {
    slugs: Vec<String>,
}

impl BlacklistLayers {
    pub fn new(slugs: Vec<String>) -> Self {
        Self { slugs }
    }
}

impl Middleware for BlacklistLayers {
    fn handle(&self, layers: &ParameterLayers, parsed: &mut ParsedLayers, next: Next<'_>) -> ParameterResult<()> {
        next.run(&layers.without_slugs(&self.slugs), parsed)
    }
}

/// Keeps only the listed parameters of each listed layer
#[derive(Debug, Clone, Default)]
pub struct WhitelistParameters {
    parameters: IndexMap<String, Vec<String>>,
}

impl WhitelistParameters {
    pub fn new(parameters: IndexMap<String, Vec<String>>) -> Self {
        Self { parameters }
    }
}

impl Middleware for WhitelistParameters {
    fn handle(&self, layers: &ParameterLayers, parsed: &mut ParsedLayers, next: Next<'_>) -> ParameterResult<()> {
        let filtered = self
            .parameters
            .iter()
            .fold(layers.clone(), |acc, (slug, names)| acc.with_only_parameters(slug, names));
        next.run(&filtered, parsed)
    }
}

/// Hides the listed parameters of each listed layer
#[derive(Debug, Clone, Default)]
pub struct BlacklistParameters {
    parameters: IndexMap<String, Vec<String>>,
}

impl BlacklistParameters {
    pub fn new(parameters: IndexMap<String, Vec<String>>) -> Self {
        Self { parameters }
    }
}

impl Middleware for BlacklistParameters {
    fn handle(&self, layers: &ParameterLayers, parsed: &mut ParsedLayers, next: Next<'_>) -> ParameterResult<()> {
        let filtered = self
            .parameters
            .iter()
            .fold(layers.clone(), |acc, (slug, names)| acc.without_parameters(slug, names));
        next.run(&filtered, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{output_layer, ParameterLayer, DEFAULT_LAYER, OUTPUT_LAYER};
    use crate::middlewares::{execute_middlewares, RequestValues, SetFromDefaults, SharedMiddleware, UpdateFromRequest};
    use crate::parameters::{ParameterDefinition, ParameterType};
    use serde_json::json;
    use std::sync::Arc;

    fn layers() -> ParameterLayers {
        let mut layers = ParameterLayers::new();
        layers.add(
            ParameterLayer::new(DEFAULT_LAYER, "Flags").with_definitions([
                ParameterDefinition::new("name", ParameterType::String),
                ParameterDefinition::new("limit", ParameterType::Integer).with_default(10),
            ]),
        );
        layers.add(output_layer());
        layers
    }

    fn query() -> SharedMiddleware {
        Arc::new(UpdateFromRequest::query(RequestValues::from_query_string(
            "name=bob&limit=3&output=json",
        )))
    }

    #[test]
    fn test_blacklisted_layer_keeps_defaults() {
        let chain: Vec<SharedMiddleware> = vec![
            Arc::new(SetFromDefaults),
            Arc::new(BlacklistLayers::new(vec![OUTPUT_LAYER.to_string()])),
            query(),
        ];
        let mut parsed = ParsedLayers::new();
        execute_middlewares(&layers(), &mut parsed, &chain).unwrap();

        assert_eq!(parsed.get_value(OUTPUT_LAYER, "output"), Some(&json!("table")));
        assert_eq!(parsed.get_value(DEFAULT_LAYER, "name"), Some(&json!("bob")));
    }

    #[test]
    fn test_whitelisted_parameters() {
        let mut allowed = IndexMap::new();
        allowed.insert(DEFAULT_LAYER.to_string(), vec!["name".to_string()]);
        let chain: Vec<SharedMiddleware> = vec![
            Arc::new(SetFromDefaults),
            Arc::new(WhitelistParameters::new(allowed)),
            query(),
        ];
        let mut parsed = ParsedLayers::new();
        execute_middlewares(&layers(), &mut parsed, &chain).unwrap();

        assert_eq!(parsed.get_value(DEFAULT_LAYER, "name"), Some(&json!("bob")));
        assert_eq!(parsed.get_value(DEFAULT_LAYER, "limit"), Some(&json!(10)));
        assert_eq!(parsed.get_value(OUTPUT_LAYER, "output"), Some(&json!("json")));
    }

    #[test]
    fn test_whitelisted_layers_and_blacklisted_parameters() {
        let mut hidden = IndexMap::new();
        hidden.insert(DEFAULT_LAYER.to_string(), vec!["limit".to_string()]);
        let chain: Vec<SharedMiddleware> = vec![
            Arc::new(WhitelistLayers::new(vec![DEFAULT_LAYER.to_string()])),
            Arc::new(BlacklistParameters::new(hidden)),
            query(),
        ];
        let mut parsed = ParsedLayers::new();
        execute_middlewares(&layers(), &mut parsed, &chain).unwrap();

        assert_eq!(parsed.get_value(DEFAULT_LAYER, "name"), Some(&json!("bob")));
        assert_eq!(parsed.get_value(DEFAULT_LAYER, "limit"), None);
        assert!(parsed.get(OUTPUT_LAYER).is_none());
    }
}
