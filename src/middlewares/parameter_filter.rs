//! Configured defaults, overrides and visibility for a route

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{
    BlacklistLayers, BlacklistParameters, LayerValues, SharedMiddleware, UpdateFromMap, UpdateFromMapAsDefault,
    WhitelistLayers, WhitelistParameters,
};
use crate::layers::DEFAULT_LAYER;

/// Values for command flags, arguments and whole layers
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterValues {
    pub flags: IndexMap<String, Value>,
    pub arguments: IndexMap<String, Value>,
    pub layers: LayerValues,
}

impl FilterValues {
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.arguments.is_empty() && self.layers.is_empty()
    }

    /// Flags and arguments land in the `default` layer and win over a
    /// `layers.default` entry of the same name
    pub fn to_layer_values(&self) -> LayerValues {
        let mut ret = self.layers.clone();
        if !self.flags.is_empty() || !self.arguments.is_empty() {
            let default = ret.entry(DEFAULT_LAYER.to_string()).or_default();
            default.extend(self.flags.iter().map(|(k, v)| (k.clone(), v.clone())));
            default.extend(self.arguments.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        ret
    }
}

/// Names of layers and default-layer parameters
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct FilterList {
    /// Parameters of the `default` layer
    pub flags: Vec<String>,
    /// Whole layers by slug
    pub layers: Vec<String>,
    /// Parameters of other layers, by slug
    pub layer_parameters: IndexMap<String, Vec<String>>,
}

impl FilterList {
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.layers.is_empty() && self.layer_parameters.is_empty()
    }

    fn parameters(&self) -> IndexMap<String, Vec<String>> {
        let mut ret = self.layer_parameters.clone();
        if !self.flags.is_empty() {
            ret.entry(DEFAULT_LAYER.to_string())
                .or_default()
                .extend(self.flags.iter().cloned());
        }
        ret
    }
}

/// What a route lets clients set, and the values it fills in or forces
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterFilter {
    pub defaults: FilterValues,
    pub overrides: FilterValues,
    pub whitelist: FilterList,
    pub blacklist: FilterList,
}

impl ParameterFilter {
    /// The configured part of a handler chain, outermost first. Request
    /// binding goes after these so the filters apply to it.
    pub fn middlewares(&self) -> Vec<SharedMiddleware> {
        let mut ret: Vec<SharedMiddleware> = Vec::new();

        if !self.defaults.is_empty() {
            ret.push(Arc::new(UpdateFromMapAsDefault::new(self.defaults.to_layer_values())));
        }
        if !self.overrides.is_empty() {
            ret.push(Arc::new(UpdateFromMap::new(self.overrides.to_layer_values())));
        }

        if !self.whitelist.layers.is_empty() {
            let mut slugs = self.whitelist.layers.clone();
            // whitelisted parameters keep their layer visible
            for slug in self.whitelist.parameters().into_keys() {
                if !slugs.contains(&slug) {
                    slugs.push(slug);
                }
            }
            ret.push(Arc::new(WhitelistLayers::new(slugs)));
        }
        let whitelisted = self.whitelist.parameters();
        if !whitelisted.is_empty() {
            ret.push(Arc::new(WhitelistParameters::new(whitelisted)));
        }

        if !self.blacklist.layers.is_empty() {
            ret.push(Arc::new(BlacklistLayers::new(self.blacklist.layers.clone())));
        }
        let blacklisted = self.blacklist.parameters();
        if !blacklisted.is_empty() {
            ret.push(Arc::new(BlacklistParameters::new(blacklisted)));
        }

        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{output_layer, ParameterLayer, ParameterLayers, ParsedLayers, OUTPUT_LAYER};
    use crate::middlewares::{execute_middlewares, RequestValues, SetFromDefaults, UpdateFromRequest};
    use crate::parameters::{ParameterDefinition, ParameterType};
    use serde_json::json;

    fn layers() -> ParameterLayers {
        let mut layers = ParameterLayers::new();
        layers.add(
            ParameterLayer::new(DEFAULT_LAYER, "Flags").with_definitions([
                ParameterDefinition::new("name", ParameterType::String),
                ParameterDefinition::new("limit", ParameterType::Integer).with_default(10),
                ParameterDefinition::new("role", ParameterType::String),
            ]),
        );
        layers.add(output_layer());
        layers
    }

    fn run(filter: &ParameterFilter, query: &str) -> ParsedLayers {
        let mut chain: Vec<SharedMiddleware> = vec![Arc::new(SetFromDefaults)];
        chain.extend(filter.middlewares());
        chain.push(Arc::new(UpdateFromRequest::query(RequestValues::from_query_string(query))));

        let mut parsed = ParsedLayers::new();
        execute_middlewares(&layers(), &mut parsed, &chain).unwrap();
        parsed
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let filter: ParameterFilter = serde_yaml::from_str(
            r#"
defaults:
  flags:
    limit: 5
overrides:
  layers:
    output:
      output: json
whitelist:
  flags: [name]
blacklist:
  layers: [output]
"#,
        )
        .unwrap();

        assert_eq!(filter.defaults.flags.get("limit"), Some(&json!(5)));
        assert_eq!(filter.whitelist.flags, vec!["name"]);
        assert_eq!(filter.blacklist.layers, vec!["output"]);
        assert_eq!(filter.middlewares().len(), 4);
    }

    #[test]
    fn test_defaults_lose_to_request_overrides_win() {
        let filter = ParameterFilter {
            defaults: FilterValues {
                flags: IndexMap::from([("limit".to_string(), json!(5)), ("name".to_string(), json!("config"))]),
                ..Default::default()
            },
            overrides: FilterValues {
                flags: IndexMap::from([("role".to_string(), json!("admin"))]),
                ..Default::default()
            },
            ..Default::default()
        };

        let parsed = run(&filter, "name=bob&role=guest");
        assert_eq!(parsed.get_value(DEFAULT_LAYER, "limit"), Some(&json!(5)));
        assert_eq!(parsed.get_value(DEFAULT_LAYER, "name"), Some(&json!("bob")));
        assert_eq!(parsed.get_value(DEFAULT_LAYER, "role"), Some(&json!("admin")));
    }

    #[test]
    fn test_blacklisted_flag_cannot_be_set() {
        let filter = ParameterFilter {
            blacklist: FilterList {
                flags: vec!["limit".to_string()],
                layers: vec![OUTPUT_LAYER.to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        let parsed = run(&filter, "limit=1&name=bob&output=json");
        assert_eq!(parsed.get_value(DEFAULT_LAYER, "limit"), Some(&json!(10)));
        assert_eq!(parsed.get_value(DEFAULT_LAYER, "name"), Some(&json!("bob")));
        assert_eq!(parsed.get_value(OUTPUT_LAYER, "output"), Some(&json!("table")));
    }
}
