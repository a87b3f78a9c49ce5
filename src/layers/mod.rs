//! # Parameter Layers
//!
//! A layer groups related parameter definitions under a slug. Commands declare
//! their flags and arguments in the `default` layer and inherit the `output`
//! layer that controls formatting. Binding request data onto layers produces
//! [`ParsedLayers`].

pub mod output;

pub use output::{output_layer, OutputSettings};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::parameters::{ParameterDefinition, ParsedParameters};

/// Slug of the layer holding command flags and arguments
pub const DEFAULT_LAYER: &str = "default";

/// Slug of the layer holding output settings
pub const OUTPUT_LAYER: &str = "output";

/// A named group of parameter definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterLayer {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub definitions: Vec<ParameterDefinition>,
}

impl ParameterLayer {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: String::new(),
            definitions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_definition(mut self, definition: ParameterDefinition) -> Self {
        self.add_definition(definition);
        self
    }

    pub fn with_definitions(mut self, definitions: impl IntoIterator<Item = ParameterDefinition>) -> Self {
        for definition in definitions {
            self.add_definition(definition);
        }
        self
    }

    /// Add a definition, replacing one with the same name
    pub fn add_definition(&mut self, definition: ParameterDefinition) {
        match self.definitions.iter_mut().find(|d| d.name == definition.name) {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }
}

/// Ordered set of layers keyed by slug
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterLayers(IndexMap<String, ParameterLayer>);

impl ParameterLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer, replacing one with the same slug in place
    pub fn add(&mut self, layer: ParameterLayer) {
        self.0.insert(layer.slug.clone(), layer);
    }

    pub fn get(&self, slug: &str) -> Option<&ParameterLayer> {
        self.0.get(slug)
    }

    pub fn get_mut(&mut self, slug: &str) -> Option<&mut ParameterLayer> {
        self.0.get_mut(slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterLayer> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn slugs(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Keep only the given layers
    pub fn with_only_slugs<S: AsRef<str>>(&self, slugs: &[S]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(slug, _)| slugs.iter().any(|s| s.as_ref() == slug.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Drop the given layers
    pub fn without_slugs<S: AsRef<str>>(&self, slugs: &[S]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(slug, _)| !slugs.iter().any(|s| s.as_ref() == slug.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Keep only the named parameters of one layer. Other layers are untouched.
    pub fn with_only_parameters<S: AsRef<str>>(&self, slug: &str, names: &[S]) -> Self {
        self.retain_parameters(slug, |name| names.iter().any(|n| n.as_ref() == name))
    }

    /// Drop the named parameters of one layer. Other layers are untouched.
    pub fn without_parameters<S: AsRef<str>>(&self, slug: &str, names: &[S]) -> Self {
        self.retain_parameters(slug, |name| !names.iter().any(|n| n.as_ref() == name))
    }

    fn retain_parameters(&self, slug: &str, keep: impl Fn(&str) -> bool) -> Self {
        let mut ret = self.clone();
        if let Some(layer) = ret.0.get_mut(slug) {
            layer.definitions.retain(|d| keep(&d.name));
        }
        ret
    }
}

/// Values bound onto one layer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedLayer {
    pub slug: String,
    pub parameters: ParsedParameters,
}

/// Values bound onto every layer of a command
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedLayers(IndexMap<String, ParsedLayer>);

impl ParsedLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slug: &str) -> Option<&ParsedLayer> {
        self.0.get(slug)
    }

    pub fn get_mut(&mut self, slug: &str) -> Option<&mut ParsedLayer> {
        self.0.get_mut(slug)
    }

    /// Get a layer, creating an empty one on first access
    pub fn get_or_create(&mut self, slug: &str) -> &mut ParsedLayer {
        self.0
            .entry(slug.to_string())
            .or_insert_with(|| ParsedLayer {
                slug: slug.to_string(),
                parameters: ParsedParameters::new(),
            })
    }

    pub fn get_value(&self, slug: &str, name: &str) -> Option<&Value> {
        self.0.get(slug).and_then(|l| l.parameters.value(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParsedLayer> {
        self.0.values()
    }

    /// Values of the `default` layer
    pub fn default_values(&self) -> Map<String, Value> {
        self.0
            .get(DEFAULT_LAYER)
            .map(|l| l.parameters.to_map())
            .unwrap_or_default()
    }

    /// All values of all layers flattened into one map.
    ///
    /// The default layer is applied last so command flags win name clashes.
    pub fn all_values(&self) -> Map<String, Value> {
        let mut ret = Map::new();
        for layer in self.0.values().filter(|l| l.slug != DEFAULT_LAYER) {
            ret.extend(layer.parameters.to_map());
        }
        ret.extend(self.default_values());
        ret
    }
}
