//! Default values

use super::{LayerValues, Middleware, Next};
use crate::layers::{ParameterLayers, ParsedLayers};
use crate::parameters::ParameterResult;

/// Fills every unset parameter with its declared default
#[derive(Debug, Clone, Copy, Default)]
pub struct SetFromDefaults;

impl Middleware for SetFromDefaults {
    fn handle(
        &self,
        layers: &ParameterLayers,
        parsed: &mut ParsedLayers,
        next: Next<'_>,
    ) -> ParameterResult<()> {
        next.run(layers, parsed)?;

        for layer in layers.iter() {
            let target = &mut parsed.get_or_create(&layer.slug).parameters;
            for definition in &layer.definitions {
                if target.contains(&definition.name) {
                    continue;
                }
                if let Some(value) = definition.default_value()? {
                    target.set(definition, value, "defaults");
                }
            }
        }
        Ok(())
    }
}

/// Fills unset parameters from configured per-layer defaults.
///
/// Unknown layers and parameters are skipped.
#[derive(Debug, Clone, Default)]
pub struct UpdateFromMapAsDefault {
    values: LayerValues,
}

impl UpdateFromMapAsDefault {
    pub fn new(values: LayerValues) -> Self {
        Self { values }
    }
}

impl Middleware for UpdateFromMapAsDefault {
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
                    continue;
                };
                if target.contains(name) {
                    continue;
                }
                let value = definition.coerce(raw)?;
                target.set(definition, value, "config-defaults");
            }
        }
        Ok(())
    }
}
