//! # Parameter Middlewares
//!
//! Binding request data onto a command's layers is a chain of middlewares.
//! Each middleware receives the layers it may act on, the parsed layers being
//! built, and a [`Next`] handle for the rest of the chain.
//!
//! Value-setting middlewares run `next` first and apply their own values
//! afterwards, so the first middleware in the chain has the last word.
//! Filtering middlewares narrow the layers they pass to `next`.
//!
//! The chain a handler runs, outermost first:
//!
//! ```text
//! EnforceRequired      fails on required parameters that are still unset
//! SetFromDefaults      definition defaults for whatever is still missing
//! UpdateFromMapAsDefault   configured defaults
//! UpdateFromMap        configured overrides
//! Whitelist/Blacklist  restrict what the request may set
//! UpdateFromRequest    query string or form body (+ alias defaults)
//! ```

pub mod defaults;
pub mod filter;
pub mod overrides;
pub mod parameter_filter;
pub mod request;
pub mod required;

pub use defaults::{SetFromDefaults, UpdateFromMapAsDefault};
pub use filter::{BlacklistLayers, BlacklistParameters, WhitelistLayers, WhitelistParameters};
pub use overrides::{output_override, UpdateFromMap};
pub use parameter_filter::{FilterList, FilterValues, ParameterFilter};
pub use request::{bind_layer, AliasDefaults, BindOptions, RequestValues, UpdateFromRequest};
pub use required::EnforceRequired;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::layers::{ParameterLayers, ParsedLayers};
use crate::parameters::ParameterResult;

/// Values keyed by layer slug, then parameter name
pub type LayerValues = IndexMap<String, IndexMap<String, Value>>;

/// A step in the parameter binding chain
pub trait Middleware: Send + Sync {
    fn handle(
        &self,
        layers: &ParameterLayers,
        parsed: &mut ParsedLayers,
        next: Next<'_>,
    ) -> ParameterResult<()>;
}

pub type SharedMiddleware = Arc<dyn Middleware>;

/// The remainder of a middleware chain
pub struct Next<'a> {
    rest: &'a [SharedMiddleware],
}

impl<'a> Next<'a> {
    pub fn run(self, layers: &ParameterLayers, parsed: &mut ParsedLayers) -> ParameterResult<()> {
        match self.rest.split_first() {
            Some((head, rest)) => head.handle(layers, parsed, Next { rest }),
            None => Ok(()),
        }
    }
}

/// Run `middlewares` over `layers`, filling `parsed`
pub fn execute_middlewares(
    layers: &ParameterLayers,
    parsed: &mut ParsedLayers,
    middlewares: &[SharedMiddleware],
) -> ParameterResult<()> {
    Next { rest: middlewares }.run(layers, parsed)
}
