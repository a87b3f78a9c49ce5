//! Command aliases

use indexmap::IndexMap;
use serde::Deserialize;

use super::{Command, CommandDescription};
use crate::layers::DEFAULT_LAYER;
use crate::middlewares::AliasDefaults;

/// Alias file contents before the target is resolved
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AliasDefinition {
    pub name: String,
    pub alias_for: String,
    #[serde(default)]
    pub flags: IndexMap<String, String>,
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// A command that runs another one with pre-filled parameters
#[derive(Debug, Clone)]
pub struct CommandAlias {
    pub name: String,
    pub alias_for: String,
    pub parents: Vec<String>,
    pub flags: IndexMap<String, String>,
    pub arguments: Vec<String>,
    target: Command,
    description: CommandDescription,
}

impl CommandAlias {
    pub fn new(definition: AliasDefinition, parents: Vec<String>, target: Command) -> Self {
        let description = target.description().renamed(&definition.name, parents.clone());
        Self {
            name: definition.name,
            alias_for: definition.alias_for,
            parents,
            flags: definition.flags,
            arguments: definition.arguments,
            target,
            description,
        }
    }

    pub fn target(&self) -> &Command {
        &self.target
    }

    pub fn description(&self) -> &CommandDescription {
        &self.description
    }

    /// Flag values plus positional arguments mapped onto the target's
    /// argument definitions by index. Extra arguments are dropped. When the
    /// target is itself an alias, its defaults apply underneath.
    pub fn alias_defaults(&self) -> AliasDefaults {
        let mut ret = match &self.target {
            Command::Alias(inner) => inner.alias_defaults(),
            _ => AliasDefaults::new(),
        };

        let defaults = ret.entry(DEFAULT_LAYER.to_string()).or_default();
        defaults.extend(self.flags.iter().map(|(k, v)| (k.clone(), v.clone())));
        let arguments = self.target.description().arguments();
        for (idx, value) in self.arguments.iter().enumerate() {
            if let Some(definition) = arguments.get(idx) {
                defaults.insert(definition.name.clone(), value.clone());
            }
        }
        ret
    }
}
