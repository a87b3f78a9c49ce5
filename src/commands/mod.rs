//! # Commands
//!
//! A command describes its parameters through a [`CommandDescription`] and
//! produces either rows ([`RowCommand`]) or text ([`WriterCommand`]).
//! Aliases wrap another command and pre-fill some of its parameters.
//!
//! Commands are usually loaded from YAML files into a [`Repository`].

pub mod alias;
pub mod repository;
pub mod yaml;

pub use alias::{AliasDefinition, CommandAlias};
pub use repository::Repository;
pub use yaml::{load_command_file, LoadedCommand};

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::layers::{output_layer, ParameterLayer, ParameterLayers, ParsedLayers, DEFAULT_LAYER, OUTPUT_LAYER};
use crate::middlewares::AliasDefaults;
use crate::parameters::{ParameterDefinition, ParameterError};
use crate::processor::RowSink;

/// Errors raised while loading, looking up or running commands
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command {0} not found")]
    NotFound(String),

    #[error("command {path} is ambiguous, could be one of: {}", .candidates.join(", "))]
    Ambiguous { path: String, candidates: Vec<String> },

    #[error("invalid command definition in {path}: {reason}")]
    InvalidDefinition { path: String, reason: String },

    #[error("alias {name} points to unknown command {alias_for}")]
    DanglingAlias { name: String, alias_for: String },

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("command failed: {0}")]
    Execution(String),

    #[error("row sink closed")]
    SinkClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Name, help and parameter layers of a command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandDescription {
    pub name: String,
    pub short: String,
    /// Markdown
    pub long: String,
    pub parents: Vec<String>,
    pub layers: ParameterLayers,
    #[serde(skip)]
    argument_names: Vec<String>,
}

impl CommandDescription {
    pub fn builder(name: impl Into<String>) -> CommandDescriptionBuilder {
        CommandDescriptionBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parents and name joined with `/`
    pub fn full_path(&self) -> String {
        self.parents
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.name.as_str()))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Positional argument definitions, in declaration order
    pub fn arguments(&self) -> Vec<&ParameterDefinition> {
        let Some(layer) = self.layers.get(DEFAULT_LAYER) else {
            return Vec::new();
        };
        self.argument_names
            .iter()
            .filter_map(|name| layer.get(name))
            .collect()
    }

    /// Flag definitions of the default layer (everything but the arguments)
    pub fn flags(&self) -> Vec<&ParameterDefinition> {
        self.layers
            .get(DEFAULT_LAYER)
            .map(|l| {
                l.definitions
                    .iter()
                    .filter(|d| !self.argument_names.contains(&d.name))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn renamed(&self, name: &str, parents: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            parents,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandDescriptionBuilder {
    name: String,
    short: String,
    long: String,
    parents: Vec<String>,
    flags: Vec<ParameterDefinition>,
    arguments: Vec<ParameterDefinition>,
    layers: Vec<ParameterLayer>,
}

impl CommandDescriptionBuilder {
    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = short.into();
        self
    }

    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = long.into();
        self
    }

    pub fn parents(mut self, parents: Vec<String>) -> Self {
        self.parents = parents;
        self
    }

    pub fn flags(mut self, flags: impl IntoIterator<Item = ParameterDefinition>) -> Self {
        self.flags.extend(flags);
        self
    }

    pub fn arguments(mut self, arguments: impl IntoIterator<Item = ParameterDefinition>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    pub fn layer(mut self, layer: ParameterLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Flags and arguments go to the `default` layer, the `output` layer is
    /// added unless one was given.
    pub fn build(self) -> CommandDescription {
        let argument_names = self.arguments.iter().map(|a| a.name.clone()).collect();

        let mut layers = ParameterLayers::new();
        layers.add(
            ParameterLayer::new(DEFAULT_LAYER, "Flags")
                .with_definitions(self.flags)
                .with_definitions(self.arguments),
        );
        for layer in self.layers {
            if layer.slug == DEFAULT_LAYER {
                if let Some(default) = layers.get_mut(DEFAULT_LAYER) {
                    for definition in layer.definitions {
                        default.add_definition(definition);
                    }
                }
                continue;
            }
            layers.add(layer);
        }
        if layers.get(OUTPUT_LAYER).is_none() {
            layers.add(output_layer());
        }

        CommandDescription {
            name: self.name,
            short: self.short,
            long: self.long,
            parents: self.parents,
            layers,
            argument_names,
        }
    }
}

/// Optional data handed to templates next to the command output
pub type Metadata = Map<String, Value>;

/// A command that emits rows
#[async_trait]
pub trait RowCommand: Send + Sync {
    fn description(&self) -> &CommandDescription;

    async fn run_into_sink(&self, parsed: &ParsedLayers, sink: &mut dyn RowSink) -> Result<(), CommandError>;

    async fn metadata(&self, _parsed: &ParsedLayers) -> Result<Option<Metadata>, CommandError> {
        Ok(None)
    }
}

/// A command that writes text
#[async_trait]
pub trait WriterCommand: Send + Sync {
    fn description(&self) -> &CommandDescription;

    async fn run_into_writer(
        &self,
        parsed: &ParsedLayers,
        writer: &mut (dyn Write + Send),
    ) -> Result<(), CommandError>;

    async fn metadata(&self, _parsed: &ParsedLayers) -> Result<Option<Metadata>, CommandError> {
        Ok(None)
    }
}

#[derive(Clone)]
pub enum Command {
    Rows(Arc<dyn RowCommand>),
    Writer(Arc<dyn WriterCommand>),
    Alias(Arc<CommandAlias>),
}

impl Command {
    pub fn description(&self) -> &CommandDescription {
        match self {
            Self::Rows(c) => c.description(),
            Self::Writer(c) => c.description(),
            Self::Alias(a) => a.description(),
        }
    }

    /// The command that actually runs, following aliases
    pub fn resolve(&self) -> &Command {
        let mut current = self;
        while let Self::Alias(alias) = current {
            current = alias.target();
        }
        current
    }

    pub fn as_rows(&self) -> Option<&Arc<dyn RowCommand>> {
        match self.resolve() {
            Self::Rows(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_writer(&self) -> Option<&Arc<dyn WriterCommand>> {
        match self.resolve() {
            Self::Writer(c) => Some(c),
            _ => None,
        }
    }

    /// Values an alias pre-fills, empty for plain commands
    pub fn alias_defaults(&self) -> AliasDefaults {
        match self {
            Self::Alias(alias) => alias.alias_defaults(),
            _ => AliasDefaults::new(),
        }
    }

    pub async fn metadata(&self, parsed: &ParsedLayers) -> Result<Option<Metadata>, CommandError> {
        match self.resolve() {
            Self::Rows(c) => c.metadata(parsed).await,
            Self::Writer(c) => c.metadata(parsed).await,
            Self::Alias(_) => Ok(None),
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Rows(_) => "Rows",
            Self::Writer(_) => "Writer",
            Self::Alias(_) => "Alias",
        };
        f.debug_struct("Command")
            .field("kind", &kind)
            .field("path", &self.description().full_path())
            .finish()
    }
}
