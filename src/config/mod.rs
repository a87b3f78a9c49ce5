//! # Server Configuration
//!
//! A config file lists the routes a server exposes. Every route has a `path`
//! and exactly one kind:
//!
//! ```yaml
//! port: 8080
//! routes:
//!   - path: /commands
//!     commandDirectory:
//!       repositories: [./commands]
//!       defaults:
//!         flags:
//!           limit: 10
//!       blacklist:
//!         layers: [output]
//!   - path: /users
//!     command:
//!       file: ./users.yaml
//!   - path: /static
//!     static:
//!       localPath: ./assets
//!   - path: /about
//!     templateFile:
//!       file: ./about.md
//!   - path: /
//!     templateDirectory:
//!       localDirectory: ./pages
//! ```
//!
//! Files ending in `.toml` are read as TOML. `_env` mappings are resolved
//! before the config is deserialized, see [`evaluator`]. Relative paths are
//! relative to the working directory.

pub mod evaluator;
pub mod validator;

pub use evaluator::{evaluate_env, evaluate_with};
pub use validator::{format_validation_errors, validate_config, ConfigValidationError, ConfigValidator};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::commands::{load_command_file, CommandError, LoadedCommand, Repository};
use crate::handlers::pages::{pages_router, single_page_router, INDEX_PAGE};
use crate::handlers::{GenericCommandHandler, HandlerConfig};
use crate::middlewares::{FilterList, FilterValues, ParameterFilter};
use crate::render::{RenderError, SharedLookup, TemplateDir, TemplateFile, TemplateLookups};
use crate::server::{Server, StaticPath};

/// Suffixes of files served from template directories
const TEMPLATE_SUFFIXES: &[&str] = &[".md", ".html"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    #[error("'_env' must name a variable with a string")]
    InvalidEnvKey,

    #[error("invalid configuration:\n{}", format_validation_errors(.0))]
    Invalid(Vec<ConfigValidationError>),

    #[error("{0} declares an alias, a command route needs a command")]
    AliasRoute(PathBuf),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==================
// Config types
// ==================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ServerConfig {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub dev: bool,
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RouteConfig {
    pub path: String,
    #[serde(default)]
    pub command_directory: Option<CommandDirectoryRoute>,
    #[serde(default)]
    pub command: Option<CommandRoute>,
    #[serde(default, rename = "static")]
    pub static_dir: Option<StaticRoute>,
    #[serde(default)]
    pub template_file: Option<TemplateFileRoute>,
    #[serde(default)]
    pub template_directory: Option<TemplateDirectoryRoute>,
}

/// Options shared by both command route kinds
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandlerOptions {
    /// Templates looked up before the built-in ones
    pub template_directory: Option<PathBuf>,
    pub template_name: Option<String>,
    pub index_template_name: Option<String>,
    pub additional_data: Map<String, Value>,
    pub stream: Option<bool>,
    pub defaults: FilterValues,
    pub overrides: FilterValues,
    pub whitelist: FilterList,
    pub blacklist: FilterList,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDirectoryRoute {
    pub repositories: Vec<PathBuf>,
    #[serde(flatten)]
    pub options: HandlerOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRoute {
    pub file: PathBuf,
    #[serde(flatten)]
    pub options: HandlerOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StaticRoute {
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TemplateFileRoute {
    pub file: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TemplateDirectoryRoute {
    pub local_directory: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub enum RouteKind<'a> {
    CommandDirectory(&'a CommandDirectoryRoute),
    Command(&'a CommandRoute),
    Static(&'a StaticRoute),
    TemplateFile(&'a TemplateFileRoute),
    TemplateDirectory(&'a TemplateDirectoryRoute),
}

impl RouteKind<'_> {
    pub const NAMES: &'static [&'static str] =
        &["commandDirectory", "command", "static", "templateFile", "templateDirectory"];
}

impl RouteConfig {
    /// Names of the route kinds this route sets
    pub fn kinds_set(&self) -> Vec<&'static str> {
        let set = [
            self.command_directory.is_some(),
            self.command.is_some(),
            self.static_dir.is_some(),
            self.template_file.is_some(),
            self.template_directory.is_some(),
        ];
        RouteKind::NAMES
            .iter()
            .zip(set)
            .filter_map(|(name, set)| set.then_some(*name))
            .collect()
    }

    pub fn kind(&self) -> Result<RouteKind<'_>, ConfigError> {
        let kinds: Vec<RouteKind<'_>> = [
            self.command_directory.as_ref().map(RouteKind::CommandDirectory),
            self.command.as_ref().map(RouteKind::Command),
            self.static_dir.as_ref().map(RouteKind::Static),
            self.template_file.as_ref().map(RouteKind::TemplateFile),
            self.template_directory.as_ref().map(RouteKind::TemplateDirectory),
        ]
        .into_iter()
        .flatten()
        .collect();

        match kinds.as_slice() {
            [kind] => Ok(*kind),
            _ => {
                let mut v = ConfigValidator::new();
                v.validate_exactly_one(&self.path, &self.kinds_set(), RouteKind::NAMES);
                Err(ConfigError::Invalid(v.finish().err().unwrap_or_default()))
            }
        }
    }
}

impl HandlerOptions {
    pub fn filter(&self) -> ParameterFilter {
        ParameterFilter {
            defaults: self.defaults.clone(),
            overrides: self.overrides.clone(),
            whitelist: self.whitelist.clone(),
            blacklist: self.blacklist.clone(),
        }
    }

    fn handler_config(&self, base_path: &str, dev: bool) -> ConfigResult<HandlerConfig> {
        let mut templates = TemplateLookups::embedded();
        if let Some(dir) = &self.template_directory {
            templates.prepend([template_dir(dir, dev)?]);
        }

        let mut config = HandlerConfig::default()
            .with_filter(self.filter())
            .with_templates(templates)
            .with_base_path(base_path)
            .with_additional_data(self.additional_data.clone(), true);
        if let Some(stream) = self.stream {
            config = config.with_stream(stream);
        }
        if let Some(name) = &self.template_name {
            config = config.with_template_name(name.clone());
        }
        if let Some(name) = &self.index_template_name {
            config = config.with_index_template_name(name.clone());
        }
        Ok(config)
    }
}

fn template_dir(dir: &Path, dev: bool) -> ConfigResult<SharedLookup> {
    Ok(Arc::new(TemplateDir::new(dir, TEMPLATE_SUFFIXES)?.with_always_reload(dev)))
}

// ==================
// Loading
// ==================

impl ServerConfig {
    /// Read, evaluate and validate a config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        validate_config(&config).map_err(ConfigError::Invalid)?;
        info!(config = %path.display(), routes = config.routes.len(), "loaded server config");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        Self::from_value(value)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let value: toml::Value = toml::from_str(content)?;
        Self::from_value(serde_yaml::to_value(value)?)
    }

    fn from_value(mut value: serde_yaml::Value) -> ConfigResult<Self> {
        evaluate_env(&mut value)?;
        Ok(serde_yaml::from_value(value)?)
    }

    /// Build a server exposing every route. `dev` turns on dev mode on top
    /// of the config's own setting.
    pub fn build_server(&self, dev: bool) -> ConfigResult<Server> {
        let dev = dev || self.dev;
        let mut server = Server::new().with_dev_mode(dev);
        if let Some(address) = &self.address {
            server = server.with_address(address.clone());
        }
        if let Some(port) = self.port {
            server = server.with_port(port);
        }

        for route in &self.routes {
            server = add_route(server, route, dev)?;
        }
        Ok(server)
    }
}

fn add_route(server: Server, route: &RouteConfig, dev: bool) -> ConfigResult<Server> {
    let path = route.path.as_str();
    let server = match route.kind()? {
        RouteKind::CommandDirectory(dir) => {
            let mut repository = Repository::new();
            for root in &dir.repositories {
                for command in Repository::load_from_dir(root)?.commands() {
                    repository.add(command.clone());
                }
            }
            info!(path = %path, commands = repository.len(), "serving command directory");
            let config = dir.options.handler_config(path, dev)?;
            server.with_routes(path, GenericCommandHandler::for_repository(repository, config).router())
        }
        RouteKind::Command(route) => {
            let command = match load_command_file(&route.file, Vec::new())? {
                LoadedCommand::Command(command) => command,
                LoadedCommand::Alias(_) => return Err(ConfigError::AliasRoute(route.file.clone())),
            };
            info!(path = %path, command = %command.description().name, "serving command");
            let config = route.options.handler_config(path, dev)?;
            server.with_routes(path, GenericCommandHandler::for_command(command, config).router())
        }
        RouteKind::Static(dir) => server.with_static_paths([StaticPath::new(path, &dir.local_path)]),
        RouteKind::TemplateFile(file) => {
            let page = path.trim_matches('/').rsplit('/').next().unwrap_or_default();
            let page = if page.is_empty() { INDEX_PAGE } else { page };
            let suffix = if file.file.extension().is_some_and(|ext| ext == "md") {
                "md"
            } else {
                "html"
            };
            let lookup: SharedLookup = Arc::new(TemplateFile::new(format!("{}.{}", page, suffix), &file.file)?);
            let mut templates = TemplateLookups::embedded();
            templates.prepend([lookup]);
            server.with_routes(path, single_page_router(templates, page))
        }
        RouteKind::TemplateDirectory(dir) => {
            let lookup = template_dir(&dir.local_directory, dev)?;
            if path.trim_matches('/').is_empty() {
                server.with_prepend_template_lookups([lookup])
            } else {
                let mut templates = TemplateLookups::embedded();
                templates.prepend([lookup]);
                server.with_routes(path, pages_router(templates))
            }
        }
    };
    Ok(server)
}
