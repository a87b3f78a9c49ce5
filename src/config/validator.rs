//! Configuration Validation
//!
//! Every problem in a server config is collected before anything is loaded,
//! so one run reports all of them.

use std::collections::HashSet;
use std::path::Path;

use super::{RouteConfig, RouteKind, ServerConfig};

/// Configuration validation errors
#[derive(Debug)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid configuration for '{}': {} (value: {})",
            self.field, self.message, self.value
        )
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of config validation
pub type ValidationResult<T> = Result<T, Vec<ConfigValidationError>>;

/// Configuration validator
pub struct ConfigValidator {
    errors: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn error(&mut self, field: &str, value: impl std::fmt::Display, message: &str) {
        self.errors.push(ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        });
    }

    /// Validate port number (1-65535)
    pub fn validate_port(&mut self, field: &str, port: u16) -> &mut Self {
        if port == 0 {
            self.error(field, port, "Port must be between 1 and 65535");
        }
        self
    }

    pub fn validate_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, value, "Value cannot be empty");
        }
        self
    }

    /// Route paths are absolute URL paths
    pub fn validate_url_path(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.trim().is_empty() && !value.starts_with('/') {
            self.error(field, value, "Path must start with /");
        }
        self
    }

    pub fn validate_path_exists(&mut self, field: &str, path: &Path) -> &mut Self {
        if !path.exists() {
            self.error(field, path.display(), "Path does not exist");
        }
        self
    }

    /// Validate path is directory
    pub fn validate_is_directory(&mut self, field: &str, path: &Path) -> &mut Self {
        if path.exists() && !path.is_dir() {
            self.error(field, path.display(), "Path is not a directory");
        }
        self
    }

    pub fn validate_is_file(&mut self, field: &str, path: &Path) -> &mut Self {
        if path.exists() && !path.is_file() {
            self.error(field, path.display(), "Path is not a file");
        }
        self
    }

    pub fn validate_directory(&mut self, field: &str, path: &Path) -> &mut Self {
        self.validate_path_exists(field, path).validate_is_directory(field, path)
    }

    pub fn validate_file(&mut self, field: &str, path: &Path) -> &mut Self {
        self.validate_path_exists(field, path).validate_is_file(field, path)
    }

    /// Exactly one of the named options is set
    pub fn validate_exactly_one(&mut self, field: &str, set: &[&str], allowed: &[&str]) -> &mut Self {
        match set.len() {
            1 => {}
            0 => self.error(field, "none", &format!("Exactly one of {} is required", allowed.join(", "))),
            _ => self.error(field, set.join(", "), "Only one route kind may be set"),
        }
        self
    }

    /// Finish validation and return result
    pub fn finish(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Format validation errors for display
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

// ==================
// Server config
// ==================

pub fn validate_config(config: &ServerConfig) -> ValidationResult<()> {
    let mut v = ConfigValidator::new();
    if let Some(port) = config.port {
        v.validate_port("port", port);
    }
    if let Some(address) = &config.address {
        v.validate_non_empty("address", address);
    }

    let mut seen = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        validate_route(&mut v, &field, route);
        if !seen.insert(route.path.trim_end_matches('/').to_string()) {
            v.error(&format!("{}.path", field), &route.path, "Path is used by another route");
        }
    }
    v.finish()
}

fn validate_route(v: &mut ConfigValidator, field: &str, route: &RouteConfig) {
    let path_field = format!("{}.path", field);
    v.validate_non_empty(&path_field, &route.path)
        .validate_url_path(&path_field, &route.path);

    v.validate_exactly_one(field, &route.kinds_set(), RouteKind::NAMES);
    let Ok(kind) = route.kind() else {
        return;
    };

    match kind {
        RouteKind::CommandDirectory(dir) => {
            let repo_field = format!("{}.commandDirectory.repositories", field);
            if dir.repositories.is_empty() {
                v.error(&repo_field, "[]", "At least one repository is required");
            }
            for repository in &dir.repositories {
                v.validate_directory(&repo_field, repository);
            }
            if let Some(templates) = &dir.options.template_directory {
                v.validate_directory(&format!("{}.commandDirectory.templateDirectory", field), templates);
            }
        }
        RouteKind::Command(command) => {
            v.validate_file(&format!("{}.command.file", field), &command.file);
            if let Some(templates) = &command.options.template_directory {
                v.validate_directory(&format!("{}.command.templateDirectory", field), templates);
            }
        }
        RouteKind::Static(dir) => {
            v.validate_directory(&format!("{}.static.localPath", field), &dir.local_path);
            if route.path.trim_end_matches('/').is_empty() {
                v.error(&path_field, &route.path, "Static directories cannot be served at /");
            }
        }
        RouteKind::TemplateFile(file) => {
            v.validate_file(&format!("{}.templateFile.file", field), &file.file);
        }
        RouteKind::TemplateDirectory(dir) => {
            v.validate_directory(&format!("{}.templateDirectory.localDirectory", field), &dir.local_directory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_validation() {
        let mut v = ConfigValidator::new();
        v.validate_port("port", 8080);
        assert!(v.finish().is_ok());

        let mut v = ConfigValidator::new();
        v.validate_port("port", 0);
        assert!(v.finish().is_err());
    }

    #[test]
    fn test_multiple_errors() {
        let mut v = ConfigValidator::new();
        v.validate_port("port", 0)
            .validate_non_empty("path", "")
            .validate_url_path("path", "users")
            .validate_exactly_one("routes[0]", &[], RouteKind::NAMES);

        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors[3].message.contains("commandDirectory"));
    }

    #[test]
    fn test_validate_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("users.yaml"), "name: users\n").unwrap();
        let root = dir.path().display();

        let config = ServerConfig::from_yaml_str(&format!(
            r#"
port: 0
routes:
  - path: /cmds
    commandDirectory:
      repositories: [{root}]
  - path: /users
    command:
      file: {root}/users.yaml
  - path: /
    static:
      localPath: {root}
  - path: users
    templateFile:
      file: {root}/missing.md
  - path: /two
    command:
      file: {root}/users.yaml
    templateDirectory:
      localDirectory: {root}
  - path: /cmds
    templateDirectory:
      localDirectory: {root}/users.yaml
"#
        ))
        .unwrap();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "port",
                "routes[2].path",
                "routes[3].path",
                "routes[3].templateFile.file",
                "routes[4]",
                "routes[5].templateDirectory.localDirectory",
                "routes[5].path",
            ]
        );
        assert!(format_validation_errors(&errors).contains("cannot be served at /"));
    }
}
