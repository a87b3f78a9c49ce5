//! # YAML Commands
//!
//! Two command kinds can be declared in YAML:
//!
//! ```yaml
//! name: users
//! short: List users
//! type: rows            # the default
//! flags:
//!   - name: role
//!     type: choice
//!     choices: [admin, user]
//!   - name: limit
//!     type: int
//! data-file: users.csv  # or inline `rows:`
//! ```
//!
//! ```yaml
//! name: greet
//! type: template
//! flags:
//!   - name: who
//!     type: string
//!     default: world
//! template: "Hello {{ who }}!"
//! ```
//!
//! A file carrying `alias-for` declares an alias instead.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::alias::AliasDefinition;
use super::{Command, CommandDescription, CommandError, RowCommand, WriterCommand};
use crate::layers::{ParameterLayer, ParsedLayers, DEFAULT_LAYER};
use crate::parameters::ParameterDefinition;
use crate::processor::{cell_text, Row, RowSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CommandKind {
    #[default]
    Rows,
    Template,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CommandFile {
    name: String,
    #[serde(default)]
    short: String,
    #[serde(default)]
    long: String,
    #[serde(default, rename = "type")]
    kind: CommandKind,
    #[serde(default)]
    flags: Vec<ParameterDefinition>,
    #[serde(default)]
    arguments: Vec<ParameterDefinition>,
    #[serde(default)]
    layers: Vec<ParameterLayer>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    data_file: Option<String>,
    #[serde(default)]
    template: Option<String>,
}

/// Result of loading one YAML file
#[derive(Debug)]
pub enum LoadedCommand {
    Command(Command),
    /// Resolved against the repository once all commands are known
    Alias(AliasDefinition),
}

/// Load a command or alias from `path`. Data files are resolved relative to
/// the YAML file.
pub fn load_command_file(path: &Path, parents: Vec<String>) -> Result<LoadedCommand, CommandError> {
    let source = std::fs::read_to_string(path)?;
    load_command_str(&source, path.parent(), parents, &path.display().to_string())
}

pub fn load_command_str(
    source: &str,
    base_dir: Option<&Path>,
    parents: Vec<String>,
    origin: &str,
) -> Result<LoadedCommand, CommandError> {
    let invalid = |reason: String| CommandError::InvalidDefinition {
        path: origin.to_string(),
        reason,
    };

    let document: serde_yaml::Value = serde_yaml::from_str(source).map_err(|e| invalid(e.to_string()))?;
    if document.get("alias-for").is_some() {
        let alias: AliasDefinition = serde_yaml::from_value(document).map_err(|e| invalid(e.to_string()))?;
        return Ok(LoadedCommand::Alias(alias));
    }

    let file: CommandFile = serde_yaml::from_value(document).map_err(|e| invalid(e.to_string()))?;
    let description = CommandDescription::builder(&file.name)
        .short(file.short)
        .long(file.long)
        .parents(parents)
        .flags(file.flags)
        .arguments(file.arguments);
    let description = file
        .layers
        .into_iter()
        .fold(description, |d, layer| d.layer(layer))
        .build();

    match file.kind {
        CommandKind::Rows => {
            let mut rows = file.rows;
            if let Some(data_file) = &file.data_file {
                let path = match base_dir {
                    Some(dir) => dir.join(data_file),
                    None => Path::new(data_file).to_path_buf(),
                };
                rows.extend(load_data_file(&path).map_err(invalid)?);
            }
            Ok(LoadedCommand::Command(Command::Rows(Arc::new(YamlRowsCommand {
                description,
                rows,
            }))))
        }
        CommandKind::Template => {
            let template = file
                .template
                .ok_or_else(|| invalid("template commands need a `template`".to_string()))?;
            minijinja::Environment::new()
                .template_from_str(&template)
                .map_err(|e| invalid(e.to_string()))?;
            Ok(LoadedCommand::Command(Command::Writer(Arc::new(
                YamlTemplateCommand {
                    description,
                    template,
                },
            ))))
        }
    }
}

fn load_data_file(path: &Path) -> Result<Vec<Row>, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => read_csv(&content).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(&content).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        other => Err(format!("unsupported data file type '{}'", other)),
    }
}

fn read_csv(content: &str) -> Result<Vec<Row>, csv::Error> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), csv_cell(v)))
                .collect(),
        );
    }
    Ok(rows)
}

fn csv_cell(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

/// Rows declared inline or read from a data file
pub struct YamlRowsCommand {
    description: CommandDescription,
    rows: Vec<Row>,
}

impl YamlRowsCommand {
    /// Parameter values that filter rows: set, non-empty, and named like a column
    fn row_filters(&self, parsed: &ParsedLayers) -> Vec<(String, Value)> {
        let Some(layer) = parsed.get(DEFAULT_LAYER) else {
            return Vec::new();
        };
        layer
            .parameters
            .iter()
            .filter(|(name, _)| name.as_str() != "limit")
            .filter(|(name, _)| self.rows.iter().any(|r| r.contains_key(name.as_str())))
            .filter(|(_, p)| match &p.value {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                Value::Array(items) => !items.is_empty(),
                _ => true,
            })
            .map(|(name, p)| (name.clone(), p.value.clone()))
            .collect()
    }
}

fn matches(row: &Row, column: &str, expected: &Value) -> bool {
    let actual = cell_text(row.get(column));
    match expected {
        Value::Array(items) => items.iter().any(|i| cell_text(Some(i)) == actual),
        other => cell_text(Some(other)) == actual,
    }
}

#[async_trait]
impl RowCommand for YamlRowsCommand {
    fn description(&self) -> &CommandDescription {
        &self.description
    }

    async fn run_into_sink(&self, parsed: &ParsedLayers, sink: &mut dyn RowSink) -> Result<(), CommandError> {
        let filters = self.row_filters(parsed);
        let limit = parsed
            .get_value(DEFAULT_LAYER, "limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(usize::MAX);

        let selected = self
            .rows
            .iter()
            .filter(|row| filters.iter().all(|(column, value)| matches(row, column, value)))
            .take(limit);
        for row in selected {
            sink.add_row(row.clone()).await?;
        }
        Ok(())
    }
}

/// Text rendered from a template over the parameter values
pub struct YamlTemplateCommand {
    description: CommandDescription,
    template: String,
}

#[async_trait]
impl WriterCommand for YamlTemplateCommand {
    fn description(&self) -> &CommandDescription {
        &self.description
    }

    async fn run_into_writer(
        &self,
        parsed: &ParsedLayers,
        writer: &mut (dyn Write + Send),
    ) -> Result<(), CommandError> {
        let ctx = Value::Object(parsed.all_values());
        let text = minijinja::Environment::new()
            .render_str(&self.template, ctx)
            .map_err(|e| CommandError::Execution(e.to_string()))?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::CollectingSink;
    use crate::parameters::{ParameterType, ParsedParameters};
    use serde_json::json;

    fn load(source: &str) -> Command {
        match load_command_str(source, None, vec![], "test.yaml").unwrap() {
            LoadedCommand::Command(c) => c,
            LoadedCommand::Alias(_) => panic!("expected a command"),
        }
    }

    fn parsed(values: &[(&str, ParameterType, Value)]) -> ParsedLayers {
        let mut parsed = ParsedLayers::new();
        let params: &mut ParsedParameters = &mut parsed.get_or_create(DEFAULT_LAYER).parameters;
        for (name, ty, value) in values {
            params.set(&ParameterDefinition::new(*name, *ty), value.clone(), "test");
        }
        parsed
    }

    const USERS: &str = r#"
name: users
short: List users
flags:
  - name: role
    type: choice
    choices: [admin, user]
  - name: limit
    type: int
rows:
  - {name: alice, role: admin}
  - {name: bob, role: user}
  - {name: carol, role: admin}
"#;

    #[tokio::test]
    async fn test_rows_filter_and_limit() {
        let command = load(USERS);
        let rows_command = command.as_rows().unwrap();

        let mut sink = CollectingSink::default();
        rows_command
            .run_into_sink(&parsed(&[("role", ParameterType::Choice, json!("admin"))]), &mut sink)
            .await
            .unwrap();
        let names: Vec<_> = sink.rows().iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("alice"), json!("carol")]);

        let mut sink = CollectingSink::default();
        rows_command
            .run_into_sink(&parsed(&[("limit", ParameterType::Integer, json!(1))]), &mut sink)
            .await
            .unwrap();
        assert_eq!(sink.rows().len(), 1);
    }

    #[test]
    fn test_description_from_yaml() {
        let command = load(USERS);
        let description = command.description();
        assert_eq!(description.short, "List users");
        assert_eq!(description.flags().len(), 2);
        assert!(description.layers.get("output").is_some());
    }

    #[tokio::test]
    async fn test_template_command() {
        let command = load(
            "name: greet\ntype: template\nflags:\n  - name: who\n    type: string\ntemplate: \"Hello {{ who }}!\"\n",
        );
        let writer = command.as_writer().unwrap();
        let mut out = Vec::new();
        writer
            .run_into_writer(&parsed(&[("who", ParameterType::String, json!("crab"))]), &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hello crab!");
    }

    #[test]
    fn test_invalid_definitions() {
        let err = load_command_str("name: t\ntype: template\n", None, vec![], "t.yaml").unwrap_err();
        assert!(matches!(err, CommandError::InvalidDefinition { .. }));

        let err = load_command_str("name: t\ntype: template\ntemplate: \"{% if %}\"\n", None, vec![], "t.yaml")
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidDefinition { .. }));

        let err = load_command_str("flags: 3\n", None, vec![], "t.yaml").unwrap_err();
        assert!(err.to_string().starts_with("invalid command definition in t.yaml"));
    }

    #[test]
    fn test_alias_file() {
        let loaded = load_command_str(
            "name: admins\nalias-for: users\nflags:\n  role: admin\n",
            None,
            vec![],
            "admins.yaml",
        )
        .unwrap();
        match loaded {
            LoadedCommand::Alias(alias) => {
                assert_eq!(alias.alias_for, "users");
                assert_eq!(alias.flags.get("role").map(String::as_str), Some("admin"));
            }
            LoadedCommand::Command(_) => panic!("expected an alias"),
        }
    }

    #[test]
    fn test_csv_data_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.csv"), "id,name,score\n1,alice,9.5\n2,bob,n/a\n").unwrap();
        std::fs::write(dir.path().join("scores.yaml"), "name: scores\ndata-file: data.csv\n").unwrap();

        let loaded = load_command_file(&dir.path().join("scores.yaml"), vec![]).unwrap();
        let LoadedCommand::Command(Command::Rows(_)) = &loaded else {
            panic!("expected rows command");
        };
        assert_eq!(csv_cell("1"), json!(1));
        assert_eq!(csv_cell("9.5"), json!(9.5));
        assert_eq!(csv_cell("n/a"), json!("n/a"));
    }
}
