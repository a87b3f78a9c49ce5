//! File downloads
//!
//! The suffix of the requested file name picks the output format. Rows are
//! written to a temporary file through the `output-file` setting and served
//! as an attachment. Writer output is served as is.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::{collect_rows, log_command_error, run_writer, HandlerConfig};
use crate::commands::Command;
use crate::error::{ServeError, ServeResult};
use crate::layers::{OutputSettings, OUTPUT_LAYER};
use crate::middlewares::{LayerValues, SharedMiddleware, UpdateFromMap};
use crate::processor::{write_rows, OutputFormat, Row};

pub async fn handle_download(
    config: &HandlerConfig,
    command: &Command,
    file_name: &str,
    query: &str,
) -> ServeResult<Response> {
    let base_name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ServeError::BadRequest("could not find file name".to_string()))?
        .to_string();
    let path = command.description().full_path();

    if let Some(writer) = command.as_writer() {
        let parsed = config.bind_query(command, query, false, Vec::new())?;
        let output = run_writer(writer, &parsed).await?;
        let content_type = OutputFormat::from_file_name(&base_name)
            .map(|f| f.content_type())
            .unwrap_or("text/plain; charset=utf-8");
        return Ok(attachment(&base_name, content_type, output.into_bytes()));
    }
    let Some(rows_command) = command.as_rows() else {
        return Err(ServeError::BadRequest(format!("command {} produces no output", path)));
    };

    let format = OutputFormat::from_file_name(&base_name)?;
    let dir = tempfile::tempdir()?;
    let target = dir.path().join(&base_name);

    let overrides: Vec<SharedMiddleware> = vec![Arc::new(UpdateFromMap::with_source(
        output_file_values(format, &target),
        "handler",
    ))];
    let parsed = config.bind_query(command, query, false, overrides)?;
    let settings = OutputSettings::from_parsed(&parsed);

    let (rows, err) = collect_rows(rows_command, &parsed).await;
    if let Some(e) = err {
        log_command_error(&path, &e);
        return Err(e.into());
    }

    let output_format = OutputFormat::from_settings(&settings)?;
    let output_file = settings.output_file.as_deref().map(PathBuf::from).unwrap_or(target);
    let bytes = tokio::task::spawn_blocking(move || write_file(&output_file, output_format, &rows))
        .await
        .map_err(std::io::Error::other)??;
    debug!(command = %path, file = %base_name, bytes = bytes.len(), "serving download");

    Ok(attachment(&base_name, format.content_type(), bytes))
}

/// Write `rows` to `path` and read the file back
fn write_file(path: &Path, format: OutputFormat, rows: &[Row]) -> ServeResult<Vec<u8>> {
    {
        let mut writer = BufWriter::new(File::create(path)?);
        write_rows(format, rows, &mut writer)?;
        writer.flush()?;
    }
    Ok(std::fs::read(path)?)
}

/// Output layer values selecting `format` and writing to `target`
fn output_file_values(format: OutputFormat, target: &Path) -> LayerValues {
    let (output, table_format) = format.settings();
    let mut settings = IndexMap::new();
    settings.insert("output".to_string(), Value::from(output));
    if !table_format.is_empty() {
        settings.insert("table-format".to_string(), Value::from(table_format));
    }
    settings.insert(
        "output-file".to_string(),
        Value::from(target.to_string_lossy().into_owned()),
    );

    let mut values = LayerValues::new();
    values.insert(OUTPUT_LAYER.to_string(), settings);
    values
}

fn attachment(file_name: &str, content_type: &'static str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_file_values() {
        let values = output_file_values(OutputFormat::Csv, Path::new("/tmp/out.csv"));
        let output = values.get(OUTPUT_LAYER).unwrap();
        assert_eq!(output.get("output"), Some(&json!("table")));
        assert_eq!(output.get("table-format"), Some(&json!("csv")));
        assert_eq!(output.get("output-file"), Some(&json!("/tmp/out.csv")));
    }

    #[tokio::test]
    async fn test_write_file_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.tsv");
        let rows: Vec<Row> = vec![[("name".to_string(), json!("alice"))].into_iter().collect()];

        let bytes = tokio::task::spawn_blocking(move || write_file(&path, OutputFormat::Tsv, &rows))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"name\nalice\n");
    }
}
