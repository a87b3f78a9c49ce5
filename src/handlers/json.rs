//! JSON (or any other output format) responses

use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::{collect_rows, log_command_error, run_writer, text_response, HandlerConfig};
use crate::commands::Command;
use crate::error::{ServeError, ServeResult};
use crate::layers::{OutputSettings, ParsedLayers, OUTPUT_LAYER};
use crate::processor::{write_rows, OutputFormat};

/// Rows as a JSON array, unless the request picked another output format.
/// Writer commands answer with their text.
pub async fn handle_json(config: &HandlerConfig, command: &Command, query: &str) -> ServeResult<Response> {
    let parsed = config.bind_query(command, query, false, Vec::new())?;
    let path = command.description().full_path();

    if let Some(writer) = command.as_writer() {
        return Ok(text_response(run_writer(writer, &parsed).await?));
    }
    let Some(rows_command) = command.as_rows() else {
        return Err(ServeError::BadRequest(format!("command {} produces no output", path)));
    };

    let format = if output_requested(&parsed) {
        OutputFormat::from_settings(&OutputSettings::from_parsed(&parsed))?
    } else {
        OutputFormat::Json
    };

    let (rows, err) = collect_rows(rows_command, &parsed).await;
    if let Some(e) = err {
        log_command_error(&path, &e);
        return Err(e.into());
    }

    let mut buf = Vec::new();
    write_rows(format, &rows, &mut buf)?;
    Ok(([(header::CONTENT_TYPE, format.content_type())], buf).into_response())
}

/// Whether `output` was set by anything but its definition default
fn output_requested(parsed: &ParsedLayers) -> bool {
    parsed
        .get(OUTPUT_LAYER)
        .and_then(|l| l.parameters.get("output"))
        .and_then(|p| p.source())
        .is_some_and(|source| source != "defaults")
}
