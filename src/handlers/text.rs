//! Plain text responses

use std::sync::Arc;

use axum::response::Response;

use super::{collect_rows, log_command_error, run_writer, text_response, HandlerConfig};
use crate::commands::Command;
use crate::error::{ServeError, ServeResult};
use crate::middlewares::{output_override, SharedMiddleware};
use crate::processor::{write_rows, OutputFormat};

/// Writer output as is, rows as an ASCII table
pub async fn handle_text(config: &HandlerConfig, command: &Command, query: &str) -> ServeResult<Response> {
    let overrides: Vec<SharedMiddleware> = vec![Arc::new(output_override("table", "ascii"))];
    let parsed = config.bind_query(command, query, false, overrides)?;
    let path = command.description().full_path();

    if let Some(writer) = command.as_writer() {
        return Ok(text_response(run_writer(writer, &parsed).await?));
    }
    let Some(rows_command) = command.as_rows() else {
        return Err(ServeError::BadRequest(format!("command {} produces no output", path)));
    };

    let (rows, err) = collect_rows(rows_command, &parsed).await;
    if let Some(e) = err {
        log_command_error(&path, &e);
        return Err(e.into());
    }

    let mut buf = Vec::new();
    write_rows(OutputFormat::Ascii, &rows, &mut buf)?;
    Ok(text_response(String::from_utf8_lossy(&buf).into_owned()))
}
