//! HTML page around a writer command's output

use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{download_links, html_response, log_command_error, run_writer, HandlerConfig, Link};
use crate::commands::{Command, CommandDescription, Metadata};
use crate::error::{ServeError, ServeResult};
use crate::layers::ParsedLayers;
use crate::render::{compute_layout, render_markdown_to_html, Layout};

pub const WRITER_TEMPLATE: &str = "writer.tmpl.html";

#[derive(Serialize)]
struct WriterPage<'a> {
    command: &'a CommandDescription,
    long_description: String,
    layout: Layout,
    links: Vec<Link>,
    base_path: &'a str,
    additional_data: &'a Map<String, Value>,
    metadata: Option<Metadata>,
    output: String,
    error: Option<String>,
}

/// Render `writer.tmpl.html` with the command's description, layout,
/// metadata and output. Parameter errors render the page with status 400.
pub async fn handle_writer_page(
    config: &HandlerConfig,
    command: &Command,
    query: &str,
    download_path: &str,
) -> ServeResult<Response> {
    let description = command.description();
    let path = description.full_path();
    let Some(writer) = command.as_writer() else {
        return Err(ServeError::BadRequest(format!("command {} is not a writer command", path)));
    };

    let (parsed, status, mut error) = match config.bind_query(command, query, false, Vec::new()) {
        Ok(parsed) => (Some(parsed), StatusCode::OK, None),
        Err(e) => (None, StatusCode::BAD_REQUEST, Some(e.to_string())),
    };

    let mut output = String::new();
    let mut metadata = None;
    if let Some(parsed) = &parsed {
        metadata = command.metadata(parsed).await?;
        match run_writer(writer, parsed).await {
            Ok(out) => output = out,
            Err(e) => {
                log_command_error(&path, &e);
                error = Some(e.to_string());
            }
        }
    }

    let empty = ParsedLayers::new();
    let page = WriterPage {
        command: description,
        long_description: render_markdown_to_html(&description.long),
        layout: compute_layout(description, parsed.as_ref().unwrap_or(&empty)),
        links: download_links(download_path, &description.name, query),
        base_path: &config.base_path,
        additional_data: &config.additional_data,
        metadata,
        output,
        error,
    };
    let html = config
        .templates
        .render_required(&[WRITER_TEMPLATE], &minijinja::Value::from_serialize(&page))?;
    Ok(html_response(status, html))
}
