//! HTMX form and results
//!
//! The form page shows the command's layout with whatever the query already
//! sets, missing required values are fine there. Submitting loads the
//! results fragment, which streams one JSON block per row into
//! `results.tmpl.html`.

use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{finish, html_response, html_row_stream, log_command_error, run_writer, spawn_rows, HandlerConfig, RowStream};
use crate::commands::{Command, CommandDescription, CommandError, Metadata};
use crate::error::{ServeError, ServeResult};
use crate::layers::ParsedLayers;
use crate::middlewares::UpdateFromRequest;
use crate::processor::{escape_html, Row};
use crate::render::{compute_layout, render_markdown_to_html, split_at_rows, Layout, ROWS_MARKER};

pub const FORM_TEMPLATE: &str = "form.tmpl.html";
pub const RESULTS_TEMPLATE: &str = "results.tmpl.html";

#[derive(Serialize)]
struct FormPage<'a> {
    command: &'a CommandDescription,
    long_description: String,
    layout: Layout,
    base_path: &'a str,
    submit_path: &'a str,
    additional_data: &'a Map<String, Value>,
    metadata: Option<Metadata>,
    error: Option<String>,
}

#[derive(Serialize)]
struct ResultsPage<'a> {
    command: &'a CommandDescription,
    rows: String,
    error: Option<String>,
}

pub async fn handle_form(
    config: &HandlerConfig,
    command: &Command,
    query: &str,
    submit_path: &str,
) -> ServeResult<Response> {
    let description = command.description();
    let (parsed, status, error) = match config.bind_query(command, query, true, Vec::new()) {
        Ok(parsed) => (parsed, StatusCode::OK, None),
        Err(e) => (ParsedLayers::new(), StatusCode::BAD_REQUEST, Some(e.to_string())),
    };

    let page = FormPage {
        command: description,
        long_description: render_markdown_to_html(&description.long),
        layout: compute_layout(description, &parsed),
        base_path: &config.base_path,
        submit_path,
        additional_data: &config.additional_data,
        metadata: command.metadata(&parsed).await?,
        error,
    };
    let html = config
        .templates
        .render_required(&[FORM_TEMPLATE], &minijinja::Value::from_serialize(&page))?;
    Ok(html_response(status, html))
}

/// The results fragment. Errors are rendered into the fragment with status
/// 200 so HTMX swaps them in.
pub async fn handle_form_submit(
    config: &HandlerConfig,
    command: &Command,
    request: UpdateFromRequest,
) -> ServeResult<Response> {
    let description = command.description();
    let path = description.full_path();
    let render = |rows: String, error: Option<String>| -> ServeResult<String> {
        let page = ResultsPage {
            command: description,
            rows,
            error,
        };
        Ok(config
            .templates
            .render_required(&[RESULTS_TEMPLATE], &minijinja::Value::from_serialize(&page))?)
    };

    let parsed = match config.bind(command, request, false, Vec::new()) {
        Ok(parsed) => parsed,
        Err(e) => return Ok(html_response(StatusCode::OK, render(String::new(), Some(e.to_string()))?)),
    };

    if let Some(writer) = command.as_writer() {
        let html = match run_writer(writer, &parsed).await {
            Ok(output) => render(format!("<pre>{}</pre>", escape_html(&output)), None)?,
            Err(e) => {
                log_command_error(&path, &e);
                render(String::new(), Some(e.to_string()))?
            }
        };
        return Ok(html_response(StatusCode::OK, html));
    }
    let Some(rows_command) = command.as_rows() else {
        return Err(ServeError::BadRequest(format!("command {} produces no output", path)));
    };

    let (mut rx, handle) = spawn_rows(rows_command.clone(), parsed);
    let Some(first) = rx.recv().await else {
        let error = finish(handle).await.err();
        if let Some(e) = &error {
            log_command_error(&path, e);
        }
        return Ok(html_response(StatusCode::OK, render(String::new(), error.map(|e| e.to_string()))?));
    };

    let (prefix, suffix) = split_at_rows(RESULTS_TEMPLATE, render(ROWS_MARKER.to_string(), None)?)?;
    let body = html_row_stream(
        RowStream {
            path,
            prefix,
            suffix,
            first: Some(first),
            rx,
            handle,
        },
        json_block,
        |e: &CommandError| format!("<div class=\"error\">{}</div>", escape_html(&e.to_string())),
    );
    Ok(html_response(StatusCode::OK, body))
}

fn json_block(row: &Row) -> String {
    let json = serde_json::to_string_pretty(row).unwrap_or_default();
    format!("<pre>{}</pre>", escape_html(&json))
}
