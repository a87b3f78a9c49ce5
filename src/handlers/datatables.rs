//! HTML data tables
//!
//! With streaming on, the command runs in its own task and the page is sent
//! while rows arrive: the template is rendered once with
//! [`ROWS_MARKER`](crate::render::ROWS_MARKER) in place of the rows, the
//! part before the marker is sent, then one `<tr>` per row, then the rest.
//! Columns come from the first row. Without streaming all rows are
//! collected first and the columns are the union of every row's keys.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;
use serde_json::{Map, Value};

use super::writer::handle_writer_page;
use super::{
    collect_rows, download_links, finish, html_response, html_row_stream, log_command_error, spawn_rows,
    HandlerConfig, Link, RowStream,
};
use crate::commands::{Command, CommandDescription, CommandError, Metadata};
use crate::error::{ServeError, ServeResult};
use crate::layers::ParsedLayers;
use crate::middlewares::{output_override, SharedMiddleware};
use crate::processor::{columns_of, escape_html, html_row, Row};
use crate::render::{compute_layout, render_markdown_to_html, split_at_rows, Layout, ROWS_MARKER};

#[derive(Serialize)]
struct TablePage<'a> {
    command: &'a CommandDescription,
    long_description: String,
    layout: Layout,
    links: Vec<Link>,
    base_path: &'a str,
    additional_data: &'a Map<String, Value>,
    metadata: Option<Metadata>,
    columns: Vec<String>,
    rows: String,
    error: Option<String>,
}

struct PageParts<'a> {
    config: &'a HandlerConfig,
    description: &'a CommandDescription,
    layout: Layout,
    links: Vec<Link>,
    metadata: Option<Metadata>,
}

impl PageParts<'_> {
    fn render(self, columns: Vec<String>, rows: String, error: Option<String>) -> ServeResult<String> {
        let page = TablePage {
            command: self.description,
            long_description: render_markdown_to_html(&self.description.long),
            layout: self.layout,
            links: self.links,
            base_path: &self.config.base_path,
            additional_data: &self.config.additional_data,
            metadata: self.metadata,
            columns,
            rows,
            error,
        };
        let template = self.config.template_name.as_str();
        Ok(self
            .config
            .templates
            .render_required(&[template], &minijinja::Value::from_serialize(&page))?)
    }
}

/// The data table page of `command`. Writer commands get the writer page.
pub async fn handle_datatables(
    config: &HandlerConfig,
    command: &Command,
    query: &str,
    download_path: &str,
) -> ServeResult<Response> {
    if command.as_writer().is_some() {
        return handle_writer_page(config, command, query, download_path).await;
    }

    let description = command.description();
    let path = description.full_path();
    let Some(rows_command) = command.as_rows() else {
        return Err(ServeError::BadRequest(format!("command {} produces no output", path)));
    };

    let overrides: Vec<SharedMiddleware> = vec![Arc::new(output_override("table", "html"))];
    let parsed = match config.bind_query(command, query, false, overrides) {
        Ok(parsed) => parsed,
        Err(e) => {
            let parts = PageParts {
                config,
                description,
                layout: compute_layout(description, &ParsedLayers::new()),
                links: Vec::new(),
                metadata: None,
            };
            let html = parts.render(Vec::new(), String::new(), Some(e.to_string()))?;
            return Ok(html_response(StatusCode::BAD_REQUEST, html));
        }
    };

    let parts = PageParts {
        config,
        description,
        layout: compute_layout(description, &parsed),
        links: download_links(download_path, &description.name, query),
        metadata: command.metadata(&parsed).await?,
    };

    if !config.stream {
        let (rows, err) = collect_rows(rows_command, &parsed).await;
        if let Some(e) = &err {
            log_command_error(&path, e);
        }
        let columns = columns_of(&rows, false);
        let body: String = rows.iter().map(|row| html_row(&columns, row)).collect();
        let html = parts.render(columns, body, err.map(|e| e.to_string()))?;
        return Ok(html_response(StatusCode::OK, html));
    }

    let (mut rx, handle) = spawn_rows(rows_command.clone(), parsed);
    let Some(first) = rx.recv().await else {
        // finished without a single row
        let error = finish(handle).await.err();
        if let Some(e) = &error {
            log_command_error(&path, e);
        }
        let html = parts.render(Vec::new(), String::new(), error.map(|e| e.to_string()))?;
        return Ok(html_response(StatusCode::OK, html));
    };

    let columns = columns_of(std::slice::from_ref(&first), true);
    let template = config.template_name.clone();
    let rendered = parts.render(columns.clone(), ROWS_MARKER.to_string(), None)?;
    let (prefix, suffix) = split_at_rows(&template, rendered)?;

    let span = columns.len().max(1);
    let body = html_row_stream(
        RowStream {
            path,
            prefix,
            suffix,
            first: Some(first),
            rx,
            handle,
        },
        move |row: &Row| html_row(&columns, row),
        move |e: &CommandError| error_row(span, e),
    );
    Ok(html_response(StatusCode::OK, body))
}

fn error_row(span: usize, e: &CommandError) -> String {
    format!(
        "<tr class=\"error\"><td colspan=\"{}\">{}</td></tr>",
        span,
        escape_html(&e.to_string())
    )
}
