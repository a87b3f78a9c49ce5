//! # HTTP Handlers
//!
//! Each handler binds request values onto a command's parameter layers, runs
//! the command and adapts its output to one response shape:
//!
//! - `json`: rows as a JSON array (or another format on request)
//! - `text`: plain text, rows as an ASCII table
//! - `sse`: rows as server-sent events
//! - `datatables`: an HTML table streamed row by row
//! - `download`: a file attachment whose suffix picks the format
//! - `form`: an HTMX form and its results fragment
//! - `writer`: an HTML page around a writer command's output
//!
//! [`GenericCommandHandler`] mounts all of them for one command or a whole
//! repository.

pub mod datatables;
pub mod download;
pub mod form;
pub mod generic;
pub mod json;
pub mod pages;
pub mod sse;
pub mod text;
pub mod writer;

pub use generic::GenericCommandHandler;

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Local;
use futures_util::{future, stream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::commands::{Command, CommandError, RowCommand, WriterCommand};
use crate::layers::{OutputSettings, ParsedLayers};
use crate::middlewares::{
    execute_middlewares, EnforceRequired, ParameterFilter, RequestValues, SetFromDefaults, SharedMiddleware,
    UpdateFromRequest,
};
use crate::parameters::ParameterResult;
use crate::processor::{ChannelSink, CollectingSink, Row, RowFilter};
use crate::render::TemplateLookups;

/// Extensions offered as download links on HTML pages
pub const DOWNLOAD_EXTENSIONS: &[&str] = &["csv", "json", "md", "html", "txt", "yaml"];

/// Settings shared by every handler mounted for a route
#[derive(Clone)]
pub struct HandlerConfig {
    pub filter: ParameterFilter,
    pub templates: TemplateLookups,
    /// URL prefix the handlers are mounted under, without trailing slash
    pub base_path: String,
    /// Stream HTML rows as they are produced. Columns then come from the
    /// first row only.
    pub stream: bool,
    /// Passed to every template as `additional_data`
    pub additional_data: Map<String, Value>,
    pub template_name: String,
    pub index_template_name: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            filter: ParameterFilter::default(),
            templates: TemplateLookups::embedded(),
            base_path: String::new(),
            stream: true,
            additional_data: Map::new(),
            template_name: "data-tables.tmpl.html".to_string(),
            index_template_name: "commands.tmpl.html".to_string(),
        }
    }
}

impl HandlerConfig {
    pub fn with_filter(mut self, filter: ParameterFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_templates(mut self, templates: TemplateLookups) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = base_path.trim_end_matches('/').to_string();
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Merge `data` into the additional data, replacing existing keys only
    /// when `replace` is set
    pub fn with_additional_data(mut self, data: Map<String, Value>, replace: bool) -> Self {
        for (k, v) in data {
            if replace || !self.additional_data.contains_key(&k) {
                self.additional_data.insert(k, v);
            }
        }
        self
    }

    pub fn with_template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = name.into();
        self
    }

    pub fn with_index_template_name(mut self, name: impl Into<String>) -> Self {
        self.index_template_name = name.into();
        self
    }

    /// Run the parameter chain for `command`.
    ///
    /// `overrides` sit right below the required check and win over
    /// everything else.
    pub fn bind(
        &self,
        command: &Command,
        request: UpdateFromRequest,
        ignore_required: bool,
        overrides: Vec<SharedMiddleware>,
    ) -> ParameterResult<ParsedLayers> {
        let mut chain: Vec<SharedMiddleware> = Vec::new();
        if !ignore_required {
            chain.push(Arc::new(EnforceRequired));
        }
        chain.extend(overrides);
        chain.push(Arc::new(SetFromDefaults));
        chain.extend(self.filter.middlewares());
        chain.push(Arc::new(request.with_alias_defaults(command.alias_defaults())));

        let mut parsed = ParsedLayers::new();
        execute_middlewares(&command.description().layers, &mut parsed, &chain)?;
        Ok(parsed)
    }

    pub fn bind_query(
        &self,
        command: &Command,
        query: &str,
        ignore_required: bool,
        overrides: Vec<SharedMiddleware>,
    ) -> ParameterResult<ParsedLayers> {
        let request = UpdateFromRequest::query(RequestValues::from_query_string(query));
        self.bind(command, request, ignore_required, overrides)
    }
}

// ==================
// Running commands
// ==================

fn row_filter(parsed: &ParsedLayers) -> RowFilter {
    RowFilter::from_settings(&OutputSettings::from_parsed(parsed))
}

/// Run a row command in its own task, rows arrive on the returned channel.
/// Dropping the receiver makes the next `add_row` fail, which stops the
/// command.
pub(crate) fn spawn_rows(
    command: Arc<dyn RowCommand>,
    parsed: ParsedLayers,
) -> (mpsc::Receiver<Row>, JoinHandle<Result<(), CommandError>>) {
    let (mut sink, rx) = ChannelSink::channel(row_filter(&parsed));
    let handle = tokio::spawn(async move { command.run_into_sink(&parsed, &mut sink).await });
    (rx, handle)
}

pub(crate) async fn finish(handle: JoinHandle<Result<(), CommandError>>) -> Result<(), CommandError> {
    handle
        .await
        .map_err(|e| CommandError::Execution(format!("command task failed: {}", e)))?
}

/// Rows produced before the command stopped, and the error that stopped it
pub(crate) async fn collect_rows(
    command: &Arc<dyn RowCommand>,
    parsed: &ParsedLayers,
) -> (Vec<Row>, Option<CommandError>) {
    let mut sink = CollectingSink::new(row_filter(parsed));
    let result = command.run_into_sink(parsed, &mut sink).await;
    (sink.into_rows(), result.err())
}

pub(crate) async fn run_writer(
    command: &Arc<dyn WriterCommand>,
    parsed: &ParsedLayers,
) -> Result<String, CommandError> {
    let mut buf: Vec<u8> = Vec::new();
    command.run_into_writer(parsed, &mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Client disconnects surface as a closed sink and are not worth an error
pub(crate) fn log_command_error(path: &str, e: &CommandError) {
    match e {
        CommandError::SinkClosed => debug!(command = %path, "client went away, command stopped"),
        other => error!(command = %path, error = %other, "command failed"),
    }
}

// ==================
// Streaming HTML
// ==================

/// A template split around its rows, plus the running command feeding it
pub(crate) struct RowStream {
    pub path: String,
    pub prefix: String,
    pub suffix: String,
    pub first: Option<Row>,
    pub rx: mpsc::Receiver<Row>,
    pub handle: JoinHandle<Result<(), CommandError>>,
}

/// Body that sends the prefix, each row as it arrives, an error block if
/// the command failed, and the suffix
pub(crate) fn html_row_stream<R, E>(page: RowStream, render_row: R, render_error: E) -> Body
where
    R: Fn(&Row) -> String + Send + Sync + 'static,
    E: FnOnce(&CommandError) -> String + Send + 'static,
{
    let RowStream {
        path,
        prefix,
        suffix,
        first,
        rx,
        handle,
    } = page;
    let render_row = Arc::new(render_row);

    let head = stream::iter(std::iter::once(prefix).chain(first.map(|row| render_row(&row))));
    let rows = stream::unfold((rx, render_row), |(mut rx, render_row)| async move {
        let row = rx.recv().await?;
        let html = render_row(&row);
        Some((html, (rx, render_row)))
    });
    let tail = stream::once(async move {
        match finish(handle).await {
            Ok(()) => String::new(),
            Err(e) => {
                log_command_error(&path, &e);
                render_error(&e)
            }
        }
    });

    let body = head
        .chain(rows)
        .chain(tail)
        .chain(stream::once(future::ready(suffix)))
        .map(Ok::<_, Infallible>);
    Body::from_stream(body)
}

pub(crate) fn html_response(status: StatusCode, body: impl Into<Body>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

pub(crate) fn text_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

// ==================
// Download links
// ==================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub href: String,
    pub text: String,
    pub class: String,
}

/// One link per [`DOWNLOAD_EXTENSIONS`] entry, named
/// `<date>--<time>-<command>.<ext>` and carrying the current query
pub(crate) fn download_links(download_path: &str, command_name: &str, query: &str) -> Vec<Link> {
    let stamp = Local::now().format("%Y-%m-%d--%H-%M-%S");
    DOWNLOAD_EXTENSIONS
        .iter()
        .map(|ext| {
            let file = format!("{}-{}.{}", stamp, command_name, ext);
            let href = if query.is_empty() {
                format!("{}/{}", download_path, file)
            } else {
                format!("{}/{}?{}", download_path, file, query)
            };
            Link {
                href,
                text: ext.to_uppercase(),
                class: "download".to_string(),
            }
        })
        .collect()
}
