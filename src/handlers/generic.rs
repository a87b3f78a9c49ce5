//! # Generic Command Handler
//!
//! Mounts every handler for a single command or for a repository of
//! commands.
//!
//! Single command:
//!
//! ```text
//! GET  /data            json
//! GET  /text            text
//! GET  /stream          server-sent events
//! GET  /download/*file  download
//! GET  /form            form
//! GET  /form/submit     form results (POST takes a form body)
//! GET  /                data tables
//! ```
//!
//! Repository, `*path` being the command path:
//!
//! ```text
//! GET  /data/*path
//! GET  /text/*path
//! GET  /streaming/*path
//! GET  /datatables/*path         (a directory path lists its commands)
//! GET  /download/*path/<file>
//! GET  /form/*path
//! GET  /results/*path            (POST takes a form body)
//! GET  /                         command index
//! ```

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tracing::debug;

use super::datatables::handle_datatables;
use super::download::handle_download;
use super::form::{handle_form, handle_form_submit};
use super::json::handle_json;
use super::sse::handle_sse;
use super::text::handle_text;
use super::{html_response, HandlerConfig};
use crate::commands::{Command, CommandError, Repository};
use crate::error::{ServeError, ServeResult};
use crate::middlewares::{RequestValues, UpdateFromRequest};

#[derive(Clone)]
enum CommandSource {
    Single(Command),
    Repository(Arc<Repository>),
}

pub struct GenericCommandHandler {
    config: HandlerConfig,
    source: CommandSource,
}

type HandlerState = State<Arc<GenericCommandHandler>>;

#[derive(Debug, Serialize)]
struct IndexEntry {
    path: String,
    name: String,
    short: String,
}

impl GenericCommandHandler {
    pub fn for_command(command: Command, config: HandlerConfig) -> Self {
        Self {
            config,
            source: CommandSource::Single(command),
        }
    }

    pub fn for_repository(repository: Repository, config: HandlerConfig) -> Self {
        Self {
            config,
            source: CommandSource::Repository(Arc::new(repository)),
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Routes relative to the mount point
    pub fn router(self) -> Router {
        let single = matches!(self.source, CommandSource::Single(_));
        let state = Arc::new(self);

        if single {
            Router::new()
                .route("/data", get(single_data))
                .route("/text", get(single_text))
                .route("/stream", get(single_stream))
                .route("/download/*file", get(single_download))
                .route("/form", get(single_form))
                .route("/form/submit", get(single_submit).post(single_submit_form))
                .route("/", get(single_datatables))
                .with_state(state)
        } else {
            Router::new()
                .route("/data/*path", get(repository_data))
                .route("/text/*path", get(repository_text))
                .route("/streaming/*path", get(repository_stream))
                .route("/datatables/*path", get(repository_datatables))
                .route("/download/*path", get(repository_download))
                .route("/form/*path", get(repository_form))
                .route("/results/*path", get(repository_submit).post(repository_submit_form))
                .route("/", get(repository_index))
                .with_state(state)
        }
    }

    fn command(&self, path: &str) -> ServeResult<Command> {
        match &self.source {
            CommandSource::Single(command) => Ok(command.clone()),
            CommandSource::Repository(repository) => {
                let path = path.trim_matches('/');
                repository.find_command(path).cloned().map_err(|e| {
                    debug!(command = %path, base_path = %self.config.base_path, "could not find command");
                    e.into()
                })
            }
        }
    }

    /// Commands at or below `path`, rendered with the index template
    fn index(&self, path: &str) -> ServeResult<Response> {
        let CommandSource::Repository(repository) = &self.source else {
            return Err(ServeError::PageNotFound(path.to_string()));
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let commands: Vec<IndexEntry> = repository
            .collect_commands(&segments, true)
            .into_iter()
            .map(|c| {
                let d = c.description();
                IndexEntry {
                    path: d.full_path(),
                    name: d.name.clone(),
                    short: d.short.clone(),
                }
            })
            .collect();
        if commands.is_empty() && !segments.is_empty() {
            return Err(CommandError::NotFound(path.to_string()).into());
        }

        let ctx = minijinja::context! {
            commands => commands,
            path => path,
            base_path => self.config.base_path,
            additional_data => self.config.additional_data,
        };
        let template = self.config.index_template_name.as_str();
        let html = self.config.templates.render_required(&[template], &ctx)?;
        Ok(html_response(StatusCode::OK, html))
    }
}

fn query_str(query: &Option<String>) -> &str {
    query.as_deref().unwrap_or("")
}

// ==================
// Single command
// ==================

async fn single_data(State(h): HandlerState, RawQuery(query): RawQuery) -> ServeResult<Response> {
    handle_json(&h.config, &h.command("")?, query_str(&query)).await
}

async fn single_text(State(h): HandlerState, RawQuery(query): RawQuery) -> ServeResult<Response> {
    handle_text(&h.config, &h.command("")?, query_str(&query)).await
}

async fn single_stream(State(h): HandlerState, RawQuery(query): RawQuery) -> ServeResult<Response> {
    handle_sse(&h.config, &h.command("")?, query_str(&query)).await
}

async fn single_download(
    State(h): HandlerState,
    Path(file): Path<String>,
    RawQuery(query): RawQuery,
) -> ServeResult<Response> {
    handle_download(&h.config, &h.command("")?, &file, query_str(&query)).await
}

async fn single_form(State(h): HandlerState, RawQuery(query): RawQuery) -> ServeResult<Response> {
    let submit_path = format!("{}/form/submit", h.config.base_path);
    handle_form(&h.config, &h.command("")?, query_str(&query), &submit_path).await
}

async fn single_submit(State(h): HandlerState, RawQuery(query): RawQuery) -> ServeResult<Response> {
    let request = UpdateFromRequest::query(RequestValues::from_query_string(query_str(&query)));
    handle_form_submit(&h.config, &h.command("")?, request).await
}

async fn single_submit_form(State(h): HandlerState, body: Bytes) -> ServeResult<Response> {
    let request = UpdateFromRequest::form(RequestValues::from_form_body(&body));
    handle_form_submit(&h.config, &h.command("")?, request).await
}

async fn single_datatables(State(h): HandlerState, RawQuery(query): RawQuery) -> ServeResult<Response> {
    let download_path = format!("{}/download", h.config.base_path);
    handle_datatables(&h.config, &h.command("")?, query_str(&query), &download_path).await
}

// ==================
// Repository
// ==================

async fn repository_data(
    State(h): HandlerState,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> ServeResult<Response> {
    handle_json(&h.config, &h.command(&path)?, query_str(&query)).await
}

async fn repository_text(
    State(h): HandlerState,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> ServeResult<Response> {
    handle_text(&h.config, &h.command(&path)?, query_str(&query)).await
}

async fn repository_stream(
    State(h): HandlerState,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> ServeResult<Response> {
    handle_sse(&h.config, &h.command(&path)?, query_str(&query)).await
}

async fn repository_datatables(
    State(h): HandlerState,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> ServeResult<Response> {
    let command = match h.command(&path) {
        Ok(command) => command,
        Err(ServeError::Command(CommandError::Ambiguous { .. })) => return h.index(&path),
        Err(e) => return Err(e),
    };
    let path = path.trim_matches('/');
    let download_path = format!("{}/download/{}", h.config.base_path, path);
    handle_datatables(&h.config, &command, query_str(&query), &download_path).await
}

async fn repository_download(
    State(h): HandlerState,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> ServeResult<Response> {
    let path = path.trim_matches('/');
    let Some((command_path, file)) = path.rsplit_once('/').filter(|(_, file)| !file.is_empty()) else {
        return Err(ServeError::BadRequest("could not find file name".to_string()));
    };
    handle_download(&h.config, &h.command(command_path)?, file, query_str(&query)).await
}

async fn repository_form(
    State(h): HandlerState,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> ServeResult<Response> {
    let command = h.command(&path)?;
    let submit_path = format!("{}/results/{}", h.config.base_path, path.trim_matches('/'));
    handle_form(&h.config, &command, query_str(&query), &submit_path).await
}

async fn repository_submit(
    State(h): HandlerState,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> ServeResult<Response> {
    let request = UpdateFromRequest::query(RequestValues::from_query_string(query_str(&query)));
    handle_form_submit(&h.config, &h.command(&path)?, request).await
}

async fn repository_submit_form(
    State(h): HandlerState,
    Path(path): Path<String>,
    body: Bytes,
) -> ServeResult<Response> {
    let request = UpdateFromRequest::form(RequestValues::from_form_body(&body));
    handle_form_submit(&h.config, &h.command(&path)?, request).await
}

async fn repository_index(State(h): HandlerState) -> ServeResult<Response> {
    h.index("")
}
