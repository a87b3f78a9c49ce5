//! Server-sent events
//!
//! Each row is sent as an `event: row` with the row as JSON data. A failing
//! command ends the stream with an `event: error` carrying the message.
//! Writer commands send their whole output as one `event: output`.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::{stream, StreamExt};

use super::{finish, log_command_error, run_writer, spawn_rows, HandlerConfig};
use crate::commands::Command;
use crate::error::{ServeError, ServeResult};
use crate::processor::Row;

pub async fn handle_sse(config: &HandlerConfig, command: &Command, query: &str) -> ServeResult<Response> {
    let parsed = config.bind_query(command, query, false, Vec::new())?;
    let path = command.description().full_path();

    if let Some(writer) = command.as_writer() {
        let event = match run_writer(writer, &parsed).await {
            Ok(output) => Event::default().event("output").data(output),
            Err(e) => {
                log_command_error(&path, &e);
                error_event(&e.to_string())
            }
        };
        let events = stream::once(async move { Ok::<_, Infallible>(event) });
        return Ok(Sse::new(events).into_response());
    }
    let Some(rows_command) = command.as_rows() else {
        return Err(ServeError::BadRequest(format!("command {} produces no output", path)));
    };

    let (rx, handle) = spawn_rows(rows_command.clone(), parsed);
    let events = stream::unfold(Some((rx, handle, path)), |state| async move {
        let (mut rx, handle, path) = state?;
        match rx.recv().await {
            Some(row) => Some((row_event(&row), Some((rx, handle, path)))),
            None => match finish(handle).await {
                Ok(()) => None,
                Err(e) => {
                    log_command_error(&path, &e);
                    Some((error_event(&e.to_string()), None))
                }
            },
        }
    })
    .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
}

fn row_event(row: &Row) -> Event {
    Event::default()
        .event("row")
        .json_data(row)
        .unwrap_or_else(|e| error_event(&e.to_string()))
}

fn error_event(message: &str) -> Event {
    Event::default().event("error").data(message)
}
