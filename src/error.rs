//! HTTP-facing errors
//!
//! Every handler returns [`ServeError`]. It carries an explicit status code
//! and a stable machine-readable code, and renders as
//! `{ "error": ..., "code": ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::commands::CommandError;
use crate::parameters::ParameterError;
use crate::processor::ProcessorError;
use crate::render::RenderError;

pub type ServeResult<T> = Result<T, ServeError>;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::PageNotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Parameter(_) | Self::Command(CommandError::Parameter(_)) => "INVALID_PARAMETER",
            Self::Command(CommandError::NotFound(_)) => "COMMAND_NOT_FOUND",
            Self::Command(CommandError::Ambiguous { .. }) => "AMBIGUOUS_COMMAND",
            Self::Command(_) => "COMMAND_FAILED",
            Self::Render(RenderError::NotFound(_)) => "TEMPLATE_NOT_FOUND",
            Self::Render(_) => "RENDER_ERROR",
            Self::Processor(ProcessorError::UnknownFormat(_)) => "UNKNOWN_FORMAT",
            Self::Processor(_) => "OUTPUT_ERROR",
            Self::Io(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PageNotFound(_)
            | Self::Command(CommandError::NotFound(_))
            | Self::Command(CommandError::Ambiguous { .. }) => StatusCode::NOT_FOUND,
            Self::BadRequest(_)
            | Self::Parameter(_)
            | Self::Command(CommandError::Parameter(_))
            | Self::Processor(ProcessorError::UnknownFormat(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Parameter errors, whether raised directly or while running a command
    pub fn as_parameter_error(&self) -> Option<&ParameterError> {
        match self {
            Self::Parameter(e) | Self::Command(CommandError::Parameter(e)) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
        } else {
            warn!(error = %self, code = self.code(), "request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
