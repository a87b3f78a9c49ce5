//! tablegate - serve structured command output over HTTP
//!
//! Commands declare their parameters in layers. A request is bound onto
//! those layers through a chain of middlewares, the command runs, and its
//! rows or text are rendered as JSON, text, server-sent events, HTML tables,
//! downloads or HTMX forms.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod layers;
pub mod middlewares;
pub mod parameters;
pub mod processor;
pub mod render;
pub mod server;

pub use error::{ErrorResponse, ServeError, ServeResult};
pub use server::{Server, StaticPath};
