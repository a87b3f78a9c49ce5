//! Markdown and HTML pages
//!
//! `name.tmpl.md` and `name.md` are rendered as templates, converted to HTML
//! and wrapped in `base.tmpl.html`. Otherwise `name.tmpl.html` or
//! `name.html` is rendered as is.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use minijinja::context;

use super::html_response;
use crate::error::{ServeError, ServeResult};
use crate::render::{render_markdown_to_html, TemplateLookup, TemplateLookups};

pub const BASE_TEMPLATE: &str = "base.tmpl.html";
pub const INDEX_PAGE: &str = "index";

pub fn render_page(templates: &TemplateLookups, page: &str) -> ServeResult<String> {
    let ctx = context! { page => page };

    let markdown_names = [format!("{}.tmpl.md", page), format!("{}.md", page)];
    let markdown_names: Vec<&str> = markdown_names.iter().map(String::as_str).collect();
    if let Some(markdown) = templates.render(&markdown_names, &ctx)? {
        let html = render_markdown_to_html(&markdown);
        let wrapped = templates.render_required(&[BASE_TEMPLATE], &context! { page => page, markdown => html })?;
        return Ok(wrapped);
    }

    let html_names = [format!("{}.tmpl.html", page), format!("{}.html", page)];
    let html_names: Vec<&str> = html_names.iter().map(String::as_str).collect();
    templates
        .render(&html_names, &ctx)?
        .ok_or_else(|| ServeError::PageNotFound(page.to_string()))
}

/// Page named by a request path: `/` is the index, `/<name>` is `<name>`.
/// Deeper paths have no page.
pub fn page_response(templates: &TemplateLookups, path: &str) -> Response {
    let page = match path.trim_matches('/') {
        "" => INDEX_PAGE,
        page => page,
    };
    if page.contains('/') {
        return ServeError::PageNotFound(page.to_string()).into_response();
    }
    match render_page(templates, page) {
        Ok(html) => html_response(StatusCode::OK, html),
        Err(e) => e.into_response(),
    }
}

/// Serves `/` and `/:page` out of `templates`
pub fn pages_router(templates: TemplateLookups) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/:page", get(named_page))
        .with_state(Arc::new(templates))
}

/// Serves one page at the mount point
pub fn single_page_router(templates: TemplateLookups, page: impl Into<String>) -> Router {
    let page = page.into();
    Router::new().route(
        "/",
        get(move || {
            let templates = templates.clone();
            let page = page.clone();
            async move { page_response(&templates, &page) }
        }),
    )
}

async fn index_page(State(templates): State<Arc<TemplateLookups>>) -> Response {
    page_response(&templates, "/")
}

async fn named_page(State(templates): State<Arc<TemplateLookups>>, Path(page): Path<String>) -> Response {
    page_response(&templates, &page)
}
