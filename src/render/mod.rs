//! # Rendering
//!
//! Template lookup, markdown conversion and form layout.
//!
//! Templates are found through an ordered chain of [`TemplateLookup`]s, the
//! first lookup that knows one of the requested names renders it. The
//! built-in [`EmbeddedTemplates`] usually sit at the end of the chain so that
//! user directories can override them.
//!
//! Pages that stream rows render their template once with [`ROWS_MARKER`] in
//! place of the rows and split the output around it.

pub mod layout;
pub mod lookup;

pub use layout::{compute_layout, Input, InputOption, Layout, Section};
pub use lookup::{EmbeddedTemplates, TemplateDir, TemplateFile};

use std::sync::Arc;

use pulldown_cmark::{html, Options, Parser};
use thiserror::Error;

/// Placeholder rendered where streamed rows go
pub const ROWS_MARKER: &str = "<!-- tablegate:rows -->";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("template {0} has no rows placeholder")]
    MissingRowsMarker(String),
}

/// A source of named templates
pub trait TemplateLookup: Send + Sync {
    /// Render the first of `names` this lookup knows, or `None`
    fn render(&self, names: &[&str], ctx: &minijinja::Value) -> Result<Option<String>, RenderError>;

    /// Re-read templates from their source
    fn reload(&self) -> Result<(), RenderError> {
        Ok(())
    }
}

pub type SharedLookup = Arc<dyn TemplateLookup>;

/// Ordered chain of lookups, first match wins
#[derive(Clone, Default)]
pub struct TemplateLookups {
    lookups: Vec<SharedLookup>,
}

impl TemplateLookups {
    pub fn new(lookups: Vec<SharedLookup>) -> Self {
        Self { lookups }
    }

    /// Chain holding only the built-in templates
    pub fn embedded() -> Self {
        Self::new(vec![Arc::new(EmbeddedTemplates::new())])
    }

    pub fn prepend(&mut self, lookups: impl IntoIterator<Item = SharedLookup>) {
        let mut front: Vec<SharedLookup> = lookups.into_iter().collect();
        front.append(&mut self.lookups);
        self.lookups = front;
    }

    pub fn append(&mut self, lookups: impl IntoIterator<Item = SharedLookup>) {
        self.lookups.extend(lookups);
    }

    pub fn replace(&mut self, lookups: impl IntoIterator<Item = SharedLookup>) {
        self.lookups = lookups.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    /// Like [`TemplateLookup::render`], failing when no lookup knows any name
    pub fn render_required(&self, names: &[&str], ctx: &minijinja::Value) -> Result<String, RenderError> {
        self.render(names, ctx)?
            .ok_or_else(|| RenderError::NotFound(names.join(", ")))
    }
}

impl TemplateLookup for TemplateLookups {
    fn render(&self, names: &[&str], ctx: &minijinja::Value) -> Result<Option<String>, RenderError> {
        for lookup in &self.lookups {
            if let Some(out) = lookup.render(names, ctx)? {
                return Ok(Some(out));
            }
        }
        Ok(None)
    }

    fn reload(&self) -> Result<(), RenderError> {
        self.lookups.iter().try_for_each(|l| l.reload())
    }
}

/// Split rendered output around [`ROWS_MARKER`]
pub fn split_at_rows(template: &str, rendered: String) -> Result<(String, String), RenderError> {
    match rendered.split_once(ROWS_MARKER) {
        Some((prefix, suffix)) => Ok((prefix.to_string(), suffix.to_string())),
        None => Err(RenderError::MissingRowsMarker(template.to_string())),
    }
}

/// CommonMark with tables and strikethrough
pub fn render_markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}
