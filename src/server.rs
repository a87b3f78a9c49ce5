//! # HTTP Server
//!
//! Ties command handlers, static directories and template pages into one
//! axum router.
//!
//! Anything no route claims falls through to page serving: `/` renders the
//! `index` page, `/<name>` renders `<name>`, see
//! [`render_page`](crate::handlers::pages::render_page).

use std::path::PathBuf;

use axum::http::Uri;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::handlers::pages::page_response;
use crate::render::{SharedLookup, TemplateLookups};

pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;

/// A local directory served under a URL prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPath {
    pub url_path: String,
    pub local_path: PathBuf,
}

impl StaticPath {
    pub fn new(url_path: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            url_path: url_path.into(),
            local_path: local_path.into(),
        }
    }
}

pub struct Server {
    router: Router,
    static_paths: Vec<StaticPath>,
    template_lookups: TemplateLookups,
    address: String,
    port: u16,
    dev_mode: bool,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            static_paths: Vec::new(),
            template_lookups: TemplateLookups::embedded(),
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            dev_mode: false,
        }
    }

    /// Add static directories. A path whose URL is already served replaces
    /// the existing one.
    pub fn with_static_paths(mut self, paths: impl IntoIterator<Item = StaticPath>) -> Self {
        for path in paths {
            self.static_paths.retain(|p| p.url_path != path.url_path);
            self.static_paths.push(path);
        }
        self
    }

    pub fn with_prepend_template_lookups(mut self, lookups: impl IntoIterator<Item = SharedLookup>) -> Self {
        self.template_lookups.prepend(lookups);
        self
    }

    pub fn with_append_template_lookups(mut self, lookups: impl IntoIterator<Item = SharedLookup>) -> Self {
        self.template_lookups.append(lookups);
        self
    }

    pub fn with_replace_template_lookups(mut self, lookups: impl IntoIterator<Item = SharedLookup>) -> Self {
        self.template_lookups.replace(lookups);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Permissive CORS, for local development
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Mount `router` under `path`. `/` merges it at the root.
    pub fn with_routes(mut self, path: &str, router: Router) -> Self {
        let path = path.trim_end_matches('/');
        self.router = if path.is_empty() {
            self.router.merge(router)
        } else {
            self.router.nest(path, router)
        };
        self
    }

    pub fn template_lookups(&self) -> &TemplateLookups {
        &self.template_lookups
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn into_router(self) -> Router {
        let mut router = self.router;
        for path in &self.static_paths {
            router = router.nest_service(&path.url_path, ServeDir::new(&path.local_path));
        }

        let templates = self.template_lookups;
        router = router
            .fallback(move |uri: Uri| {
                let templates = templates.clone();
                async move { page_response(&templates, uri.path()) }
            })
            .layer(TraceLayer::new_for_http());

        if self.dev_mode {
            router = router.layer(CorsLayer::permissive());
        }
        router
    }

    /// Bind, then serve until Ctrl-C
    pub async fn run(self) -> std::io::Result<()> {
        let address = self.address();
        let listener = TcpListener::bind(&address).await?;
        info!(address = %address, "tablegate listening");

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    info!("shutting down");
}
