//! Template sources

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use minijinja::{Environment, ErrorKind};
use tracing::debug;

use super::{RenderError, TemplateLookup};

const EMBEDDED: &[(&str, &str)] = &[
    ("base.tmpl.html", include_str!("templates/base.tmpl.html")),
    ("data-tables.tmpl.html", include_str!("templates/data-tables.tmpl.html")),
    ("form.tmpl.html", include_str!("templates/form.tmpl.html")),
    ("results.tmpl.html", include_str!("templates/results.tmpl.html")),
    ("writer.tmpl.html", include_str!("templates/writer.tmpl.html")),
    ("commands.tmpl.html", include_str!("templates/commands.tmpl.html")),
    ("index.tmpl.md", include_str!("templates/index.tmpl.md")),
];

/// Render the first of `names` known to `env`
fn render_first(env: &Environment<'_>, names: &[&str], ctx: &minijinja::Value) -> Result<Option<String>, RenderError> {
    for name in names {
        match env.get_template(name) {
            Ok(template) => return Ok(Some(template.render(ctx)?)),
            Err(e) if e.kind() == ErrorKind::TemplateNotFound => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

/// Templates compiled into the binary
pub struct EmbeddedTemplates {
    env: Environment<'static>,
}

impl EmbeddedTemplates {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for &(name, source) in EMBEDDED {
            // sources are checked by the tests below
            if let Err(e) = env.add_template(name, source) {
                tracing::error!(template = name, error = %e, "invalid embedded template");
            }
        }
        Self { env }
    }
}

impl Default for EmbeddedTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateLookup for EmbeddedTemplates {
    fn render(&self, names: &[&str], ctx: &minijinja::Value) -> Result<Option<String>, RenderError> {
        render_first(&self.env, names, ctx)
    }
}

/// Templates read from a directory, named by their path relative to it.
/// Files are loaded on first use and cached until reloaded.
pub struct TemplateDir {
    dir: PathBuf,
    suffixes: Vec<String>,
    always_reload: bool,
    env: RwLock<Environment<'static>>,
}

impl TemplateDir {
    /// Serve templates whose name ends with one of `suffixes`
    pub fn new(dir: impl Into<PathBuf>, suffixes: &[&str]) -> Result<Self, RenderError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("template directory {} not found", dir.display()),
            )
            .into());
        }
        let suffixes: Vec<String> = suffixes.iter().map(|s| s.to_string()).collect();
        let env = dir_env(&dir, &suffixes);
        Ok(Self {
            dir,
            suffixes,
            always_reload: false,
            env: RwLock::new(env),
        })
    }

    /// Drop cached templates before every render
    pub fn with_always_reload(mut self, always_reload: bool) -> Self {
        self.always_reload = always_reload;
        self
    }
}

fn dir_env(dir: &Path, suffixes: &[String]) -> Environment<'static> {
    let loader = minijinja::path_loader(dir.to_path_buf());
    let suffixes = suffixes.to_vec();
    let mut env = Environment::new();
    env.set_loader(move |name| {
        if !suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return Ok(None);
        }
        let source = loader(name)?;
        if source.is_some() {
            debug!(template = %name, "loaded template");
        }
        Ok(source)
    });
    env
}

impl TemplateLookup for TemplateDir {
    fn render(&self, names: &[&str], ctx: &minijinja::Value) -> Result<Option<String>, RenderError> {
        if self.always_reload {
            self.reload()?;
        }
        let env = self.env.read().unwrap_or_else(PoisonError::into_inner);
        render_first(&env, names, ctx)
    }

    fn reload(&self) -> Result<(), RenderError> {
        *self.env.write().unwrap_or_else(PoisonError::into_inner) = dir_env(&self.dir, &self.suffixes);
        Ok(())
    }
}

/// A single file served under a fixed template name
pub struct TemplateFile {
    name: String,
    path: PathBuf,
    env: RwLock<Environment<'static>>,
}

impl TemplateFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let name = name.into();
        let path = path.into();
        let env = load_file(&name, &path)?;
        Ok(Self {
            name,
            path,
            env: RwLock::new(env),
        })
    }
}

fn load_file(name: &str, path: &Path) -> Result<Environment<'static>, RenderError> {
    let mut env = Environment::new();
    env.add_template_owned(name.to_string(), std::fs::read_to_string(path)?)?;
    Ok(env)
}

impl TemplateLookup for TemplateFile {
    fn render(&self, names: &[&str], ctx: &minijinja::Value) -> Result<Option<String>, RenderError> {
        if !names.contains(&self.name.as_str()) {
            return Ok(None);
        }
        let env = self.env.read().unwrap_or_else(PoisonError::into_inner);
        render_first(&env, names, ctx)
    }

    fn reload(&self) -> Result<(), RenderError> {
        let env = load_file(&self.name, &self.path)?;
        *self.env.write().unwrap_or_else(PoisonError::into_inner) = env;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_embedded_templates_compile() {
        let mut env = Environment::new();
        for &(name, source) in EMBEDDED {
            env.add_template(name, source).unwrap();
        }
    }

    #[test]
    fn test_embedded_markdown_index() {
        let out = EmbeddedTemplates::new()
            .render(&["missing.tmpl.md", "index.tmpl.md"], &context! {})
            .unwrap()
            .unwrap();
        assert!(out.starts_with('#'));
    }

    #[test]
    fn test_template_dir_suffixes_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/hello.tmpl.html"), "Hi {{ name }}").unwrap();
        std::fs::write(dir.path().join("skip.txt"), "nope").unwrap();

        let lookup = TemplateDir::new(dir.path(), &[".tmpl.html"]).unwrap();
        let ctx = context! { name => "<b>" };
        assert_eq!(
            lookup.render(&["sub/hello.tmpl.html"], &ctx).unwrap().as_deref(),
            Some("Hi &lt;b&gt;")
        );
        assert_eq!(lookup.render(&["skip.txt"], &ctx).unwrap(), None);

        std::fs::write(dir.path().join("sub/hello.tmpl.html"), "Bye").unwrap();
        let lookup = lookup.with_always_reload(true);
        assert_eq!(
            lookup.render(&["sub/hello.tmpl.html"], &ctx).unwrap().as_deref(),
            Some("Bye")
        );
    }

    #[test]
    fn test_template_dir_stays_inside_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("secret.tmpl.html"), "secret").unwrap();
        let dir = root.path().join("pages");
        std::fs::create_dir_all(&dir).unwrap();

        let lookup = TemplateDir::new(&dir, &[".tmpl.html"]).unwrap();
        assert_eq!(lookup.render(&["../secret.tmpl.html"], &context! {}).unwrap(), None);
        assert!(TemplateDir::new(root.path().join("missing"), &[".md"]).is_err());
    }

    #[test]
    fn test_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.md");
        std::fs::write(&path, "# {{ title }}").unwrap();

        let lookup = TemplateFile::new("index.tmpl.md", &path).unwrap();
        let out = lookup.render(&["index.tmpl.md"], &context! { title => "Docs" }).unwrap();
        assert_eq!(out.as_deref(), Some("# Docs"));
        assert_eq!(lookup.render(&["other"], &context! {}).unwrap(), None);
    }
}
