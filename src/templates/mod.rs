//! Template engine
//!
//! HTML pages are rendered with Tera. The default templates are embedded in
//! the binary; a configured override directory can replace any of them by
//! providing a file with the same relative name.
//!
//! Every page receives the standard variables of [`PageVars`]:
//! `site_name`, `request_path`, `year`, `current_user`, `last_login` and
//! `flash`.

use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::TemplateError;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Tera wrapper holding the embedded templates plus any overrides
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Load the embedded templates, then apply overrides from `override_dir`
    ///
    /// A missing override directory is not an error; it is logged and the
    /// embedded set is used as is.
    pub fn new(override_dir: Option<&Path>) -> Result<Self, TemplateError> {
        let mut templates = embedded_templates()?;

        if let Some(dir) = override_dir {
            if dir.is_dir() {
                let mut overrides = BTreeMap::new();
                collect_templates_from_dir(dir, dir, &mut overrides)?;
                for name in overrides.keys() {
                    tracing::info!(template = %name, "Using template override");
                }
                templates.extend(overrides);
            } else {
                tracing::warn!("Template override directory {:?} does not exist", dir);
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| TemplateError::LoadError(error_chain(&e)))?;

        tracing::debug!(count = tera.get_template_names().count(), "Templates loaded");
        Ok(Self { tera })
    }

    /// Embedded templates only
    pub fn embedded() -> Result<Self, TemplateError> {
        Self::new(None)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render `name` with exactly the given context
    pub fn render(&self, name: &str, context: &TeraContext) -> Result<String, TemplateError> {
        if !self.has_template(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }

        self.tera
            .render(name, context)
            .map_err(|e| TemplateError::RenderError {
                template: name.to_string(),
                message: error_chain(&e),
            })
    }

    /// Render `name` with the standard page variables added to `context`
    pub fn render_page(
        &self,
        name: &str,
        context: &TeraContext,
        vars: &PageVars,
    ) -> Result<String, TemplateError> {
        let mut full_context = context.clone();
        full_context.insert("site_name", &vars.site_name);
        full_context.insert("request_path", &vars.request_path);
        full_context.insert("year", &vars.year);
        full_context.insert("current_user", &vars.current_user);
        full_context.insert("last_login", &vars.last_login);
        full_context.insert("flash", &vars.flash);

        self.render(name, &full_context)
    }
}

/// Tera reports the useful detail in the error's source chain
fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn embedded_templates() -> Result<BTreeMap<String, String>, TemplateError> {
    let mut templates = BTreeMap::new();
    for name in EmbeddedTemplates::iter() {
        let file = EmbeddedTemplates::get(&name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        let content = String::from_utf8(file.data.into_owned())
            .map_err(|_| TemplateError::LoadError(format!("{} is not valid UTF-8", name)))?;
        templates.insert(name.to_string(), content);
    }
    Ok(templates)
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut BTreeMap<String, String>,
) -> Result<(), TemplateError> {
    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative = path
                .strip_prefix(base_path)
                .map_err(|_| TemplateError::LoadError(format!("Bad template path {:?}", path)))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            templates.insert(name, fs::read_to_string(&path)?);
        }
    }
    Ok(())
}

/// Standard variables available to every page
#[derive(Debug, Clone, Serialize)]
pub struct PageVars {
    pub site_name: String,
    /// Path of the current request, used for nav highlighting and `next`
    pub request_path: String,
    /// Current year, for the footer
    pub year: i32,
    pub current_user: Option<CurrentUser>,
    /// Value of the `last_login` cookie, shown on the home page
    pub last_login: Option<String>,
    /// One-shot message carried across a redirect
    pub flash: Option<String>,
}

impl PageVars {
    pub fn new(site_name: impl Into<String>, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
            current_user: None,
            last_login: None,
            flash: None,
        }
    }

    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }

    pub fn with_last_login(mut self, last_login: Option<String>) -> Self {
        self.last_login = last_login;
        self
    }

    pub fn with_flash(mut self, flash: Option<String>) -> Self {
        self.flash = flash;
        self
    }
}

/// The logged-in user as templates see it
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}
