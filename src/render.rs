//! Per-page rendering.
//!
//! ```text
//! source file
//!   → split front-matter           (header already read at load time)
//!   → template pass over the body  (includeFile relative to content/)
//!   → Markdown to HTML             (.md pages only)
//!   → theme skeleton               (page.content = body HTML)
//!   → HTML minification            (production builds)
//! ```
//!
//! ## Render model
//!
//! Both template passes see the same variables:
//!
//! | Variable | Value |
//! |----------|-------|
//! | `generator_name`, `generator_version`, `generator_website` | About quire |
//! | `project.*` | `project.yml` values, `languages`, and `menus` (language → HTML) |
//! | `page.*` | `title`, `language`, `path`, `url`, `root`, `previous`, `next`, `header`, `last_modified`, `content` |
//! | `menu` | Menu HTML for the page's language |
//!
//! plus any extra variables the caller passes (the search page receives
//! `lunr_data`). `page.content` is empty during the body pass.

use crate::markdown::MarkupRenderer;
use crate::minify::Minifier;
use crate::page::Page;
use crate::project::Project;
use crate::{GENERATOR_NAME, GENERATOR_WEBSITE, version_string};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Extra top-level template variables.
pub type Variables = serde_json::Map<String, Value>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("template error: {0}")]
    Template(String),
}

/// Variables shared by every template: generator info and `project.*`.
///
/// `root` prefixes relative menu links.
pub fn base_model(project: &Project, root: &str) -> Variables {
    let mut project_json = project.config.to_json();
    project_json.insert("languages".into(), project.languages().into());
    let menus: Variables = project
        .menus
        .iter()
        .map(|(language, menu)| (language.clone(), Value::from(menu.render(root).into_string())))
        .collect();
    project_json.insert("menus".into(), Value::Object(menus));

    let mut model = Variables::new();
    model.insert("generator_name".into(), GENERATOR_NAME.into());
    model.insert("generator_version".into(), version_string().into());
    model.insert("generator_website".into(), GENERATOR_WEBSITE.into());
    model.insert("project".into(), Value::Object(project_json));
    model
}

/// The full model for one page.
pub fn page_model(project: &Project, page: &Page, content: Option<&str>, extra: &Variables) -> Value {
    let root = page.root();
    let mut model = base_model(project, &root);
    model.insert("page".into(), Value::Object(page.to_json(content)));
    let menu = project
        .menu_for(&page.language)
        .map(|m| m.render(&root).into_string())
        .unwrap_or_default();
    model.insert("menu".into(), menu.into());
    for (key, value) in extra {
        model.insert(key.clone(), value.clone());
    }
    Value::Object(model)
}

/// Output of a page render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Body HTML, before the skeleton.
    pub body: String,
    /// The complete document.
    pub html: String,
}

/// Renders pages of one project.
pub struct Renderer<'a> {
    project: &'a Project,
    markup: &'a dyn MarkupRenderer,
    minifier: Option<&'a dyn Minifier>,
}

impl<'a> Renderer<'a> {
    pub fn new(
        project: &'a Project,
        markup: &'a dyn MarkupRenderer,
        minifier: Option<&'a dyn Minifier>,
    ) -> Self {
        Self {
            project,
            markup,
            minifier,
        }
    }

    /// Read the page's source file and render it.
    pub fn render_file(&self, page: &Page, extra: &Variables) -> Result<RenderedPage, RenderError> {
        let source = fs::read_to_string(&page.source)?;
        self.render_source(page, &source, extra)
    }

    /// Render `source` as the text of `page`.
    pub fn render_source(
        &self,
        page: &Page,
        source: &str,
        extra: &Variables,
    ) -> Result<RenderedPage, RenderError> {
        let body = crate::frontmatter::split(source).body;
        let template = &self.project.template;

        let body_model = page_model(self.project, page, None, extra);
        let body = template.render(body, &body_model, &self.project.content_dir())?;
        let body = if page.is_markdown() {
            self.markup.render(&body)
        } else {
            body
        };

        let page_model = page_model(self.project, page, Some(&body), extra);
        let html = template.render_page(&page_model)?;
        let html = match self.minifier {
            Some(minifier) => minifier.minify(&html),
            None => html,
        };
        Ok(RenderedPage { body, html })
    }
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_output(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}
