//! The build orchestrator.
//!
//! [`build`] turns a loaded [`Project`] into a complete `build/` directory:
//!
//! ```text
//! 1. Clean      build/ removed and recreated, include cache cleared
//! 2. Render     every page → build/<url>            (source file claimed)
//! 3. Search     build/search.html with the lunr index, if enabled
//! 4. Copy       content/ → build/                   (unclaimed, non-Markdown)
//! 5. Redirect   build/index.html language redirect  (unless a page wrote it)
//! 6. Assets     theme/assets/ → build/assets/       (per-extension transforms)
//! ```
//!
//! A page that fails to render is skipped and reported; it never fails the
//! build. A content file that would overwrite generated output is reported
//! and not copied. Everything else that goes wrong is a [`BuildError`].
//!
//! The cancel token is checked between steps, before each page and before
//! each copied file.

use crate::assets::{AssetError, AssetPipeline, AssetReport};
use crate::cancel::CancelToken;
use crate::events::{BuildEvent, BuildStep, emit};
use crate::frontmatter;
use crate::markdown::CommonMark;
use crate::minify::{HtmlCompressor, Minifier};
use crate::page::{MARKDOWN_EXTENSION, Page};
use crate::project::{LoadError, Project};
use crate::render::{self, RenderError, Renderer, Variables};
use crate::resources;
use crate::search::{self, SearchIndex, SearchRecord};
use crate::template::ASSETS_DIR;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Output of the language redirect, relative to the build directory.
pub const REDIRECT_OUTPUT: &str = "index.html";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("build interrupted")]
    Interrupted,
}

impl BuildError {
    /// Whether the build was stopped on purpose rather than failing.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// `quire build`: minified output.
    Production,
    /// `quire serve`: readable output.
    Preview,
}

impl BuildMode {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// A content file that was not copied because its destination already existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyConflict {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// What a build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Output URLs of the rendered pages, in render order.
    pub rendered: Vec<String>,
    /// Sources of pages that failed to render.
    pub skipped: Vec<PathBuf>,
    pub search_records: usize,
    pub search_page: bool,
    pub copied: usize,
    pub copy_conflicts: Vec<CopyConflict>,
    pub redirect_page: bool,
    pub assets: AssetReport,
    pub elapsed: Duration,
}

/// Build `project` into its `build/` directory.
pub fn build(
    project: &Project,
    mode: BuildMode,
    cancel: &CancelToken,
    progress: Option<&Sender<BuildEvent>>,
) -> Result<BuildReport, BuildError> {
    let started = Instant::now();
    emit(
        progress,
        BuildEvent::Started {
            project: project.config.name.clone(),
        },
    );
    for conflict in &project.conflicts {
        emit(
            progress,
            BuildEvent::LoadConflict {
                source: conflict.source.clone(),
                winner: conflict.winner.clone(),
                url: conflict.url.clone(),
            },
        );
    }

    match run(project, mode, cancel, progress) {
        Ok(mut report) => {
            report.elapsed = started.elapsed();
            info!(
                pages = report.rendered.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "build finished"
            );
            emit(
                progress,
                BuildEvent::Finished {
                    pages: report.rendered.len(),
                    elapsed: report.elapsed,
                },
            );
            Ok(report)
        }
        Err(e) => {
            if !e.is_interrupted() {
                emit(
                    progress,
                    BuildEvent::Failed {
                        message: e.to_string(),
                    },
                );
            }
            Err(e)
        }
    }
}

fn run(
    project: &Project,
    mode: BuildMode,
    cancel: &CancelToken,
    progress: Option<&Sender<BuildEvent>>,
) -> Result<BuildReport, BuildError> {
    let build_dir = project.build_dir();
    let mut report = BuildReport::default();

    emit(progress, BuildEvent::Step(BuildStep::CleanBuildDirectory));
    clean(&build_dir)?;
    project.template.clear_cache();

    let markup = CommonMark;
    let compressor = HtmlCompressor;
    let minifier: Option<&dyn Minifier> =
        if mode.is_production() && project.config.enable_minification {
            Some(&compressor)
        } else {
            None
        };
    let renderer = Renderer::new(project, &markup, minifier);

    cancel.check()?;
    emit(progress, BuildEvent::Step(BuildStep::RenderPages));
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut index = SearchIndex::new();
    render_pages(project, &renderer, cancel, progress, &mut claimed, &mut index, &mut report)?;

    cancel.check()?;
    if project.config.enable_lunr && !index.is_empty() {
        emit(progress, BuildEvent::Step(BuildStep::SearchPage));
        report.search_records = index.len();
        report.search_page = render_search_page(project, &renderer, &index, progress, &mut report)?;
    }

    cancel.check()?;
    emit(progress, BuildEvent::Step(BuildStep::CopyContent));
    copy_content(project, &claimed, cancel, progress, &mut report)?;

    cancel.check()?;
    emit(progress, BuildEvent::Step(BuildStep::RedirectPage));
    report.redirect_page = write_redirect(project, minifier)?;

    cancel.check()?;
    emit(progress, BuildEvent::Step(BuildStep::CopyAssets));
    report.assets = AssetPipeline::for_project(&project.config, mode.is_production()).run(
        &project.template.assets_dir(),
        &build_dir.join(ASSETS_DIR),
        cancel,
    )?;

    Ok(report)
}

fn clean(build_dir: &Path) -> Result<(), BuildError> {
    if build_dir.exists() {
        debug!(path = %build_dir.display(), "removing previous build");
        fs::remove_dir_all(build_dir)?;
    }
    fs::create_dir_all(build_dir)?;
    Ok(())
}

fn render_pages(
    project: &Project,
    renderer: &Renderer<'_>,
    cancel: &CancelToken,
    progress: Option<&Sender<BuildEvent>>,
    claimed: &mut HashSet<PathBuf>,
    index: &mut SearchIndex,
    report: &mut BuildReport,
) -> Result<(), BuildError> {
    let build_dir = project.build_dir();
    for page in &project.pages {
        cancel.check()?;
        if !page.source.is_file() {
            debug!(path = %page.source.display(), "page source disappeared, skipping");
            continue;
        }
        let rendered = match renderer.render_file(page, &Variables::new()) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(path = %page.source.display(), error = %e, "page failed to render, skipping");
                emit(
                    progress,
                    BuildEvent::PageSkipped {
                        source: page.source.clone(),
                        reason: e.to_string(),
                    },
                );
                report.skipped.push(page.source.clone());
                continue;
            }
        };
        render::write_output(&page.output_path(&build_dir), &rendered.html)?;
        claimed.insert(page.source.clone());
        if project.config.enable_lunr {
            index.add(SearchRecord::new(page, &rendered.body));
        }
        emit(
            progress,
            BuildEvent::PageRendered {
                url: page.url().to_string(),
            },
        );
        report.rendered.push(page.url().to_string());
    }
    Ok(())
}

/// Render the bundled search page with the index. Returns whether it was written.
fn render_search_page(
    project: &Project,
    renderer: &Renderer<'_>,
    index: &SearchIndex,
    progress: Option<&Sender<BuildEvent>>,
    report: &mut BuildReport,
) -> Result<bool, BuildError> {
    let source = PathBuf::from(search::SEARCH_PAGE);
    let header = frontmatter::parse(resources::SEARCH_PAGE, &source)?.header;
    let page = Page::new(source.clone(), source, header, project.default_language());
    let destination = page.output_path(&project.build_dir());
    if destination.exists() {
        warn!(path = %destination.display(), "a page already uses the search page URL, not writing the index");
        return Ok(false);
    }

    let mut extra = Variables::new();
    extra.insert("lunr_data".into(), index.to_script().into());
    match renderer.render_source(&page, resources::SEARCH_PAGE, &extra) {
        Ok(rendered) => {
            render::write_output(&destination, &rendered.html)?;
            Ok(true)
        }
        Err(e) => {
            warn!(error = %e, "search page failed to render, skipping");
            emit(
                progress,
                BuildEvent::PageSkipped {
                    source: page.source.clone(),
                    reason: e.to_string(),
                },
            );
            report.skipped.push(page.source);
            Ok(false)
        }
    }
}

fn copy_content(
    project: &Project,
    claimed: &HashSet<PathBuf>,
    cancel: &CancelToken,
    progress: Option<&Sender<BuildEvent>>,
    report: &mut BuildReport,
) -> Result<(), BuildError> {
    let content_dir = project.content_dir();
    let build_dir = project.build_dir();
    if !content_dir.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(&content_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let source = entry.path();
        let is_markdown = source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION));
        if is_markdown || claimed.contains(source) {
            continue;
        }
        cancel.check()?;

        let relative = source.strip_prefix(&content_dir).unwrap_or(source);
        let destination = build_dir.join(relative);
        if destination.exists() {
            warn!(
                source = %source.display(),
                destination = %destination.display(),
                "destination already exists, not copying"
            );
            emit(
                progress,
                BuildEvent::CopyConflict {
                    source: source.to_path_buf(),
                    destination: destination.clone(),
                },
            );
            report.copy_conflicts.push(CopyConflict {
                source: source.to_path_buf(),
                destination,
            });
            continue;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &destination)?;
        report.copied += 1;
    }
    Ok(())
}

/// Where the redirect sends visitors: the default language's first page, or
/// its directory when it has none.
pub fn redirection_url(project: &Project) -> String {
    let default = project.default_language();
    project
        .pages
        .iter()
        .find(|p| p.language == default)
        .map(|p| p.url().to_string())
        .unwrap_or_else(|| format!("{default}/"))
}

/// Write the language redirect to `build/index.html` unless a page already
/// did. Returns whether it was written.
fn write_redirect(project: &Project, minifier: Option<&dyn Minifier>) -> Result<bool, BuildError> {
    let destination = project.build_dir().join(REDIRECT_OUTPUT);
    if destination.exists() {
        debug!("index.html was rendered from content, no redirect needed");
        return Ok(false);
    }

    let mut model = render::base_model(project, "");
    model.insert("redirection_url".into(), redirection_url(project).into());
    model.insert("languages".into(), project.languages().into());
    let html = project.template.render(
        resources::REDIRECT_PAGE,
        &Value::Object(model),
        &project.theme_dir(),
    )?;
    let html = match minifier {
        Some(minifier) => minifier.minify(&html),
        None => html,
    };
    render::write_output(&destination, &html)?;
    Ok(true)
}
