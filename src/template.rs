//! Theme templates.
//!
//! A theme directory holds the page skeleton `page.html` and an `assets/`
//! tree. The skeleton is a template rendered once per page with the page's
//! HTML available as `page.content`.
//!
//! Rendering goes through the [`TemplateEngine`] trait. The stock engine,
//! [`JinjaEngine`], uses `minijinja` with auto-escaping off and lenient
//! handling of undefined variables, and registers the two functions described
//! in [`crate::functions`]:
//!
//! ```text
//! {{ includeFile("partials/header.html") }}
//! {% for i in range(1, 4) %}<li>{{ i }}</li>{% endfor %}
//! ```
//!
//! `includeFile` paths are relative to the directory the calling template
//! belongs to: the content directory for page bodies and the theme directory
//! for the skeleton. Included files are rendered against the same model, so
//! they can call `includeFile` themselves.
//!
//! When the skeleton is loaded, includes written with a literal path are
//! replaced by the file's text so the per-page render has nothing left to
//! read from disk. Included files read during rendering are kept in an
//! [`IncludeCache`] owned by the template and emptied at the start of every
//! build.

use crate::functions::{self, FunctionError, INCLUDE_FILE, MAX_INCLUDE_DEPTH};
use crate::project::LoadError;
use crate::render::RenderError;
use minijinja::value::{Enumerator, Object, ObjectRepr, Rest, Value};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tracing::{debug, warn};

/// Skeleton file name inside a theme directory.
pub const SKELETON_FILE: &str = "page.html";

/// Asset directory name inside a theme directory.
pub const ASSETS_DIR: &str = "assets";

static LITERAL_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*includeFile\(\s*(?:"([^"]*)"|'([^']*)')\s*\)\s*\}\}"#)
        .expect("literal include pattern is valid")
});

/// Renders template text against a model.
pub trait TemplateEngine: Send + Sync + Debug {
    /// Render `source`. `base_dir` anchors relative `includeFile` paths.
    fn render(
        &self,
        source: &str,
        model: &serde_json::Value,
        base_dir: &Path,
    ) -> Result<String, RenderError>;

    /// Report a syntax error in `source` without rendering it.
    fn check(&self, source: &str) -> Result<(), String>;

    /// Forget cached include files.
    fn clear_cache(&self) {}
}

/// Included file contents, keyed by path.
#[derive(Debug, Default)]
pub struct IncludeCache {
    files: Mutex<HashMap<PathBuf, Arc<str>>>,
}

impl IncludeCache {
    pub fn read(&self, path: &Path) -> io::Result<Arc<str>> {
        if let Some(hit) = self.lock().get(path) {
            return Ok(Arc::clone(hit));
        }
        let text: Arc<str> = fs::read_to_string(path)?.into();
        self.lock().insert(path.to_path_buf(), Arc::clone(&text));
        Ok(text)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<str>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `minijinja`-backed engine with `includeFile` and `range`.
#[derive(Debug, Default)]
pub struct JinjaEngine {
    cache: Arc<IncludeCache>,
}

impl JinjaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &IncludeCache {
        &self.cache
    }
}

impl TemplateEngine for JinjaEngine {
    fn render(
        &self,
        source: &str,
        model: &serde_json::Value,
        base_dir: &Path,
    ) -> Result<String, RenderError> {
        let model = Value::from_serialize(model);
        let scope = Arc::new(Scope {
            base_dir: base_dir.to_path_buf(),
            model: model.clone(),
            cache: Arc::clone(&self.cache),
            depth: 0,
        });
        scope
            .environment()
            .render_str(source, &model)
            .map_err(|e| RenderError::Template(e.to_string()))
    }

    fn check(&self, source: &str) -> Result<(), String> {
        let env = Environment::new();
        env.template_from_str(source)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// State shared by one render and the includes nested inside it.
struct Scope {
    base_dir: PathBuf,
    model: Value,
    cache: Arc<IncludeCache>,
    depth: usize,
}

impl Scope {
    fn environment(self: &Arc<Self>) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.add_function(functions::RANGE, range_function);
        let scope = Arc::clone(self);
        env.add_function(
            INCLUDE_FILE,
            move |args: Rest<Value>| -> Result<Value, minijinja::Error> {
                Ok(Value::from(scope.include(&args)))
            },
        );
        env
    }

    fn include(&self, args: &[Value]) -> String {
        match self.try_include(args) {
            Ok(text) => text,
            Err(err) => {
                warn!(base = %self.base_dir.display(), "{err}");
                err.to_string()
            }
        }
    }

    fn try_include(&self, args: &[Value]) -> Result<String, FunctionError> {
        let name = args
            .first()
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| FunctionError::new(INCLUDE_FILE, "a file path is required"))?;
        let path = self.base_dir.join(name);
        if !path.is_file() {
            return Err(FunctionError::new(
                INCLUDE_FILE,
                format!("no file at `{name}`"),
            ));
        }
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(FunctionError::new(
                INCLUDE_FILE,
                format!("`{name}` is nested more than {MAX_INCLUDE_DEPTH} levels deep"),
            ));
        }
        let source = self.cache.read(&path).map_err(|e| {
            FunctionError::new(INCLUDE_FILE, format!("unable to read `{name}` ({})", e.kind()))
        })?;

        let child = Arc::new(Scope {
            base_dir: self.base_dir.clone(),
            model: self.model.clone(),
            cache: Arc::clone(&self.cache),
            depth: self.depth + 1,
        });
        child
            .environment()
            .render_str(&source, &self.model)
            .map_err(|e| {
                FunctionError::new(
                    INCLUDE_FILE,
                    format!("unable to render `{name}` ({:?})", e.kind()),
                )
            })
    }
}

fn range_function(args: Rest<Value>) -> Result<Value, minijinja::Error> {
    let integers: Vec<Option<i64>> = args.iter().map(as_integer).collect();
    Ok(match functions::range_from_args(&integers) {
        Ok(values) => Value::from(values),
        Err(err) => {
            warn!("{err}");
            Value::from_object(FailedCall(err))
        }
    })
}

/// Result of a failed function call: prints its message, iterates as an
/// empty sequence so `{% for %}` over it renders nothing.
#[derive(Debug)]
struct FailedCall(FunctionError);

impl Object for FailedCall {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Iterable
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Empty
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(text) = value.as_str() {
        return text.trim().parse().ok();
    }
    i64::try_from(value.clone()).ok()
}

/// Replace `{{ includeFile("...") }}` calls with a literal path by the
/// included file's text, recursively. Calls naming a missing file are left in
/// place and fail at render time.
pub fn resolve_literal_includes(text: &str, directory: &Path) -> String {
    resolve_literal_includes_at(text, directory, 0)
}

fn resolve_literal_includes_at(text: &str, directory: &Path, depth: usize) -> String {
    if depth >= MAX_INCLUDE_DEPTH {
        return text.to_string();
    }
    LITERAL_INCLUDE
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match fs::read_to_string(directory.join(name)) {
                Ok(included) => resolve_literal_includes_at(&included, directory, depth + 1),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// A loaded theme: its directory and compiled skeleton.
#[derive(Debug, Clone)]
pub struct Template {
    directory: PathBuf,
    skeleton: String,
    engine: Arc<dyn TemplateEngine>,
}

impl Template {
    pub fn load(directory: &Path) -> Result<Self, LoadError> {
        Self::with_engine(directory, Arc::new(JinjaEngine::new()))
    }

    pub fn with_engine(directory: &Path, engine: Arc<dyn TemplateEngine>) -> Result<Self, LoadError> {
        let path = directory.join(SKELETON_FILE);
        if !path.is_file() {
            return Err(LoadError::InvalidTemplate {
                path,
                reason: "page skeleton not found".into(),
            });
        }
        let raw = fs::read_to_string(&path)?;
        let skeleton = resolve_literal_includes(&raw, directory);
        engine
            .check(&skeleton)
            .map_err(|reason| LoadError::InvalidTemplate {
                path: path.clone(),
                reason,
            })?;
        debug!(path = %path.display(), "loaded page skeleton");
        Ok(Self {
            directory: directory.to_path_buf(),
            skeleton,
            engine,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.directory.join(ASSETS_DIR)
    }

    /// The skeleton with literal includes already resolved.
    pub fn skeleton(&self) -> &str {
        &self.skeleton
    }

    /// Render the skeleton for one page.
    pub fn render_page(&self, model: &serde_json::Value) -> Result<String, RenderError> {
        self.engine.render(&self.skeleton, model, &self.directory)
    }

    /// Render arbitrary template text with includes resolved from `base_dir`.
    pub fn render(
        &self,
        source: &str,
        model: &serde_json::Value,
        base_dir: &Path,
    ) -> Result<String, RenderError> {
        self.engine.render(source, model, base_dir)
    }

    pub fn clear_cache(&self) {
        self.engine.clear_cache();
    }
}
