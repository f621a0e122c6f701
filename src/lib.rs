//! # Quire
//!
//! A static documentation site generator. A project directory holds a
//! `project.yml`, one or more `menu*.yml` files, a `content/` tree of Markdown
//! pages and an optional `theme/`. Quire turns it into a ready-to-publish
//! `build/` directory, and can serve that directory with automatic rebuild and
//! browser refresh while you write.
//!
//! # Project Layout
//!
//! ```text
//! my-docs/
//! ├── project.yml              # Project settings (name, languages, flags)
//! ├── menu.yml                 # Default-language menu
//! ├── menu_fr.yml              # Another language (`language: fr` header)
//! ├── content/
//! │   ├── index.md             # → build/index.html
//! │   ├── guide/intro.md       # → build/guide/intro.html
//! │   ├── fr/intro.md          # `language: fr` → build/fr/intro.html
//! │   └── images/logo.png      # Copied verbatim → build/images/logo.png
//! └── theme/
//!     ├── page.html            # Page skeleton (template)
//!     └── assets/              # Stylesheets and scripts → build/assets/
//! ```
//!
//! # Build Pipeline
//!
//! ```text
//! 1. Load      project dir  →  Project        (config, menus, pages, template)
//! 2. Render    pages        →  build/**.html  (template pass, Markdown, skeleton)
//! 3. Search    records      →  build/search.html
//! 4. Copy      content/     →  build/         (everything not claimed above)
//! 5. Redirect  languages    →  build/index.html
//! 6. Assets    theme/assets →  build/assets/  (per-extension transforms)
//! ```
//!
//! Every stage checks a shared [`cancel::CancelToken`] so that a running build
//! can be abandoned when the project changes again or the server stops.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`project`] | Loads a project directory into a [`project::Project`]; owns the load error taxonomy |
//! | [`config`] | `project.yml` parsing: stock defaults, deprecated aliases, validation |
//! | [`frontmatter`] | Splits the optional `---` fenced YAML header off content and menu files |
//! | [`page`] | One content file: title, language, header and output path |
//! | [`menu`] | Weighted, nested navigation menus and their HTML rendering |
//! | [`template`] | Theme skeleton loading and the template engine with `includeFile` and `range` |
//! | [`functions`] | Pure implementations of the template functions |
//! | [`markdown`] | Markdown to HTML with tables, strikethrough, autolinks and heading anchors |
//! | [`render`] | Per-page render pipeline and render model |
//! | [`minify`] | HTML, CSS and JavaScript minifiers |
//! | [`assets`] | Theme asset copy through a per-extension transform table |
//! | [`search`] | Client-side search index records |
//! | [`build`] | The build orchestrator |
//! | [`serve`] | Live preview: HTTP server, file watcher and rebuild loop |
//! | [`events`] | Build lifecycle events sent to the CLI printer |
//! | [`cancel`] | Cooperative cancellation token |
//! | [`resources`] | Files bundled into the binary: default theme, search page, starter project |
//! | [`output`] | CLI output formatting |

pub mod assets;
pub mod build;
pub mod cancel;
pub mod config;
pub mod events;
pub mod frontmatter;
pub mod functions;
pub mod markdown;
pub mod menu;
pub mod minify;
pub mod output;
pub mod page;
pub mod project;
pub mod render;
pub mod resources;
pub mod search;
pub mod serve;
pub mod template;

#[cfg(test)]
pub(crate) mod test_helpers;

/// Name written into generated pages (`generator_name`).
pub const GENERATOR_NAME: &str = "quire";

/// Link written into generated pages (`generator_website`).
pub const GENERATOR_WEBSITE: &str = "https://crates.io/crates/quire";

/// Version string: the crate version on a release tag, `dev@<hash>` otherwise.
pub fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            static DEV: std::sync::OnceLock<String> = std::sync::OnceLock::new();
            DEV.get_or_init(|| format!("dev@{hash}"))
        }
    }
}
