//! End-to-end builds through the public API: load a project directory,
//! build it, inspect `build/`.

use quire::build::{self, BuildMode};
use quire::cancel::CancelToken;
use quire::events::{BuildEvent, BuildStep};
use quire::project::Project;
use quire::resources;
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use tempfile::TempDir;

const SKELETON: &str = "<html lang=\"{{ page.language }}\"><body>\
<nav>{{ menu }}</nav>\
<main>{{ page.content }}</main>\
</body></html>";

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join("build").join(relative))
        .unwrap_or_else(|e| panic!("build/{relative} not readable: {e}"))
}

/// An English and French project with a custom skeleton.
fn bilingual_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "project.yml", "name: Bilingual\ndefault_language: en\n");
    write(root, "theme/page.html", SKELETON);
    write(root, "theme/assets/js/site.js", "// comment\nvar a = 1;\n");
    write(
        root,
        "menu.yml",
        "- {title: Guide, link: guide/intro.html, weight: 1}\n- {title: Home, link: index.html, weight: 0}\n",
    );
    write(
        root,
        "menu_fr.yml",
        "---\nlanguage: fr\n---\n- {title: Accueil, link: fr/guide/intro.html, weight: 0}\n",
    );
    write(root, "content/index.md", "---\ntitle: Home\n---\n# Welcome to {{ project.name }}\n");
    write(root, "content/guide/intro.md", "---\ntitle: Intro\n---\nSteps:{% for i in range(1, 4) %} {{ i }}{% endfor %}\n");
    write(
        root,
        "content/fr/guide/intro.md",
        "---\ntitle: Introduction\nlanguage: fr\n---\nBonjour\n",
    );
    write(root, "content/images/logo.svg", "<svg/>");
    tmp
}

// ============================================================================
// Full build
// ============================================================================

#[test]
fn bilingual_project_builds() {
    let tmp = bilingual_project();
    let project = Project::load(tmp.path()).unwrap();
    let report = build::build(&project, BuildMode::Preview, &CancelToken::new(), None).unwrap();

    assert_eq!(report.rendered.len(), 3);
    assert!(report.skipped.is_empty());

    let home = read(tmp.path(), "index.html");
    assert!(home.contains("Welcome to Bilingual"));
    assert!(home.contains("lang=\"en\""));

    let intro = read(tmp.path(), "guide/intro.html");
    assert!(intro.contains("Steps: 1 2 3"));
    let home_at = intro.find(">Home<").unwrap();
    let guide_at = intro.find(">Guide<").unwrap();
    assert!(home_at < guide_at, "menu entries sorted by weight");

    let french = read(tmp.path(), "fr/guide/intro.html");
    assert!(french.contains("Bonjour"));
    assert!(french.contains("Accueil"));
    assert!(french.contains("lang=\"fr\""));

    assert_eq!(read(tmp.path(), "images/logo.svg"), "<svg/>");
    assert!(!tmp.path().join("build/guide/intro.md").exists());
    assert!(tmp.path().join("build/assets/js/site.js").is_file());
}

#[test]
fn production_build_minifies_assets() {
    let tmp = bilingual_project();
    let project = Project::load(tmp.path()).unwrap();
    build::build(&project, BuildMode::Production, &CancelToken::new(), None).unwrap();
    let js = read(tmp.path(), "assets/js/site.js");
    assert!(!js.contains("// comment"));
    assert!(js.contains("var a"));
}

#[test]
fn search_page_lists_every_page() {
    let tmp = bilingual_project();
    let project = Project::load(tmp.path()).unwrap();
    let report = build::build(&project, BuildMode::Preview, &CancelToken::new(), None).unwrap();
    assert!(report.search_page);
    assert_eq!(report.search_records, 3);
    let search = read(tmp.path(), "search.html");
    assert!(search.contains("guide/intro.html"));
    assert!(search.contains("fr/guide/intro.html"));
}

#[test]
fn rebuilding_gives_the_same_tree() {
    let tmp = bilingual_project();
    let project = Project::load(tmp.path()).unwrap();
    build::build(&project, BuildMode::Production, &CancelToken::new(), None).unwrap();
    let first = read(tmp.path(), "guide/intro.html");
    let project = Project::load(tmp.path()).unwrap();
    build::build(&project, BuildMode::Production, &CancelToken::new(), None).unwrap();
    assert_eq!(read(tmp.path(), "guide/intro.html"), first);
}

// ============================================================================
// Conflicts and events
// ============================================================================

#[test]
fn content_file_never_overwrites_a_page() {
    let tmp = bilingual_project();
    write(tmp.path(), "content/guide/intro.html", "raw copy");
    let project = Project::load(tmp.path()).unwrap();

    let (tx, rx) = mpsc::channel();
    let report = build::build(&project, BuildMode::Preview, &CancelToken::new(), Some(&tx)).unwrap();
    drop(tx);
    let events: Vec<BuildEvent> = rx.into_iter().collect();

    assert_eq!(report.copy_conflicts.len(), 1);
    assert_ne!(read(tmp.path(), "guide/intro.html"), "raw copy");
    assert!(events.iter().any(|e| matches!(e, BuildEvent::CopyConflict { .. })));
    assert!(events.contains(&BuildEvent::Step(BuildStep::CopyAssets)));
    assert!(matches!(events.last(), Some(BuildEvent::Finished { pages: 3, .. })));
}

#[test]
fn redirect_page_written_without_index() {
    let tmp = bilingual_project();
    fs::remove_file(tmp.path().join("content/index.md")).unwrap();
    let project = Project::load(tmp.path()).unwrap();
    let report = build::build(&project, BuildMode::Preview, &CancelToken::new(), None).unwrap();
    assert!(report.redirect_page);
    assert!(read(tmp.path(), "index.html").contains("guide/intro.html"));
}

// ============================================================================
// Starter project
// ============================================================================

#[test]
fn new_project_builds_out_of_the_box() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    let written = resources::create_project(&root).unwrap();
    assert!(written.iter().any(|p| p.ends_with("project.yml")));

    let project = Project::load(&root).unwrap();
    let report = build::build(&project, BuildMode::Production, &CancelToken::new(), None).unwrap();
    assert!(report.skipped.is_empty());
    assert!(root.join("build/index.html").is_file());
    assert!(root.join("build/writing-pages.html").is_file());
    assert!(root.join("build/assets/css/page.css").is_file());

    let again = resources::create_project(&root).unwrap_err();
    assert!(matches!(again, resources::NewProjectError::AlreadyExists(_)));
}
