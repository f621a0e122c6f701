//! The preview HTTP server.
//!
//! | Request | Response |
//! |---------|----------|
//! | `GET /lastbuild` | Last successful build time, milliseconds since the epoch, as text |
//! | directory without trailing `/` | `302` to the same path with `/` |
//! | directory with `index.html` | That page |
//! | other directory | Generated listing |
//! | `*.html` | The page, refresh script injected before `</body>` |
//! | other file | Raw bytes, content type from the extension |
//! | missing file | `404` page |
//! | anything else failing | `500` page naming the error kind |
//!
//! Every HTML response the server generates carries the refresh script, so a
//! browser parked on a 404 keeps polling and lands on the page once a
//! rebuild produces it.

use super::{LAST_BUILD_ENDPOINT, POLL_INTERVAL, SiteState, refresh};
use crate::{GENERATOR_NAME, GENERATOR_WEBSITE, version_string};
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const INDEX_FILE: &str = "index.html";

/// The preview router over `site`.
pub fn router(site: Arc<SiteState>) -> Router {
    Router::new()
        .route(&format!("/{LAST_BUILD_ENDPOINT}"), get(last_build))
        .fallback(serve_path)
        .with_state(site)
}

async fn last_build(State(site): State<Arc<SiteState>>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        site.last_build().to_string(),
    )
        .into_response()
}

async fn serve_path(State(site): State<Arc<SiteState>>, uri: Uri) -> Response {
    let script = refresh::script(site.last_build(), POLL_INTERVAL);
    let url_path = uri.path();

    let Some(relative) = resolve_request_path(url_path) else {
        debug!(path = url_path, "rejected request path");
        return not_found(url_path, &script);
    };
    let path = site.build_dir().join(&relative);

    match serve_file(&path, &uri, &script).await {
        Ok(response) => response,
        Err(e) if e.kind() == io::ErrorKind::NotFound => not_found(url_path, &script),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to serve request");
            error_page(url_path, &e, &script)
        }
    }
}

/// Decode a URL path into a path relative to the build directory. Returns
/// `None` for paths that would leave it.
pub fn resolve_request_path(url_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(url_path).ok()?;
    let mut relative = PathBuf::new();
    for segment in decoded.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => relative.push(name),
            (Some(Component::CurDir), None) => {}
            _ => return None,
        }
    }
    Some(relative)
}

async fn serve_file(path: &Path, uri: &Uri, script: &str) -> io::Result<Response> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.is_dir() {
        if !uri.path().ends_with('/') {
            let location = match uri.query() {
                Some(query) => format!("{}/?{}", uri.path(), query),
                None => format!("{}/", uri.path()),
            };
            return Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response());
        }
        let index = path.join(INDEX_FILE);
        if tokio::fs::metadata(&index).await.is_ok_and(|m| m.is_file()) {
            return serve_html(&index, script).await;
        }
        return listing(path, uri.path(), script).await;
    }

    if is_html(path) {
        return serve_html(path, script).await;
    }
    let bytes = tokio::fs::read(path).await?;
    Ok(([(header::CONTENT_TYPE, content_type(path))], Body::from(bytes)).into_response())
}

async fn serve_html(path: &Path, script: &str) -> io::Result<Response> {
    let html = tokio::fs::read_to_string(path).await?;
    let html = refresh::inject(&html, script).unwrap_or(html);
    Ok(Html(html).into_response())
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

/// Content type for a file, by extension.
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" | "md" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Generated pages
// ============================================================================

fn page(title: &str, script: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body {
                (body)
                footer {
                    "Served by "
                    a href=(GENERATOR_WEBSITE) { (GENERATOR_NAME) }
                    " " (version_string())
                }
                (PreEscaped(script))
            }
        }
    }
}

async fn listing(dir: &Path, url_path: &str, script: &str) -> io::Result<Response> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().await?.is_dir();
        entries.push((is_dir, name));
    }
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let title = format!("Index of {url_path}");
    let markup = page(
        &title,
        script,
        html! {
            h1 { (title) }
            ul {
                @if url_path != "/" {
                    li { a href="../" { "../" } }
                }
                @for (is_dir, name) in &entries {
                    @let label = if *is_dir { format!("{name}/") } else { name.clone() };
                    li { a href=(urlencoding::encode(&label).replace("%2F", "/")) { (label) } }
                }
            }
        },
    );
    Ok(Html(markup.into_string()).into_response())
}

fn not_found(url_path: &str, script: &str) -> Response {
    let markup = page(
        "Not found",
        script,
        html! {
            h1 { "404 Not Found" }
            p { "Nothing is built at " code { (url_path) } " yet. This page reloads after the next build." }
        },
    );
    (StatusCode::NOT_FOUND, Html(markup.into_string())).into_response()
}

fn error_page(url_path: &str, error: &io::Error, script: &str) -> Response {
    let kind = format!("{:?}", error.kind());
    let markup = page(
        &kind,
        script,
        html! {
            h1 { "500 " (kind) }
            p { "Could not serve " code { (url_path) } ": " (error) }
        },
    );
    (StatusCode::INTERNAL_SERVER_ERROR, Html(markup.into_string())).into_response()
}
