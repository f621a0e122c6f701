//! Theme assets.
//!
//! Everything under `theme/assets/` is copied to `build/assets/`, file by
//! file, through a table of per-extension transforms:
//!
//! | Extension | Transform | When |
//! |-----------|-----------|------|
//! | `css` | [`CssMinifier`] | production builds with minification enabled |
//! | `js` | [`JsMinifier`] | production builds with minification enabled |
//! | `less` | none by default | register a compiler with [`AssetPipeline::register`] |
//!
//! A transform may rename its output (a stylesheet compiler turns
//! `site.less` into `site.css`). Files without a transform are copied
//! byte-for-byte. Files are processed in parallel; the cancel token is
//! checked before each one.

use crate::build::BuildError;
use crate::cancel::CancelToken;
use crate::config::ProjectConfig;
use crate::minify;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to transform {path}: {reason}")]
    Transform { path: PathBuf, reason: String },
}

/// Rewrites one asset.
pub trait AssetTransform: Send + Sync {
    /// Extension of the written file, when it differs from the source's.
    fn output_extension(&self) -> Option<&str> {
        None
    }

    fn transform(&self, path: &Path, contents: Vec<u8>) -> Result<Vec<u8>, AssetError>;
}

/// Minifies UTF-8 stylesheets; other bytes pass through.
#[derive(Debug, Default, Clone, Copy)]
pub struct CssMinifier;

impl AssetTransform for CssMinifier {
    fn transform(&self, _path: &Path, contents: Vec<u8>) -> Result<Vec<u8>, AssetError> {
        Ok(match String::from_utf8(contents) {
            Ok(text) => minify::minify_css(&text).into_bytes(),
            Err(raw) => raw.into_bytes(),
        })
    }
}

/// Minifies UTF-8 scripts; other bytes pass through.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsMinifier;

impl AssetTransform for JsMinifier {
    fn transform(&self, _path: &Path, contents: Vec<u8>) -> Result<Vec<u8>, AssetError> {
        Ok(match String::from_utf8(contents) {
            Ok(text) => minify::minify_js(&text).into_bytes(),
            Err(raw) => raw.into_bytes(),
        })
    }
}

/// What happened to the assets of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetReport {
    pub copied: usize,
    pub transformed: usize,
}

/// Per-extension transform table.
#[derive(Default)]
pub struct AssetPipeline {
    transforms: BTreeMap<String, Box<dyn AssetTransform>>,
    compile_less: bool,
}

impl AssetPipeline {
    /// An empty table: every file is copied as-is.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock table for a project.
    pub fn for_project(config: &ProjectConfig, production: bool) -> Self {
        let mut pipeline = Self::new();
        pipeline.compile_less = config.enable_less;
        if production && config.enable_minification {
            pipeline.register("css", CssMinifier);
            pipeline.register("js", JsMinifier);
        }
        pipeline
    }

    /// Route files with `extension` (case-insensitive, no dot) through `transform`.
    pub fn register(&mut self, extension: &str, transform: impl AssetTransform + 'static) {
        self.transforms
            .insert(extension.to_ascii_lowercase(), Box::new(transform));
    }

    fn transform_for(&self, path: &Path) -> Option<&dyn AssetTransform> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        if extension == "less" && !self.compile_less {
            return None;
        }
        self.transforms.get(&extension).map(|t| t.as_ref())
    }

    /// Copy `source_dir` into `dest_dir` through the table.
    pub fn run(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<AssetReport, BuildError> {
        if !source_dir.is_dir() {
            debug!(path = %source_dir.display(), "no assets to copy");
            return Ok(AssetReport::default());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| BuildError::Io(e.into()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        if self.compile_less
            && !self.transforms.contains_key("less")
            && files
                .iter()
                .any(|f| f.extension().is_some_and(|e| e.eq_ignore_ascii_case("less")))
        {
            warn!("no stylesheet compiler registered, copying .less files unchanged");
        }

        let transformed = files
            .par_iter()
            .map(|file| {
                cancel.check()?;
                self.process(source_dir, dest_dir, file)
            })
            .collect::<Result<Vec<bool>, BuildError>>()?;

        let transformed_count = transformed.iter().filter(|t| **t).count();
        Ok(AssetReport {
            copied: transformed.len() - transformed_count,
            transformed: transformed_count,
        })
    }

    /// Copy or transform one file. Returns whether a transform ran.
    fn process(&self, source_dir: &Path, dest_dir: &Path, file: &Path) -> Result<bool, BuildError> {
        let relative = file.strip_prefix(source_dir).unwrap_or(file);
        let mut destination = dest_dir.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        match self.transform_for(file) {
            Some(transform) => {
                let contents = fs::read(file)?;
                let output = transform.transform(file, contents)?;
                if let Some(extension) = transform.output_extension() {
                    destination.set_extension(extension);
                }
                fs::write(&destination, output)?;
                Ok(true)
            }
            None => {
                fs::copy(file, &destination)?;
                Ok(false)
            }
        }
    }
}
