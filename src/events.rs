//! Build lifecycle events.
//!
//! The orchestrator reports progress by sending [`BuildEvent`]s over an
//! optional channel; the CLI prints them from a dedicated thread (see
//! [`crate::output::format_build_event`]). Library callers that don't care
//! pass `None`.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// The stages of a build, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    CleanBuildDirectory,
    RenderPages,
    SearchPage,
    CopyContent,
    RedirectPage,
    CopyAssets,
}

impl BuildStep {
    pub fn label(self) -> &'static str {
        match self {
            Self::CleanBuildDirectory => "Cleaning build directory",
            Self::RenderPages => "Rendering pages",
            Self::SearchPage => "Writing search page",
            Self::CopyContent => "Copying content files",
            Self::RedirectPage => "Writing language redirect",
            Self::CopyAssets => "Copying theme assets",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Started {
        project: String,
    },
    Step(BuildStep),
    PageRendered {
        url: String,
    },
    /// A page failed to render; the build carried on without it.
    PageSkipped {
        source: PathBuf,
        reason: String,
    },
    /// Two content files map to the same output URL; the first one won.
    LoadConflict {
        source: PathBuf,
        winner: PathBuf,
        url: String,
    },
    /// A content file would overwrite a generated file and was not copied.
    CopyConflict {
        source: PathBuf,
        destination: PathBuf,
    },
    Finished {
        pages: usize,
        elapsed: Duration,
    },
    Failed {
        message: String,
    },
}

/// Send `event` if anyone is listening. A hung-up receiver is ignored.
pub fn emit(progress: Option<&Sender<BuildEvent>>, event: BuildEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}
