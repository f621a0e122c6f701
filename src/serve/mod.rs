//! Live preview.
//!
//! `quire serve` builds the project, serves `build/` over HTTP and rebuilds
//! whenever the project changes. Pages served in the browser poll the server
//! and reload themselves after each successful rebuild.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──► Building ──► Serving ◄──► Rebuilding
//!             │            │             │
//!             └────────────┴─────────────┴──► Stopped
//! ```
//!
//! - **Building**: one full load and build. Failure here ends the command.
//! - **Serving**: HTTP server bound, watcher running, browser opened. A port
//!   that is already taken ends the command with [`ServeError::PortInUse`].
//! - **Rebuilding**: triggered by the watcher or, in manual mode, by the
//!   operator pressing Enter. Failures are logged; the server keeps serving.
//! - **Stopped**: Ctrl+C, operator text in manual mode, or
//!   [`Interrupt::interrupt`] from any thread.
//!
//! ## Threads
//!
//! The HTTP server runs on a tokio runtime. The watcher callback, the rebuild
//! worker and the operator prompt are plain threads talking over a channel.
//! The state they share lives in [`SiteState`]; the last-build time is only
//! advanced after a build has written every file.

mod http;
mod refresh;
mod watcher;

pub use http::{content_type, resolve_request_path, router};
pub use refresh::{inject as inject_refresh_script, script as refresh_script};
pub use watcher::{RebuildKind, RebuildPolicy, Watcher, is_watched, should_reload_project};

use crate::build::{self, BuildError, BuildMode};
use crate::cancel::CancelToken;
use crate::events::BuildEvent;
use crate::output;
use crate::project::{BUILD_DIR, LoadError, Project};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PORT: u16 = 4444;

/// Path of the last-build endpoint, without the leading `/`.
pub const LAST_BUILD_ENDPOINT: &str = "lastbuild";

/// Watcher debounce interval; served pages poll at the same rate.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("port {port} is already in use; stop whatever is using it or pick another port")]
    PortInUse { port: u16 },
    #[error("cannot listen on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub port: u16,
    /// Read rebuild/stop commands from stdin.
    pub manual_rebuild: bool,
    pub open_browser: bool,
    /// Rebuild plain edits without reloading the project.
    pub render_only_edits: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            manual_rebuild: false,
            open_browser: true,
            render_only_edits: false,
        }
    }
}

// ============================================================================
// Lifecycle state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServePhase {
    Idle,
    Building,
    Serving,
    Rebuilding,
    Stopped,
}

impl ServePhase {
    pub fn can_transition_to(self, next: ServePhase) -> bool {
        use ServePhase::*;
        matches!(
            (self, next),
            (Idle, Building)
                | (Building, Serving)
                | (Serving, Rebuilding)
                | (Rebuilding, Serving)
                | (Idle | Building | Serving | Rebuilding, Stopped)
        )
    }
}

/// State shared between the HTTP handlers, the rebuild worker and the
/// watcher.
#[derive(Debug)]
pub struct SiteState {
    last_build: AtomicU64,
    build_dir: RwLock<PathBuf>,
    project: RwLock<Option<Arc<Project>>>,
    phase: Mutex<ServePhase>,
}

impl SiteState {
    pub fn new(build_dir: PathBuf) -> Self {
        Self {
            last_build: AtomicU64::new(0),
            build_dir: RwLock::new(build_dir),
            project: RwLock::new(None),
            phase: Mutex::new(ServePhase::Idle),
        }
    }

    /// Completion time of the last successful build, milliseconds since the
    /// epoch. `0` before the first build.
    pub fn last_build(&self) -> u64 {
        self.last_build.load(Ordering::SeqCst)
    }

    /// Record a finished build. The stored value always increases, even if
    /// the clock does not. Returns the stored value.
    pub fn mark_built(&self, at: u64) -> u64 {
        let mut stored = at;
        let _ = self
            .last_build
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |previous| {
                stored = at.max(previous + 1);
                Some(stored)
            });
        stored
    }

    pub fn build_dir(&self) -> PathBuf {
        self.build_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_build_dir(&self, dir: PathBuf) {
        *self.build_dir.write().unwrap_or_else(PoisonError::into_inner) = dir;
    }

    pub fn project(&self) -> Option<Arc<Project>> {
        self.project
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a freshly loaded project.
    pub fn set_project(&self, project: Arc<Project>) {
        self.set_build_dir(project.build_dir());
        *self.project.write().unwrap_or_else(PoisonError::into_inner) = Some(project);
    }

    pub fn phase(&self) -> ServePhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` if the lifecycle allows it. Returns whether it did.
    pub fn transition(&self, next: ServePhase) -> bool {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !phase.can_transition_to(next) {
            debug!(from = ?*phase, to = ?next, "ignoring phase change");
            return false;
        }
        debug!(from = ?*phase, to = ?next, "serve phase");
        *phase = next;
        true
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ============================================================================
// Interrupt
// ============================================================================

/// Stops a running preview. Cloneable, callable from any thread, and safe to
/// call any number of times.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    stopped: CancelToken,
    current_build: Arc<Mutex<CancelToken>>,
    notify: Arc<Notify>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.stopped.cancel();
        self.cancel_build();
        self.notify.notify_one();
    }

    pub fn is_interrupted(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// A token for a new build, cancelled by the next change or by `interrupt`.
    fn begin_build(&self) -> CancelToken {
        let token = CancelToken::new();
        if self.is_interrupted() {
            token.cancel();
        }
        *self.current_build.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    fn cancel_build(&self) {
        self.current_build
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    async fn wait(&self) {
        while !self.is_interrupted() {
            self.notify.notified().await;
        }
    }
}

// ============================================================================
// Operator commands
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Rebuild,
    Stop,
}

/// An empty line rebuilds; anything else stops the server.
pub fn operator_command(line: &str) -> OperatorCommand {
    if line.trim().is_empty() {
        OperatorCommand::Rebuild
    } else {
        OperatorCommand::Stop
    }
}

fn spawn_operator_prompt(requests: Sender<Request>, interrupt: Interrupt) -> io::Result<()> {
    thread::Builder::new()
        .name("quire-prompt".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match operator_command(&line) {
                    OperatorCommand::Rebuild => {
                        if requests.send(Request::Manual).is_err() {
                            break;
                        }
                    }
                    OperatorCommand::Stop => {
                        info!("stop requested");
                        interrupt.interrupt();
                        break;
                    }
                }
            }
        })?;
    Ok(())
}

// ============================================================================
// Rebuild worker
// ============================================================================

#[derive(Debug)]
enum Request {
    Changed(Vec<PathBuf>),
    Manual,
    Stop,
}

struct Rebuilder {
    root: PathBuf,
    policy: RebuildPolicy,
    site: Arc<SiteState>,
    interrupt: Interrupt,
    progress: Option<Sender<BuildEvent>>,
}

impl Rebuilder {
    /// Handle requests until told to stop. Requests that queue up during a
    /// rebuild are merged into one.
    fn run(self, requests: Receiver<Request>) {
        while let Ok(first) = requests.recv() {
            let mut batch = vec![first];
            batch.extend(requests.try_iter());
            if self.interrupt.is_interrupted() || batch.iter().any(|r| matches!(r, Request::Stop)) {
                break;
            }

            let manual = batch.iter().any(|r| matches!(r, Request::Manual));
            let changes: Vec<PathBuf> = batch
                .into_iter()
                .filter_map(|r| match r {
                    Request::Changed(paths) => Some(paths),
                    _ => None,
                })
                .flatten()
                .collect();
            let kind = if manual {
                RebuildKind::Reload
            } else {
                self.policy
                    .decide(&self.root, self.site.project().as_deref(), &changes)
            };
            self.rebuild(kind);
        }
        debug!("rebuild worker stopped");
    }

    fn rebuild(&self, kind: RebuildKind) {
        if !self.site.transition(ServePhase::Rebuilding) {
            return;
        }
        info!(?kind, "rebuilding");
        if let Some(project) = self.project_for(kind) {
            let cancel = self.interrupt.begin_build();
            match build::build(&project, BuildMode::Preview, &cancel, self.progress.as_ref()) {
                Ok(_) => {
                    let at = self.site.mark_built(now_millis());
                    debug!(last_build = at, "rebuild published");
                }
                Err(e) if e.is_interrupted() => debug!("rebuild abandoned"),
                Err(e) => error!(error = %e, "rebuild failed"),
            }
        }
        self.site.transition(ServePhase::Serving);
    }

    /// The project to build: reloaded from disk, or the current one.
    fn project_for(&self, kind: RebuildKind) -> Option<Arc<Project>> {
        if kind == RebuildKind::RenderOnly
            && let Some(project) = self.site.project()
        {
            return Some(project);
        }
        match Project::load(&self.root) {
            Ok(project) => {
                let project = Arc::new(project);
                self.site.set_project(Arc::clone(&project));
                Some(project)
            }
            Err(e) => {
                error!(error = %e, "project failed to load, keeping the previous build");
                crate::events::emit(
                    self.progress.as_ref(),
                    BuildEvent::Failed {
                        message: e.to_string(),
                    },
                );
                None
            }
        }
    }
}

// ============================================================================
// Serve
// ============================================================================

/// Bind the preview port on localhost.
pub async fn bind(port: u16) -> Result<TcpListener, ServeError> {
    TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::AddrInUse => ServeError::PortInUse { port },
            _ => ServeError::Bind { port, source: e },
        })
}

/// Build and serve the project at `root` until interrupted. Blocks.
pub fn serve(
    root: &Path,
    options: &ServeOptions,
    progress: Option<Sender<BuildEvent>>,
) -> Result<(), ServeError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(root, options, progress, Interrupt::new()))
}

/// [`serve`] on an existing runtime, stoppable through `interrupt`.
pub async fn run(
    root: &Path,
    options: &ServeOptions,
    progress: Option<Sender<BuildEvent>>,
    interrupt: Interrupt,
) -> Result<(), ServeError> {
    // Watcher events carry canonical paths.
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let site = Arc::new(SiteState::new(root.join(BUILD_DIR)));

    site.transition(ServePhase::Building);
    let project = {
        let root = root.clone();
        let progress = progress.clone();
        let cancel = interrupt.begin_build();
        tokio::task::spawn_blocking(move || -> Result<Project, ServeError> {
            let project = Project::load(&root)?;
            build::build(&project, BuildMode::Preview, &cancel, progress.as_ref())?;
            Ok(project)
        })
        .await
        .map_err(io::Error::other)?
    };
    let project = match project {
        Ok(project) => project,
        Err(e) => {
            site.transition(ServePhase::Stopped);
            return Err(e);
        }
    };
    site.set_project(Arc::new(project));
    site.mark_built(now_millis());

    let listener = match bind(options.port).await {
        Ok(listener) => listener,
        Err(e) => {
            site.transition(ServePhase::Stopped);
            return Err(e);
        }
    };
    site.transition(ServePhase::Serving);

    let (requests, receiver) = mpsc::channel();
    let watcher = {
        let requests = requests.clone();
        let interrupt = interrupt.clone();
        Watcher::start(&root, POLL_INTERVAL, move |paths| {
            interrupt.cancel_build();
            let _ = requests.send(Request::Changed(paths));
        })?
    };
    let worker = {
        let rebuilder = Rebuilder {
            root: root.clone(),
            policy: RebuildPolicy {
                render_only_edits: options.render_only_edits,
            },
            site: Arc::clone(&site),
            interrupt: interrupt.clone(),
            progress,
        };
        thread::Builder::new()
            .name("quire-rebuild".into())
            .spawn(move || rebuilder.run(receiver))?
    };
    if options.manual_rebuild {
        spawn_operator_prompt(requests.clone(), interrupt.clone())?;
    }

    output::print_serve_banner(&site.build_dir(), options.port, options.manual_rebuild);
    let url = format!("http://localhost:{}", options.port);
    if options.open_browser && let Err(e) = open::that(&url) {
        warn!(error = %e, url = %url, "could not open a browser");
    }

    let served = axum::serve(listener, router(Arc::clone(&site)))
        .with_graceful_shutdown(shutdown_signal(interrupt.clone()))
        .await;

    // Each stop step runs even if an earlier one failed.
    interrupt.interrupt();
    site.transition(ServePhase::Stopped);
    if let Err(e) = watcher.stop() {
        warn!(error = %e, "failed to stop the file watcher");
    }
    let _ = requests.send(Request::Stop);
    drop(requests);
    match tokio::task::spawn_blocking(move || worker.join()).await {
        Ok(Ok(())) => {}
        _ => warn!("rebuild worker did not stop cleanly"),
    }
    info!("preview server stopped");
    served?;
    Ok(())
}

async fn shutdown_signal(interrupt: Interrupt) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = ctrl_c => info!("interrupted"),
        _ = interrupt.wait() => {}
    }
    interrupt.interrupt();
}
