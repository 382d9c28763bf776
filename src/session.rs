//! Viewer session
//!
//! The single entry point a presentation layer talks to. A session owns the
//! active load run, the committed [`PageStore`], the progress counter and the
//! loading/failure flags.
//!
//! # Run lifecycle
//!
//! ```text
//! load(B) ──► cancel(A) ─► progress = 0 ─► spawn run B
//!                                              │
//!            open adapter ─► chapters ─► batches (progress events)
//!                                              │
//!                     ┌────────────────────────┼──────────────────────┐
//!                     ▼                        ▼                      ▼
//!               commit store,           failure flag set,        cancelled:
//!               progress = 100          store untouched          nothing touched
//! ```
//!
//! Every mutation of shared state happens under the session lock after
//! checking that the run is still the active one, so a superseded run can
//! neither commit pages nor emit events once a newer run has started.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ViewerConfig;
use crate::document::{AdapterFactory, Chapter, DocumentError, LoadRequest, PageImage, Rotation};
use crate::formats::MupdfAdapterFactory;
use crate::mupdf::{RenderWorkers, SharedRenderWorkers};
use crate::pipeline::{LoadError, RasterPipeline, RunObserver, RunOutput, RunToken};
use crate::store::PageStore;

/// Capacity of the event channel; slow subscribers lag rather than block runs
const EVENT_CAPACITY: usize = 256;

/// What the presentation layer shows when a load fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Open or page render failure
    Document,
    /// No pages; the user can retry by selecting the file again
    Empty,
}

impl LoadFailure {
    fn from_error(err: &LoadError) -> Self {
        match err {
            LoadError::Empty => Self {
                kind: FailureKind::Empty,
                message: "The document has no pages. Select the file again to retry.".to_string(),
            },
            other => Self {
                kind: FailureKind::Document,
                message: other.to_string(),
            },
        }
    }
}

/// Session events, in the order they happen within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewerEvent {
    Started { run: u64 },
    ChaptersExtracted { run: u64, chapters: Vec<Chapter> },
    Progress { run: u64, percent: u8 },
    Loaded { run: u64, pages: usize },
    Failed { run: u64, failure: LoadFailure },
}

impl ViewerEvent {
    pub fn run(&self) -> u64 {
        match self {
            Self::Started { run }
            | Self::ChaptersExtracted { run, .. }
            | Self::Progress { run, .. }
            | Self::Loaded { run, .. }
            | Self::Failed { run, .. } => *run,
        }
    }
}

/// Point-in-time view of the session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub pages: Arc<Vec<PageImage>>,
    pub total_pages: usize,
    pub chapters: Arc<Vec<Chapter>>,
    pub progress: u8,
    pub loading: bool,
    pub failure: Option<LoadFailure>,
    pub rotation: Rotation,
}

/// Handle to a spawned load run
pub struct RunHandle {
    run: u64,
    task: JoinHandle<Result<usize, LoadError>>,
}

impl RunHandle {
    pub fn run(&self) -> u64 {
        self.run
    }

    /// Wait for the run to end; `Ok` carries the committed page count
    pub async fn wait(self) -> Result<usize, LoadError> {
        self.task
            .await
            .map_err(|e| LoadError::Document(DocumentError::WorkerError(e.to_string())))?
    }
}

/// Shared viewer session
#[derive(Clone)]
pub struct ViewerSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: ViewerConfig,
    factory: Arc<dyn AdapterFactory>,
    pipeline: RasterPipeline,
    events: broadcast::Sender<ViewerEvent>,
    next_run: AtomicU64,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    active: Option<RunToken>,
    store: PageStore,
    /// Page count of the open document; known before any page is rendered
    total_pages: usize,
    progress: u8,
    loading: bool,
    failure: Option<LoadFailure>,
    rotation: Rotation,
    /// Retained so a rotation change can reload the same document
    request: Option<LoadRequest>,
}

impl SessionState {
    fn is_active(&self, token: &RunToken) -> bool {
        !token.is_cancelled()
            && self
                .active
                .as_ref()
                .is_some_and(|active| active.same_run(token))
    }
}

impl ViewerSession {
    /// Session rendering through MuPDF with a worker pool sized from `config`
    pub fn new(config: ViewerConfig) -> Self {
        let workers: SharedRenderWorkers = Arc::new(RenderWorkers::from_config(&config.workers));
        let factory = Arc::new(MupdfAdapterFactory::new(config.epub.clone(), workers));
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: ViewerConfig, factory: Arc<dyn AdapterFactory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(SessionInner {
                pipeline: RasterPipeline::from_config(&config.pipeline),
                config,
                factory,
                events,
                next_run: AtomicU64::new(1),
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.inner.config
    }

    /// Start loading a document, superseding any run in progress
    pub fn load(&self, request: LoadRequest) -> RunHandle {
        let mut state = self.inner.state.lock();
        self.start(&mut state, request)
    }

    /// Change the page rotation
    ///
    /// Clears the page store immediately and reloads the current document at
    /// the new rotation. Returns `None` when nothing needs to be loaded.
    pub fn set_rotation(&self, rotation: Rotation) -> Option<RunHandle> {
        let mut state = self.inner.state.lock();
        if state.rotation == rotation {
            return None;
        }
        state.rotation = rotation;
        state.store = PageStore::default();

        let request = state.request.clone()?;
        Some(self.start(&mut state, request))
    }

    /// Replace the active run; the caller holds the session lock throughout
    fn start(&self, state: &mut SessionState, request: LoadRequest) -> RunHandle {
        let run = self.inner.next_run.fetch_add(1, Ordering::Relaxed);
        let token = RunToken::new(run);

        if let Some(previous) = state.active.replace(token.clone()) {
            previous.cancel();
            debug!(run = previous.id(), superseded_by = run, "Cancelling previous run");
        }
        state.progress = 0;
        state.loading = true;
        state.failure = None;
        state.request = Some(request.clone());
        let rotation = state.rotation;
        let _ = self.inner.events.send(ViewerEvent::Started { run });

        info!(run, name = %request.name, rotation = rotation.degrees(), "Load started");

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.execute(token, request, rotation).await });

        RunHandle { run, task }
    }

    pub fn rotation(&self) -> Rotation {
        self.inner.state.lock().rotation
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock();
        SessionSnapshot {
            pages: Arc::clone(state.store.pages()),
            total_pages: state.total_pages,
            chapters: Arc::clone(state.store.chapters()),
            progress: state.progress,
            loading: state.loading,
            failure: state.failure.clone(),
            rotation: state.rotation,
        }
    }

    /// Committed page store
    pub fn store(&self) -> PageStore {
        self.inner.state.lock().store.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.inner.events.subscribe()
    }

    /// Cancel the active run, if any
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if let Some(active) = state.active.take() {
            active.cancel();
            debug!(run = active.id(), "Session closed, run cancelled");
        }
        state.loading = false;
        state.total_pages = state.store.len();
    }
}

impl SessionInner {
    async fn execute(
        &self,
        token: RunToken,
        request: LoadRequest,
        rotation: Rotation,
    ) -> Result<usize, LoadError> {
        match self.produce(&token, &request, rotation).await {
            Ok(output) => self.commit(&token, output, rotation),
            Err(LoadError::Cancelled) => {
                debug!(run = token.id(), "Run cancelled");
                Err(LoadError::Cancelled)
            }
            Err(err) => self.fail(&token, err),
        }
    }

    async fn produce(
        &self,
        token: &RunToken,
        request: &LoadRequest,
        rotation: Rotation,
    ) -> Result<RunOutput, LoadError> {
        token.check()?;

        let adapter = self.factory.open(request).await?;
        self.opened(token, adapter.page_count());
        let options = self.config.raster_options(adapter.format(), rotation);

        self.pipeline.run(adapter, options, token, self).await
    }

    fn opened(&self, token: &RunToken, pages: usize) {
        let mut state = self.state.lock();
        if state.is_active(token) {
            state.total_pages = pages;
        }
    }

    fn commit(&self, token: &RunToken, output: RunOutput, rotation: Rotation) -> Result<usize, LoadError> {
        let mut state = self.state.lock();
        if !state.is_active(token) {
            debug!(run = token.id(), "Run superseded before commit");
            return Err(LoadError::Cancelled);
        }

        let pages = output.pages.len();
        state.store = PageStore::new(output.pages, output.chapters, rotation, token.id());
        state.total_pages = pages;
        state.progress = 100;
        state.loading = false;
        state.active = None;
        let _ = self.events.send(ViewerEvent::Loaded {
            run: token.id(),
            pages,
        });

        info!(run = token.id(), pages, "Document loaded");
        Ok(pages)
    }

    fn fail(&self, token: &RunToken, err: LoadError) -> Result<usize, LoadError> {
        let mut state = self.state.lock();
        if !state.is_active(token) {
            debug!(run = token.id(), error = %err, "Superseded run failed");
            return Err(LoadError::Cancelled);
        }

        let failure = LoadFailure::from_error(&err);
        state.failure = Some(failure.clone());
        state.total_pages = state.store.len();
        state.loading = false;
        state.active = None;
        let _ = self.events.send(ViewerEvent::Failed {
            run: token.id(),
            failure,
        });

        error!(run = token.id(), error = %err, "Load failed");
        Err(err)
    }
}

impl RunObserver for SessionInner {
    fn chapters(&self, token: &RunToken, chapters: &[Chapter]) {
        let state = self.state.lock();
        if !state.is_active(token) {
            return;
        }
        let _ = self.events.send(ViewerEvent::ChaptersExtracted {
            run: token.id(),
            chapters: chapters.to_vec(),
        });
    }

    fn progress(&self, token: &RunToken, percent: u8) {
        let mut state = self.state.lock();
        if !state.is_active(token) || percent < state.progress {
            return;
        }
        state.progress = percent;
        let _ = self.events.send(ViewerEvent::Progress {
            run: token.id(),
            percent,
        });
    }
}
