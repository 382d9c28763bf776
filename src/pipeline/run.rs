//! Batched rasterization of one document
//!
//! ```text
//! check ─► chapters() ─► check ─┬─► check ─► rasterize batch ─► check ─► progress ─┐
//!                               └──────────────────────────────────────────────────┘
//! ```
//!
//! Pages within a batch render concurrently, batches run one after another.
//! The adapter is closed when the run ends, whatever the outcome.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use super::cancel::RunToken;
use super::error::LoadError;
use super::progress::{percent, RunObserver};
use crate::config::PipelineConfig;
use crate::document::{Chapter, DocumentAdapter, PageImage, RasterOptions};

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// One image per page, in page order
    pub pages: Vec<PageImage>,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone)]
pub struct RasterPipeline {
    batch_size: usize,
}

impl RasterPipeline {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Rasterize every page of `adapter`
    ///
    /// Returns `LoadError::Cancelled` as soon as `token` is found cancelled;
    /// nothing is reported to `observer` after that point.
    pub async fn run(
        &self,
        adapter: Arc<dyn DocumentAdapter>,
        options: RasterOptions,
        token: &RunToken,
        observer: &dyn RunObserver,
    ) -> Result<RunOutput, LoadError> {
        let result = self.drive(adapter.as_ref(), &options, token, observer).await;
        adapter.close().await;
        result
    }

    async fn drive(
        &self,
        adapter: &dyn DocumentAdapter,
        options: &RasterOptions,
        token: &RunToken,
        observer: &dyn RunObserver,
    ) -> Result<RunOutput, LoadError> {
        token.check()?;

        let chapters = match adapter.chapters().await {
            Ok(chapters) => chapters,
            Err(e) => {
                warn!(run = token.id(), error = %e, "Outline extraction failed, continuing without chapters");
                Vec::new()
            }
        };

        token.check()?;
        observer.chapters(token, &chapters);

        let total = adapter.page_count();
        if total == 0 {
            return Err(LoadError::Empty);
        }

        debug!(
            run = token.id(),
            pages = total,
            chapters = chapters.len(),
            format = adapter.format().label(),
            "Rasterizing"
        );

        let mut pages = Vec::with_capacity(total);

        for start in (0..total).step_by(self.batch_size) {
            token.check()?;

            let end = (start + self.batch_size).min(total);
            let batch = try_join_all((start..end).map(|index| adapter.rasterize(index, options))).await;

            // A superseded run never surfaces its failures
            token.check()?;
            pages.extend(batch?);

            if pages.len() < total {
                observer.progress(token, percent(pages.len(), total));
            }
        }

        Ok(RunOutput { pages, chapters })
    }
}

impl Default for RasterPipeline {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use parking_lot::Mutex;

    use crate::document::DocumentError;
    use crate::testing::FakeAdapter;

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<u8>>,
        chapters: Mutex<Option<Vec<Chapter>>>,
    }

    impl RunObserver for Recorder {
        fn chapters(&self, _token: &RunToken, chapters: &[Chapter]) {
            *self.chapters.lock() = Some(chapters.to_vec());
        }

        fn progress(&self, _token: &RunToken, percent: u8) {
            self.progress.lock().push(percent);
        }
    }

    async fn run(adapter: &Arc<FakeAdapter>, token: &RunToken, recorder: &Recorder) -> Result<RunOutput, LoadError> {
        let adapter: Arc<dyn DocumentAdapter> = adapter.clone();
        RasterPipeline::new(3)
            .run(adapter, RasterOptions::default(), token, recorder)
            .await
    }

    #[tokio::test]
    async fn test_pages_in_order_with_floor_progress() {
        let adapter = Arc::new(FakeAdapter::new("a", 7).with_chapters(vec![Chapter::new("One", 1)]));
        let recorder = Recorder::default();

        let output = run(&adapter, &RunToken::new(1), &recorder).await.unwrap();

        let labels: Vec<String> = output.pages.iter().map(FakeAdapter::label).collect();
        assert_eq!(labels, (0..7).map(|i| format!("a:{}:0", i)).collect::<Vec<_>>());
        assert_eq!(output.chapters, vec![Chapter::new("One", 1)]);
        // 100 belongs to the commit, not the pipeline
        assert_eq!(*recorder.progress.lock(), vec![42, 85]);
        assert_eq!(recorder.chapters.lock().as_ref().map(Vec::len), Some(1));
        assert!(adapter.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_outline_failure_is_not_fatal() {
        let adapter = Arc::new(FakeAdapter::new("a", 2).with_broken_outline());
        let output = run(&adapter, &RunToken::new(1), &Recorder::default()).await.unwrap();

        assert_eq!(output.pages.len(), 2);
        assert!(output.chapters.is_empty());
    }

    #[tokio::test]
    async fn test_page_failure_fails_run() {
        let adapter = Arc::new(FakeAdapter::new("a", 5).with_failing_page(3));
        let recorder = Recorder::default();

        let result = run(&adapter, &RunToken::new(1), &recorder).await;

        assert!(matches!(result, Err(LoadError::Document(DocumentError::RenderError(_)))));
        assert_eq!(*recorder.progress.lock(), vec![60]);
        assert!(adapter.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_empty_document() {
        let adapter = Arc::new(FakeAdapter::new("a", 0));
        let result = run(&adapter, &RunToken::new(1), &Recorder::default()).await;

        assert!(matches!(result, Err(LoadError::Empty)));
        assert!(adapter.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let adapter = Arc::new(FakeAdapter::new("a", 3));
        let token = RunToken::new(1);
        token.cancel();

        let result = run(&adapter, &token, &Recorder::default()).await;

        assert!(matches!(result, Err(LoadError::Cancelled)));
        assert_eq!(adapter.rendered.load(Ordering::SeqCst), 0);
        assert!(adapter.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_stops_further_batches() {
        let adapter = Arc::new(FakeAdapter::new("a", 9).gated());
        let token = RunToken::new(1);
        let recorder = Arc::new(Recorder::default());

        let task = {
            let adapter = Arc::clone(&adapter);
            let token = token.clone();
            let recorder = Arc::clone(&recorder);
            tokio::spawn(async move { run(&adapter, &token, &recorder).await })
        };

        adapter.started.notified().await;
        token.cancel();
        adapter.release(3);

        let result = task.await.unwrap();

        assert!(matches!(result, Err(LoadError::Cancelled)));
        assert!(recorder.progress.lock().is_empty());
        assert_eq!(adapter.rendered.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_hides_page_failure() {
        let adapter = Arc::new(FakeAdapter::new("a", 3).with_failing_page(0).gated());
        let token = RunToken::new(1);

        let task = {
            let adapter = Arc::clone(&adapter);
            let token = token.clone();
            tokio::spawn(async move { run(&adapter, &token, &Recorder::default()).await })
        };

        adapter.started.notified().await;
        token.cancel();
        adapter.release(3);

        assert!(matches!(task.await.unwrap(), Err(LoadError::Cancelled)));
    }
}
