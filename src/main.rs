//! FlipBook headless loader
//!
//! Opens one document, runs a full load and writes every page image into an
//! output directory. Useful for inspecting what the viewer would show.
//!
//! ```text
//! flipbook <document> [output-dir]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flipbook::{DocumentSource, LoadRequest, ViewerConfig, ViewerEvent, ViewerSession};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flipbook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args_os().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: flipbook <document> [output-dir]");
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pages"));

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("document path has no file name")?;

    let config = ViewerConfig::from_env();
    tracing::info!(
        "Starting FlipBook v{} (batch size {}, {} render workers)",
        env!("CARGO_PKG_VERSION"),
        config.pipeline.batch_size,
        config.workers.max_concurrent_renders
    );

    let session = ViewerSession::new(config);
    let mut events = session.subscribe();

    let handle = session.load(LoadRequest::new(DocumentSource::from_path(&input), name));

    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ViewerEvent::ChaptersExtracted { chapters, .. }) => {
                    for chapter in &chapters {
                        tracing::info!(page = chapter.page, "Chapter: {}", chapter.title);
                    }
                }
                Ok(ViewerEvent::Progress { percent, .. }) => tracing::info!("Loading... {}%", percent),
                Ok(ViewerEvent::Loaded { .. }) | Ok(ViewerEvent::Failed { .. }) => break,
                Ok(ViewerEvent::Started { .. }) => {}
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "Progress events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = handle.wait().await;
    reporter.abort();

    let pages = match result {
        Ok(pages) => pages,
        Err(e) => {
            let failure = session.snapshot().failure.map(|f| f.message);
            bail!("{}", failure.unwrap_or_else(|| e.to_string()));
        }
    };

    let written = write_pages(&session, &output)
        .await
        .with_context(|| format!("failed to write pages to {}", output.display()))?;

    tracing::info!("Wrote {} of {} pages to {}", written, pages, output.display());
    Ok(())
}

async fn write_pages(session: &ViewerSession, dir: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(dir).await?;

    let snapshot = session.snapshot();
    let width = snapshot.total_pages.to_string().len();

    for (index, page) in snapshot.pages.iter().enumerate() {
        let suffix = if page.placeholder { "-placeholder" } else { "" };
        let file = dir.join(format!(
            "page-{:0width$}{}.{}",
            index + 1,
            suffix,
            page.format.extension(),
            width = width
        ));
        tokio::fs::write(&file, page.data.as_slice()).await?;
    }

    let index = serde_json::to_vec_pretty(snapshot.chapters.as_ref())?;
    tokio::fs::write(dir.join("chapters.json"), index).await?;

    Ok(snapshot.pages.len())
}
