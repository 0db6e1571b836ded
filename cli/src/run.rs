//! Headless job flow.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tokio::fs;

use phylo_client::AnalysisClient;
use phylo_config::ResolvedConfig;
use phylo_engine::{ArtifactDisplay, ArtifactPane, Phase, RenderAdapter, Session};
use phylo_types::{ArtifactKind, Generation, JobId, RenderSize, Timings};

use crate::args::RunArgs;

const RERENDERED_FILE_NAME: &str = "phylogenetic_tree_rerendered.svg";

fn client_for(config: &ResolvedConfig) -> Result<AnalysisClient> {
    AnalysisClient::new(config.service_url.clone(), config.connect_timeout)
        .context("failed to build HTTP client")
}

/// Submit, follow to completion, save artifacts, print the tree.
pub(crate) async fn run_job(args: &RunArgs, config: &ResolvedConfig) -> Result<()> {
    let fields = args.input_fields(&config.outgroup)?;
    let client = Arc::new(client_for(config)?);
    let mut session = Session::new(client.clone(), config.timings);

    let job_id = session.submit(args.mode, &fields, config.analysis).await?;
    eprintln!("Job {job_id} submitted");

    let mut last_line = String::new();
    let phase = session
        .run_to_completion(|phase| report_progress(phase, &mut last_line))
        .await
        .clone();
    match phase {
        Phase::Completed { .. } => eprintln!("Analysis complete"),
        Phase::Failed { message } => bail!("{message}"),
        other => bail!("job ended in unexpected state: {other:?}"),
    }

    fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("failed to create {}", args.out.display()))?;

    let mut pane = ArtifactPane::new(job_id.clone());
    pane.load(client.as_ref()).await;
    if let Some(size) = args.render_size() {
        rerender(&mut pane, client.as_ref(), size, &args.out).await?;
    } else if let ArtifactDisplay::Error(message) = pane.display() {
        eprintln!("Tree image unavailable: {message}");
    }

    let newick = download_all(client.as_ref(), &job_id, &args.out).await?;
    if let Some(newick) = newick {
        println!(
            "{}",
            tree_text(newick, args.expand, session.generation(), config.timings).trim_end()
        );
    }
    Ok(())
}

/// A terminal has no interactive renderer, so the tree always goes through
/// the text fallback.
fn tree_text(newick: String, expand: bool, generation: Generation, timings: Timings) -> String {
    let mut adapter = RenderAdapter::load(None, newick, generation, timings);
    match adapter.fallback_mut() {
        Some(fallback) => {
            fallback.set_expanded(expand);
            fallback.visible_text().into_owned()
        }
        None => adapter.description().to_string(),
    }
}

/// One stderr line per visible change.
fn report_progress(phase: &Phase, last_line: &mut String) {
    let Phase::Polling {
        progress,
        step_text,
        ..
    } = phase
    else {
        return;
    };
    let percent = progress.to_string();
    let line = format!("[{percent:>4}] {step_text}");
    if line != *last_line {
        eprintln!("{line}");
        *last_line = line;
    }
}

async fn rerender(
    pane: &mut ArtifactPane,
    client: &AnalysisClient,
    size: RenderSize,
    out: &Path,
) -> Result<()> {
    match pane.rerender(client, size).await {
        ArtifactDisplay::Rendered(svg) => {
            let path = out.join(RERENDERED_FILE_NAME);
            fs::write(&path, svg)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Saved {}", path.display());
        }
        ArtifactDisplay::Error(message) => eprintln!("Re-render failed: {message}"),
        ArtifactDisplay::Loading => {}
    }
    Ok(())
}

/// Save every artifact the service offers. A failed download is reported and
/// skipped. Returns the tree description when it was fetched.
async fn download_all(
    client: &AnalysisClient,
    job_id: &JobId,
    out: &Path,
) -> Result<Option<String>> {
    let mut newick = None;
    for kind in ArtifactKind::ALL {
        let bytes = match client.download(job_id, kind).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(job_id = %job_id, kind = kind.as_str(), error = %e, "Download failed");
                eprintln!("Could not download {kind}: {}", e.message());
                continue;
            }
        };
        let path: PathBuf = out.join(kind.file_name());
        fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Saved {}", path.display());
        if kind == ArtifactKind::Tree {
            newick = Some(String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    Ok(newick)
}

pub(crate) async fn print_status(config: &ResolvedConfig, job_id: &str) -> Result<()> {
    let client = client_for(config)?;
    let job_id = JobId::new(job_id.trim());
    let snapshot = client
        .status(&job_id)
        .await
        .map_err(|e| anyhow!(e.into_message()))?;
    println!(
        "{}\t{}\t{}",
        snapshot.status,
        snapshot.progress(),
        snapshot.step_text()
    );
    if let Some(message) = snapshot.message.as_deref().filter(|m| !m.is_empty()) {
        println!("{message}");
    }
    Ok(())
}
