//! Command-line arguments and how they combine with the config file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use url::Url;

use phylo_config::{PhyloConfig, ResolvedConfig};
use phylo_types::{InputFields, Outgroup, RenderSize, TreeTool, Upload, WorkflowMode};

#[derive(Debug, Parser)]
#[command(name = "phylo", version, about = "Build phylogenetic trees on a remote analysis service")]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.phylo/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the analysis service.
    #[arg(long, global = true, value_name = "URL")]
    pub service_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Submit a job, follow it to completion and save its artifacts.
    Run(RunArgs),
    /// Print the current status of an existing job.
    Status { job_id: String },
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    /// 1 = aligned matrix, 2 = add sequences to an alignment, 3 = align from scratch.
    #[arg(long)]
    pub mode: WorkflowMode,

    /// Aligned matrix (mode 1) or raw matrix (mode 3).
    #[arg(long, value_name = "FILE")]
    pub matrix: Option<PathBuf>,

    /// Existing alignment for mode 2. Omit to use the service default.
    #[arg(long, value_name = "FILE")]
    pub alignment: Option<PathBuf>,

    /// Sequences to add (mode 2) or user sequences (mode 3).
    #[arg(long, value_name = "FILE", conflicts_with = "sequences_text")]
    pub sequences: Option<PathBuf>,

    /// Pasted FASTA text instead of --sequences.
    #[arg(long, value_name = "TEXT")]
    pub sequences_text: Option<String>,

    #[arg(long)]
    pub outgroup: Option<String>,

    /// skip, fasttree or iqtree.
    #[arg(long)]
    pub tool: Option<TreeTool>,

    /// Bootstrap replicates (only used by iqtree).
    #[arg(long, value_name = "N")]
    pub bootstrap: Option<u32>,

    /// Directory for downloaded artifacts.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,

    /// Re-render the tree image at this width.
    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    /// Re-render the tree image at this height.
    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    /// Print the whole tree description instead of a one-line preview.
    #[arg(long)]
    pub expand: bool,
}

impl RunArgs {
    /// Flags win over the config file.
    pub fn apply_overrides(
        &self,
        config: ResolvedConfig,
        service_url: Option<&str>,
    ) -> Result<ResolvedConfig> {
        let mut config = with_service_url(config, service_url)?;
        if let Some(outgroup) = &self.outgroup {
            config.outgroup = Outgroup::or_default(Some(outgroup));
        }
        if let Some(tool) = self.tool {
            config.analysis.tool = tool;
        }
        if let Some(bootstrap) = self.bootstrap {
            config.analysis.bootstrap_replicates = bootstrap;
        }
        Ok(config)
    }

    /// `None` unless a re-render was asked for.
    pub fn render_size(&self) -> Option<RenderSize> {
        (self.width.is_some() || self.height.is_some())
            .then(|| RenderSize::new(self.width, self.height))
    }

    /// Read every referenced file. Which ones matter is decided later by
    /// the input builder.
    pub fn input_fields(&self, outgroup: &Outgroup) -> Result<InputFields> {
        let matrix = self.matrix.as_deref().map(read_upload).transpose()?;
        let (aligned_matrix, raw_matrix) = match self.mode {
            WorkflowMode::PreAligned => (matrix, None),
            WorkflowMode::AlignFromScratch => (None, matrix),
            WorkflowMode::AugmentAlignment => (None, None),
        };
        Ok(InputFields {
            outgroup: Some(outgroup.as_str().to_string()),
            aligned_matrix,
            existing_alignment: self.alignment.as_deref().map(read_upload).transpose()?,
            raw_matrix,
            sequences_file: self.sequences.as_deref().map(read_upload).transpose()?,
            sequences_text: self.sequences_text.clone(),
        })
    }
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<ResolvedConfig> {
    let raw = match path {
        Some(path) => PhyloConfig::load_from(path)?,
        None => PhyloConfig::load()?.unwrap_or_default(),
    };
    Ok(raw.resolve()?)
}

pub(crate) fn with_service_url(
    mut config: ResolvedConfig,
    service_url: Option<&str>,
) -> Result<ResolvedConfig> {
    if let Some(raw) = service_url {
        config.service_url =
            Url::parse(raw.trim()).with_context(|| format!("invalid service url '{raw}'"))?;
    }
    Ok(config)
}

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
    Ok(Upload::new(file_name, bytes))
}
