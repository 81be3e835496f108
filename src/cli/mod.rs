pub mod commands;

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::ExplorerError;
use crate::graph::{NodeKey, VariantKind};
use crate::layout::LayoutMode;
use crate::tasks::FlowType;
use crate::view::Palette;

#[derive(Parser)]
#[command(name = "kgscope")]
#[command(author = "kgscope developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Explore knowledge graphs: anchor-pruned views, 2D/3D force layout, selection and task export", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to <config dir>/kgscope/config.toml)
    #[arg(long, global = true, env = "KGSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long, default_value = "false")]
        force: bool,
    },

    /// Resolve a graph view and print its statistics
    Stats {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of best-connected nodes to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Run layout frames and write node positions as JSON
    Layout {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Lay out, replay clicks and export a rendered frame
    Render {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Clicks to replay before rendering, as <type>:<id>@<millis>
        #[arg(long = "click", value_name = "CLICK")]
        clicks: Vec<ClickEvent>,

        #[command(flatten)]
        interaction: InteractionArgs,

        /// Hover a node after the replay, as <type>:<id>
        #[arg(long, value_name = "KEY")]
        hover: Option<NodeKey>,

        /// Pin the selection so everything outside its focus is dimmed
        #[arg(long, default_value = "false")]
        pin: bool,

        /// Color palette (overrides config)
        #[arg(long)]
        palette: Option<Palette>,

        /// Node size in percent (overrides config)
        #[arg(long)]
        size: Option<f32>,

        /// Export format
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replay clicks, print the selection and its task payload
    Select {
        #[command(flatten)]
        source: SourceArgs,

        /// Clicks to replay, as <type>:<id>@<millis>
        #[arg(long = "click", value_name = "CLICK", required = true)]
        clicks: Vec<ClickEvent>,

        #[command(flatten)]
        interaction: InteractionArgs,

        /// Submit the payload to the task API
        #[arg(long, default_value = "false")]
        submit: bool,

        /// Flow types to submit
        #[arg(long = "flow", default_value = "collect")]
        flows: Vec<FlowType>,

        /// Ask the task API to use LLM assistance (overrides config)
        #[arg(long)]
        llm_assist: Option<bool>,

        /// Task API endpoint (overrides config)
        #[arg(long, env = "KGSCOPE_TASK_ENDPOINT")]
        endpoint: Option<String>,
    },
}

/// Where the graph comes from and which view of it to resolve.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Graph JSON file ({nodes, edges})
    #[arg(short, long, conflicts_with = "url")]
    pub input: Option<PathBuf>,

    /// Base URL of the graph API (overrides config)
    #[arg(long, env = "KGSCOPE_SOURCE_URL")]
    pub url: Option<String>,

    /// Additional graph files merged into the first
    #[arg(long)]
    pub merge: Vec<PathBuf>,

    /// Graph kind
    #[arg(short, long)]
    pub kind: Option<VariantKind>,

    /// Start date filter (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// End date filter (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Entity filter, repeatable
    #[arg(long = "entity")]
    pub entities: Vec<String>,

    /// Maximum number of nodes to fetch (1-5000)
    #[arg(long)]
    pub limit: Option<String>,

    /// Node types to hide, comma separated
    #[arg(long, value_delimiter = ',')]
    pub hide: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Layout mode
    #[arg(short, long)]
    pub mode: Option<LayoutMode>,

    /// Maximum number of frames to run
    #[arg(long, default_value = "300")]
    pub frames: usize,

    /// 3D pitch in degrees
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub pitch: f32,

    /// 3D yaw in degrees
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub yaw: f32,

    /// 3D roll in degrees
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub roll: f32,

    /// 3D drag rotation as a raw quaternion, <x>,<y>,<z>,<w>
    #[arg(long, value_delimiter = ',', num_args = 4, allow_hyphen_values = true)]
    pub drag_quat: Option<Vec<f32>>,

    /// 3D drag gesture in pixels, as <dx>,<dy> (applied after --drag-quat)
    #[arg(long, value_delimiter = ',', num_args = 2, allow_hyphen_values = true)]
    pub drag: Option<Vec<f32>>,

    /// 3D repulsion strength in percent (overrides config)
    #[arg(long)]
    pub repulsion: Option<f32>,
}

/// Selection controls applied while replaying clicks.
#[derive(Args, Debug, Clone, Default)]
pub struct InteractionArgs {
    /// Clear the selection at this time in millis, repeatable
    #[arg(long = "clear-at", value_name = "MILLIS")]
    pub clear_at: Vec<u64>,

    /// Turn selection mode off so replayed clicks are ignored
    #[arg(long, default_value = "false")]
    pub no_select_mode: bool,
}

/// A click on a node at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub key: NodeKey,
    pub at_ms: u64,
}

impl FromStr for ClickEvent {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, at) = s
            .rsplit_once('@')
            .ok_or_else(|| ExplorerError::InvalidClick(s.to_string()))?;
        let at_ms = at
            .trim()
            .parse()
            .map_err(|_| ExplorerError::InvalidClick(s.to_string()))?;
        let key = key
            .parse()
            .map_err(|_| ExplorerError::InvalidClick(s.to_string()))?;
        Ok(Self { key, at_ms })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
    Svg,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Svg => write!(f, "svg"),
        }
    }
}
