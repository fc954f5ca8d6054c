use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::Engine;

#[derive(Parser)]
#[command(name = "chartsmith")]
#[command(about = "Call-graph analysis and Mermaid diagram synthesis for TypeScript codebases")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze source files and dump per-file analysis as JSON
    Analyze {
        /// Source directory to analyze
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Synthesize Mermaid diagrams from the call graph
    Diagrams {
        /// Source directory to analyze
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory for .mmd files (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit structural diagrams in addition to sequence diagrams
        #[arg(long)]
        structural: bool,
    },

    /// Validate synthesized diagrams, exiting non-zero on failures
    Validate {
        /// Source directory to analyze
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Skip the external renderer even if configured
        #[arg(long)]
        no_render: bool,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Analyze { source, pretty } => {
                engine.analyze(source, pretty)
            }
            Commands::Diagrams { source, output, structural } => {
                engine.diagrams(source, output, structural)
            }
            Commands::Validate { source, no_render } => {
                engine.validate(source, no_render).await
            }
        }
    }
}
