use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ChartsmithError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Source analysis configuration
    pub analysis: AnalysisConfig,

    /// Diagram synthesis settings
    pub diagrams: DiagramConfig,

    /// Diagram validation settings
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Source directories to analyze
    pub source_dirs: Vec<PathBuf>,

    /// Directories to ignore
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Path to a tsconfig.json enabling program-aware import resolution.
    /// When absent (or broken) the heuristic resolver is used instead.
    pub tsconfig: Option<PathBuf>,

    /// Maximum number of re-export hops to follow when chasing an
    /// aliased symbol to its declaring file
    pub max_alias_hops: usize,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramConfig {
    /// Maximum call depth for sequence diagram traversal
    pub max_depth: usize,

    /// Node cap for structural diagrams
    pub max_nodes: usize,

    /// Edge cap for structural diagrams
    pub max_edges: usize,

    /// Step labels longer than this fall back to the callee name
    pub max_label_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// External renderer binary (e.g. "mmdc"). None disables rendering
    /// and makes the heuristic check authoritative.
    pub renderer: Option<String>,

    /// Per-diagram render timeout in seconds
    pub render_timeout_secs: u64,

    /// Maximum diagrams validated concurrently
    pub max_concurrent: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                name: "Unnamed Project".to_string(),
                source_dirs: vec![PathBuf::from("src")],
                ignore_patterns: vec![
                    "node_modules/".to_string(),
                    "dist/".to_string(),
                    ".git/".to_string(),
                    "*.d.ts".to_string(),
                ],
            },
            analysis: AnalysisConfig {
                tsconfig: None,
                max_alias_hops: 4,
                max_file_size: 1024 * 1024, // 1MB
            },
            diagrams: DiagramConfig {
                max_depth: 4,
                max_nodes: 40,
                max_edges: 60,
                max_label_length: 60,
            },
            validation: ValidationConfig {
                renderer: None,
                render_timeout_secs: 20,
                max_concurrent: 4,
            },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ChartsmithError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ChartsmithError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "Chartsmith.toml",
                    "chartsmith.toml",
                    ".chartsmith.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
