use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ChartsmithError;
use super::context::AnalysisContext;
use super::diagram::{Diagram, SequenceSynthesizer, StructureSynthesizer};
use super::model::FileAnalysis;
use super::validator::DiagramValidator;

/// Main orchestration engine: collects source files, runs per-file analysis
/// through the shared context, synthesizes diagrams and validates them.
pub struct Engine {
    config: Config,
    context: AnalysisContext,
}

impl Engine {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);

        let context = AnalysisContext::new(&config.analysis)?;
        info!("Import resolution strategy: {}", context.resolver_strategy());

        Ok(Self { config, context })
    }

    /// Analyze source files and dump each FileAnalysis as JSON
    pub fn analyze(&mut self, source: Option<PathBuf>, pretty: bool) -> Result<()> {
        let analyses = self.analyze_tree(source)?;

        let records: Vec<&FileAnalysis> = analyses.iter().map(|a| a.as_ref()).collect();
        for record in &records {
            for declaration in &record.declarations {
                debug!("  {}", declaration.display_signature());
            }
        }
        let json = if pretty {
            serde_json::to_string_pretty(&records)?
        } else {
            serde_json::to_string(&records)?
        };
        println!("{}", json);
        Ok(())
    }

    /// Synthesize diagrams, printing them or writing .mmd files
    pub fn diagrams(
        &mut self,
        source: Option<PathBuf>,
        output: Option<PathBuf>,
        structural: bool,
    ) -> Result<()> {
        let analyses = self.analyze_tree(source)?;
        let diagrams = self.synthesize(&analyses, structural);
        info!("Synthesized {} diagrams", diagrams.len());

        match output {
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                for diagram in &diagrams {
                    let stem = diagram
                        .file
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| "diagram".to_string());
                    let path = dir.join(format!("{}-{}.mmd", stem, diagram.title));
                    std::fs::write(&path, &diagram.text)?;
                    debug!("Wrote {}", path.display());
                }
                info!("Wrote {} diagram files to {}", diagrams.len(), dir.display());
            }
            None => {
                for diagram in &diagrams {
                    println!("%% {}:{} {}", diagram.file.display(), diagram.line, diagram.title);
                    println!("{}\n", diagram.text);
                }
            }
        }
        Ok(())
    }

    /// Synthesize and validate diagrams, failing on any invalid result
    pub async fn validate(&mut self, source: Option<PathBuf>, no_render: bool) -> Result<()> {
        let analyses = self.analyze_tree(source)?;
        let diagrams = self.synthesize(&analyses, true);

        let mut validator = DiagramValidator::new(&self.config.validation);
        if no_render {
            validator = validator.without_renderer();
        }

        let report = validator.validate_all(&diagrams).await;
        info!("Validated {} diagrams", report.checked);

        for issue in &report.issues {
            warn!("{}:{}: {}", issue.file.display(), issue.line, issue.message);
        }

        if !report.is_valid() {
            anyhow::bail!("{} of {} diagrams failed validation", report.issues.len(), report.checked);
        }
        info!("All diagrams valid");
        Ok(())
    }

    /// Walk the source tree and analyze every TypeScript file. Per-file
    /// failures are logged and skipped; a partial codebase still analyzes.
    fn analyze_tree(&mut self, source: Option<PathBuf>) -> Result<Vec<Rc<FileAnalysis>>> {
        let source_dir = match source {
            Some(dir) => dir,
            None => self.config.project.source_dirs.first().cloned().ok_or_else(|| {
                ChartsmithError::Config(
                    "no source directory: pass --source or set project.source_dirs".to_string(),
                )
            })?,
        };
        info!("Analyzing {}", source_dir.display());

        let files = self.collect_files(&source_dir);
        info!("Found {} source files", files.len());

        let mut analyses = Vec::new();
        for file in files {
            match self.context.get_or_analyze(&file) {
                Ok(Some(analysis)) => analyses.push(analysis),
                Ok(None) => {}
                Err(e) => warn!("Skipping {}: {}", file.display(), e),
            }
        }

        info!(
            "Analyzed {} files ({} including imported dependencies)",
            analyses.len(),
            self.context.analyzed_count()
        );
        Ok(analyses)
    }

    fn synthesize(&self, analyses: &[Rc<FileAnalysis>], structural: bool) -> Vec<Diagram> {
        let sequences = SequenceSynthesizer::new(&self.context, &self.config.diagrams);
        let structures = StructureSynthesizer::new(&self.context, &self.config.diagrams);

        let mut diagrams = Vec::new();
        for analysis in analyses {
            for entry in &analysis.entry_points {
                if let Some(diagram) = sequences.synthesize(analysis, entry) {
                    diagrams.push(diagram);
                }
            }
            // Files with nothing public and no entry points only add noise
            let interesting = analysis.has_exports() || !analysis.entry_points.is_empty();
            if structural && interesting {
                if let Some(diagram) = structures.class_diagram(analysis) {
                    diagrams.push(diagram);
                }
                if let Some(diagram) = structures.call_flowchart(analysis) {
                    diagrams.push(diagram);
                }
            }
        }
        diagrams
    }

    /// Collect .ts/.tsx files, honoring .gitignore and skipping
    /// declaration-only files
    fn collect_files(&self, dir: &Path) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(dir)
            .hidden(false)
            .git_ignore(true)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.ends_with(".d.ts") {
                continue;
            }
            if name.ends_with(".ts") || name.ends_with(".tsx") {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_source_dirs_is_a_config_error() {
        let mut config = Config::default();
        config.project.source_dirs.clear();
        let context = AnalysisContext::new(&config.analysis).unwrap();
        let mut engine = Engine { config, context };

        let err = engine.analyze_tree(None).unwrap_err();
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn test_explicit_source_overrides_empty_config() {
        let mut config = Config::default();
        config.project.source_dirs.clear();
        let context = AnalysisContext::new(&config.analysis).unwrap();
        let mut engine = Engine { config, context };

        let tmp = tempfile::tempdir().unwrap();
        let analyses = engine.analyze_tree(Some(tmp.path().to_path_buf())).unwrap();
        assert!(analyses.is_empty());
    }
}
