use std::path::Path;
use std::rc::Rc;

use crate::config::DiagramConfig;
use crate::core::actors::{classify, step_label};
use crate::core::context::AnalysisContext;
use crate::core::model::{CallEdge, EntryPoint, FileAnalysis};
use super::sanitize::{sanitize_identifier, sanitize_label};
use super::Diagram;

/// One arrow of an interaction diagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramStep {
    pub from: String,
    pub to: String,
    pub label: String,
    pub is_async: bool,
}

/// Synthesizes one Mermaid sequence diagram per entry point.
///
/// Traversal follows the entry point's call edges and, recursively, the
/// callees' own edges up to the configured max depth. Only already-cached
/// analyses are consulted, keeping synthesis side-effect-free.
pub struct SequenceSynthesizer<'a> {
    ctx: &'a AnalysisContext,
    config: &'a DiagramConfig,
}

impl<'a> SequenceSynthesizer<'a> {
    pub fn new(ctx: &'a AnalysisContext, config: &'a DiagramConfig) -> Self {
        Self { ctx, config }
    }

    /// Build the diagram for one entry point. Returns None when traversal
    /// produced nothing beyond the opening/closing boundary pair; an empty
    /// diagram is suppressed rather than emitted.
    pub fn synthesize(&self, analysis: &FileAnalysis, entry: &EntryPoint) -> Option<Diagram> {
        let mut participants = vec!["Caller".to_string(), "System".to_string()];
        let mut steps = Vec::new();

        self.walk_edges(analysis, &entry.edges, "System", 1, &mut participants, &mut steps);

        if steps.is_empty() {
            return None;
        }

        let mut lines = vec!["sequenceDiagram".to_string()];
        for participant in &participants {
            lines.push(format!("    participant {}", participant));
        }

        let opening = entry
            .description
            .clone()
            .unwrap_or_else(|| entry.name.clone());
        lines.push(format!("    Caller->>System: {}", sanitize_label(&opening)));

        for step in &steps {
            let arrow = if step.is_async { "-)" } else { "->>" };
            lines.push(format!(
                "    {}{}{}: {}",
                step.from, arrow, step.to, step.label
            ));
        }

        // Closing return to the caller is always appended
        lines.push("    System-->>Caller: return".to_string());

        Some(Diagram {
            file: analysis.path.clone(),
            line: entry.line,
            title: format!("seq-{}", sanitize_identifier(&entry.name)),
            text: lines.join("\n"),
        })
    }

    fn walk_edges(
        &self,
        analysis: &FileAnalysis,
        edges: &[CallEdge],
        from: &str,
        depth: usize,
        participants: &mut Vec<String>,
        steps: &mut Vec<DiagramStep>,
    ) {
        if depth > self.config.max_depth {
            return;
        }

        for edge in edges {
            let docs = self.callee_docs(analysis, edge);
            let role = classify(&edge.callee, docs.as_deref());
            let participant = role.participant().to_string();

            if !participants.contains(&participant) {
                participants.push(participant.clone());
            }

            let label = sanitize_label(&step_label(
                &edge.display_name,
                docs.as_deref(),
                self.config.max_label_length,
            ));
            steps.push(DiagramStep {
                from: from.to_string(),
                to: participant.clone(),
                label,
                is_async: edge.is_async,
            });

            // Recurse only while the callee's own edges remain resolvable
            match &edge.resolved_path {
                Some(target) => {
                    if let Some(target_analysis) = self.ctx.get_cached(target) {
                        let callee_edges = collect_owned(&target_analysis, edge.target_symbol());
                        self.walk_edges(
                            &target_analysis,
                            &callee_edges,
                            &participant,
                            depth + 1,
                            participants,
                            steps,
                        );
                    }
                }
                None => {
                    let callee_edges = analysis.edges_of(&edge.callee).to_vec();
                    self.walk_edges(
                        analysis,
                        &callee_edges,
                        &participant,
                        depth + 1,
                        participants,
                        steps,
                    );
                }
            }
        }
    }

    fn callee_docs(&self, analysis: &FileAnalysis, edge: &CallEdge) -> Option<String> {
        match &edge.resolved_path {
            Some(target) => self
                .resolved_declaration_docs(target, edge.target_symbol()),
            None => analysis
                .declaration(&edge.callee)
                .and_then(|d| d.docs.clone()),
        }
    }

    fn resolved_declaration_docs(&self, target: &Path, symbol: &str) -> Option<String> {
        let target_analysis: Rc<FileAnalysis> = self.ctx.get_cached(target)?;
        target_analysis.declaration(symbol).and_then(|d| d.docs.clone())
    }
}

fn collect_owned(analysis: &FileAnalysis, name: &str) -> Vec<CallEdge> {
    analysis.edges_of(name).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config() -> DiagramConfig {
        DiagramConfig {
            max_depth: 4,
            max_nodes: 40,
            max_edges: 60,
            max_label_length: 60,
        }
    }

    fn analyze(dir: &TempDir, name: &str, source: &str) -> (AnalysisContext, PathBuf) {
        let path = dir.path().join(name);
        fs::write(&path, source).unwrap();
        let mut ctx = AnalysisContext::new(&AnalysisConfig {
            tsconfig: None,
            max_alias_hops: 4,
            max_file_size: 1024 * 1024,
        })
        .unwrap();
        ctx.get_or_analyze(&path).unwrap().unwrap();
        (ctx, crate::core::resolver::normalize_path(&path))
    }

    #[test]
    fn test_entry_point_diagram_has_role_participant_and_steps() {
        let tmp = TempDir::new().unwrap();
        let (ctx, path) = analyze(
            &tmp,
            "a.ts",
            r#"
function doWork(): void {}

registerCommand(registry)({
    name: "work",
    execute: () => { doWork(); },
});
"#,
        );

        let analysis = ctx.get_cached(&path).unwrap();
        let cfg = config();
        let synthesizer = SequenceSynthesizer::new(&ctx, &cfg);
        let diagram = synthesizer
            .synthesize(&analysis, &analysis.entry_points[0])
            .unwrap();

        assert!(diagram.text.starts_with("sequenceDiagram"));
        assert!(diagram.text.contains("participant Caller"));
        assert!(diagram.text.contains("participant System"));
        assert!(diagram.text.contains("participant Internal"));
        assert!(diagram.text.contains("System->>Internal: doWork"));
        assert!(diagram.text.contains("System-->>Caller: return"));
    }

    #[test]
    fn test_diagram_suppressed_without_resolvable_steps() {
        let tmp = TempDir::new().unwrap();
        let (ctx, path) = analyze(
            &tmp,
            "a.ts",
            r#"
registerCommand(registry)({
    name: "noop",
    execute: () => { externalThing(); },
});
"#,
        );

        let analysis = ctx.get_cached(&path).unwrap();
        let cfg = config();
        let synthesizer = SequenceSynthesizer::new(&ctx, &cfg);
        assert!(synthesizer
            .synthesize(&analysis, &analysis.entry_points[0])
            .is_none());
    }

    #[test]
    fn test_async_edges_use_async_arrow() {
        let tmp = TempDir::new().unwrap();
        let (ctx, path) = analyze(
            &tmp,
            "a.ts",
            r#"
async function persistState(): Promise<void> {}

registerCommand(registry)({
    name: "save",
    execute: async () => { await persistState(); },
});
"#,
        );

        let analysis = ctx.get_cached(&path).unwrap();
        let cfg = config();
        let synthesizer = SequenceSynthesizer::new(&ctx, &cfg);
        let diagram = synthesizer
            .synthesize(&analysis, &analysis.entry_points[0])
            .unwrap();
        assert!(diagram.text.contains("System-)Storage: persistState"));
    }

    #[test]
    fn test_traversal_respects_max_depth() {
        // Synthetic chain of depth 10 under a configured max depth of 4
        let mut source = String::new();
        for i in (1..10).rev() {
            source.push_str(&format!("function f{}() {{ f{}(); }}\n", i, i + 1));
        }
        source.push_str("function f10() {}\n");
        source.push_str(
            r#"
registerCommand(registry)({
    name: "chain",
    execute: () => { f1(); },
});
"#,
        );

        let tmp = TempDir::new().unwrap();
        let (ctx, path) = analyze(&tmp, "chain.ts", &source);

        let analysis = ctx.get_cached(&path).unwrap();
        let cfg = config();
        let synthesizer = SequenceSynthesizer::new(&ctx, &cfg);
        let diagram = synthesizer
            .synthesize(&analysis, &analysis.entry_points[0])
            .unwrap();

        // Opening + 4 traversal hops + closing return
        assert!(diagram.text.contains("f4"));
        assert!(!diagram.text.contains("f5"));
    }
}
