use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use crate::config::DiagramConfig;
use crate::core::context::AnalysisContext;
use crate::core::model::{DeclarationKind, FileAnalysis};
use super::sanitize::{sanitize_identifier, sanitize_type};
use super::Diagram;

/// Builds structural diagrams straight from declarations and call edges:
/// a class diagram of a file's types and a bounded call-flow flowchart.
pub struct StructureSynthesizer<'a> {
    ctx: &'a AnalysisContext,
    config: &'a DiagramConfig,
}

impl<'a> StructureSynthesizer<'a> {
    pub fn new(ctx: &'a AnalysisContext, config: &'a DiagramConfig) -> Self {
        Self { ctx, config }
    }

    /// Class diagram of one file's classes and interfaces. None when the
    /// file declares neither.
    pub fn class_diagram(&self, analysis: &FileAnalysis) -> Option<Diagram> {
        let mut lines = vec!["classDiagram".to_string()];
        let mut emitted = 0usize;

        for decl in &analysis.declarations {
            if emitted >= self.config.max_nodes {
                break;
            }
            match decl.kind {
                DeclarationKind::Class => {
                    let class_id = sanitize_identifier(&decl.name);
                    lines.push(format!("    class {} {{", class_id));
                    for method in analysis
                        .declarations
                        .iter()
                        .filter(|d| d.parent_class.as_deref() == Some(decl.name.as_str()))
                    {
                        let marker = if method.visibility == "private" { "-" } else { "+" };
                        let params: Vec<String> = method
                            .parameters
                            .iter()
                            .map(|p| sanitize_type(&p.type_name))
                            .collect();
                        lines.push(format!(
                            "        {}{}({}) {}",
                            marker,
                            sanitize_identifier(&method.name),
                            params.join(", "),
                            sanitize_type(&method.return_type)
                        ));
                    }
                    lines.push("    }".to_string());
                    emitted += 1;
                }
                DeclarationKind::Interface => {
                    let id = sanitize_identifier(&decl.name);
                    lines.push(format!("    class {} {{", id));
                    lines.push("        <<interface>>".to_string());
                    lines.push("    }".to_string());
                    emitted += 1;
                }
                _ => {}
            }
        }

        if emitted == 0 {
            return None;
        }

        Some(Diagram {
            file: analysis.path.clone(),
            line: 1,
            title: "classes".to_string(),
            text: lines.join("\n"),
        })
    }

    /// Call-flow flowchart rooted at a file's exported functions and entry
    /// points. Breadth-first expansion bounded by the node/edge/depth caps,
    /// with a visited guard so each (file, symbol) expands once.
    pub fn call_flowchart(&self, analysis: &FileAnalysis) -> Option<Diagram> {
        let mut queue: VecDeque<(PathBuf, String, usize)> = VecDeque::new();
        let mut visited: HashSet<(PathBuf, String)> = HashSet::new();
        let mut nodes: Vec<String> = Vec::new();
        let mut arrows: Vec<String> = Vec::new();

        for decl in &analysis.declarations {
            let is_root = decl.exported
                && matches!(decl.kind, DeclarationKind::Function | DeclarationKind::Method);
            if is_root {
                queue.push_back((analysis.path.clone(), decl.name.clone(), 0));
            }
        }
        for entry in &analysis.entry_points {
            queue.push_back((analysis.path.clone(), entry.name.clone(), 0));
        }

        while let Some((path, name, depth)) = queue.pop_front() {
            if depth > self.config.max_depth || nodes.len() >= self.config.max_nodes {
                continue;
            }
            if !visited.insert((path.clone(), name.clone())) {
                continue;
            }

            let node_id = self.node_id(&path, &name);
            if !nodes.contains(&node_id) {
                nodes.push(node_id.clone());
            }

            let file = match self.ctx.get_cached(&path) {
                Some(a) => a,
                None => continue,
            };

            let edges = file
                .edges_of(&name)
                .iter()
                .cloned()
                .chain(
                    file.entry_points
                        .iter()
                        .filter(|e| e.name == name)
                        .flat_map(|e| e.edges.iter().cloned()),
                )
                .collect::<Vec<_>>();

            for edge in edges {
                if arrows.len() >= self.config.max_edges {
                    break;
                }
                let target_path = edge
                    .resolved_path
                    .clone()
                    .unwrap_or_else(|| path.clone());
                let target_name = edge.target_symbol().to_string();
                let target_id = self.node_id(&target_path, &target_name);

                let arrow = if edge.is_async { "-.->" } else { "-->" };
                arrows.push(format!("    {} {} {}", node_id, arrow, target_id));

                if !nodes.contains(&target_id) {
                    nodes.push(target_id);
                }
                queue.push_back((target_path, target_name, depth + 1));
            }
        }

        if arrows.is_empty() {
            return None;
        }

        let mut lines = vec!["flowchart TD".to_string()];
        lines.extend(arrows);

        Some(Diagram {
            file: analysis.path.clone(),
            line: 1,
            title: "callflow".to_string(),
            text: lines.join("\n"),
        })
    }

    /// Node identifier disambiguated by file stem for cross-file targets
    fn node_id(&self, path: &PathBuf, name: &str) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        sanitize_identifier(&format!("{}_{}", stem, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn config() -> DiagramConfig {
        DiagramConfig {
            max_depth: 4,
            max_nodes: 40,
            max_edges: 60,
            max_label_length: 60,
        }
    }

    fn analyze(dir: &Path, files: &[(&str, &str)]) -> (AnalysisContext, PathBuf) {
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
        let mut ctx = AnalysisContext::new(&AnalysisConfig {
            tsconfig: None,
            max_alias_hops: 4,
            max_file_size: 1024 * 1024,
        })
        .unwrap();
        let root = dir.join(files[0].0);
        ctx.get_or_analyze(&root).unwrap().unwrap();
        (ctx, crate::core::resolver::normalize_path(&root))
    }

    #[test]
    fn test_class_diagram_lists_members_with_visibility() {
        let tmp = TempDir::new().unwrap();
        let (ctx, path) = analyze(
            tmp.path(),
            &[(
                "store.ts",
                r#"
export class Store {
    save(key: string): void {}
    private flush(): void {}
}
export interface Options {}
"#,
            )],
        );

        let analysis = ctx.get_cached(&path).unwrap();
        let cfg = config();
        let synthesizer = StructureSynthesizer::new(&ctx, &cfg);
        let diagram = synthesizer.class_diagram(&analysis).unwrap();

        assert!(diagram.text.starts_with("classDiagram"));
        assert!(diagram.text.contains("class Store {"));
        assert!(diagram.text.contains("+save(string) void"));
        assert!(diagram.text.contains("-flush() void"));
        assert!(diagram.text.contains("<<interface>>"));
    }

    #[test]
    fn test_class_diagram_suppressed_without_types() {
        let tmp = TempDir::new().unwrap();
        let (ctx, path) = analyze(
            tmp.path(),
            &[("fns.ts", "export function lonely() {}\n")],
        );

        let analysis = ctx.get_cached(&path).unwrap();
        let cfg = config();
        let synthesizer = StructureSynthesizer::new(&ctx, &cfg);
        assert!(synthesizer.class_diagram(&analysis).is_none());
    }

    #[test]
    fn test_flowchart_spans_files_and_styles_async_edges() {
        let tmp = TempDir::new().unwrap();
        let (ctx, path) = analyze(
            tmp.path(),
            &[
                (
                    "a.ts",
                    r#"
import { helper } from "./b";
export async function main() { await helper(); }
"#,
                ),
                ("b.ts", "export function helper() {}\n"),
            ],
        );

        let analysis = ctx.get_cached(&path).unwrap();
        let cfg = config();
        let synthesizer = StructureSynthesizer::new(&ctx, &cfg);
        let diagram = synthesizer.call_flowchart(&analysis).unwrap();

        assert!(diagram.text.starts_with("flowchart TD"));
        assert!(diagram.text.contains("a_main -.-> b_helper"));
    }

    #[test]
    fn test_flowchart_terminates_on_cycles() {
        let tmp = TempDir::new().unwrap();
        let (ctx, path) = analyze(
            tmp.path(),
            &[(
                "cycle.ts",
                r#"
export function ping() { pong(); }
export function pong() { ping(); }
"#,
            )],
        );

        let analysis = ctx.get_cached(&path).unwrap();
        let cfg = config();
        let synthesizer = StructureSynthesizer::new(&ctx, &cfg);
        let diagram = synthesizer.call_flowchart(&analysis).unwrap();

        // Each symbol expanded once; the cycle shows as two arrows
        let arrow_count = diagram.text.matches("-->").count();
        assert_eq!(arrow_count, 2);
    }
}
