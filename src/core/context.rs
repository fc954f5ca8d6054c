use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::{ChartsmithError, Result};
use super::call_graph::{collect_calls, resolve_edge};
use super::extractor::DeclarationExtractor;
use super::model::{CallEdge, DeclarationKind, EntryPoint, FileAnalysis};
use super::resolver::{create_resolver, normalize_path, ImportResolver};

/// Per-run analysis context owning the cross-file cache.
///
/// Analysis is synchronous and single-threaded; the cache guarantees at most
/// one analysis per normalized path per run. Cycle breaking relies on the
/// insert-before-recurse ordering: a path currently under analysis is not
/// re-entered, its second encounter reads as "no edges yet known".
pub struct AnalysisContext {
    extractor: DeclarationExtractor,
    resolver: Box<dyn ImportResolver>,
    config: AnalysisConfig,
    cache: HashMap<PathBuf, Rc<FileAnalysis>>,
    in_progress: HashSet<PathBuf>,
}

impl AnalysisContext {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            extractor: DeclarationExtractor::new()?,
            resolver: create_resolver(config),
            config: config.clone(),
            cache: HashMap::new(),
            in_progress: HashSet::new(),
        })
    }

    /// Drop all cached analyses, returning the context to its initial state
    pub fn reset(&mut self) {
        self.cache.clear();
        self.in_progress.clear();
    }

    pub fn resolver_strategy(&self) -> &'static str {
        self.resolver.strategy_name()
    }

    /// Cached analysis for a path, without triggering analysis
    pub fn get_cached(&self, path: &Path) -> Option<Rc<FileAnalysis>> {
        self.cache.get(&normalize_path(path)).cloned()
    }

    pub fn analyzed_count(&self) -> usize {
        self.cache.len()
    }

    /// Memoized per-file analysis. Returns None (not an error) for a file
    /// currently being analyzed further up the recursion.
    pub fn get_or_analyze(&mut self, path: &Path) -> Result<Option<Rc<FileAnalysis>>> {
        let key = normalize_path(path);

        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached.clone()));
        }
        if self.in_progress.contains(&key) {
            return Ok(None);
        }

        self.in_progress.insert(key.clone());
        let outcome = self.analyze_file(&key);
        self.in_progress.remove(&key);

        let analysis = Rc::new(outcome?);
        self.cache.insert(key, analysis.clone());
        Ok(Some(analysis))
    }

    /// Follow re-export alias chains to the declaring file/symbol, bounded
    /// by the configured hop count. Best-effort: when the chain cannot be
    /// followed (file under analysis, unreadable, symbol absent) the last
    /// known (file, symbol) pair is returned unchanged.
    pub fn resolve_symbol(&mut self, path: &Path, symbol: &str) -> (PathBuf, String) {
        self.resolve_symbol_bounded(path, symbol, self.config.max_alias_hops)
    }

    fn resolve_symbol_bounded(&mut self, path: &Path, symbol: &str, hops: usize) -> (PathBuf, String) {
        let key = normalize_path(path);

        let analysis = match self.get_or_analyze(&key) {
            Ok(Some(analysis)) => analysis,
            Ok(None) => return (key, symbol.to_string()),
            Err(e) => {
                debug!("Skipping alias chase into {}: {}", key.display(), e);
                return (key, symbol.to_string());
            }
        };

        if analysis.declaration(symbol).is_some() || hops == 0 {
            return (key, symbol.to_string());
        }

        let alias = analysis
            .re_exports
            .iter()
            .find(|r| r.exported_name == symbol)
            .and_then(|r| r.resolved_path.clone().map(|p| (p, r.local_name.clone())));

        match alias {
            Some((target, local_name)) => {
                self.resolve_symbol_bounded(&target, &local_name, hops - 1)
            }
            None => (key, symbol.to_string()),
        }
    }

    /// Single-pass analysis of one file: parse, extract declarations and
    /// imports, resolve import bindings, then distill every declaration and
    /// entry-point body into call edges. Cross-file edges recurse back into
    /// `get_or_analyze` for their target files.
    fn analyze_file(&mut self, key: &Path) -> Result<FileAnalysis> {
        debug!("Analyzing {}", key.display());
        let source = std::fs::read_to_string(key)?;

        if source.len() > self.config.max_file_size {
            return Err(ChartsmithError::Parser(format!(
                "File {} exceeds maximum size limit",
                key.display()
            )));
        }

        let tree = self.extractor.parse(&source)?;
        let extraction = self.extractor.extract(tree.root_node(), &source);

        let mut imports = extraction.imports;
        for binding in &mut imports {
            binding.resolved_path = self.resolver.resolve(key, &binding.specifier);
            if binding.resolved_path.is_none() && binding.specifier.starts_with('.') {
                warn!(
                    "Unresolved relative import \"{}\" in {}",
                    binding.specifier,
                    key.display()
                );
            }
        }

        let mut re_exports = extraction.re_exports;
        for re_export in &mut re_exports {
            re_export.resolved_path = self.resolver.resolve(key, &re_export.specifier);
        }

        // Bare-call lookup table: function and method names declared here
        let locals: HashSet<String> = extraction
            .declarations
            .iter()
            .filter(|d| matches!(d.kind, DeclarationKind::Function | DeclarationKind::Method))
            .map(|d| d.name.clone())
            .collect();

        let mut call_edges: HashMap<String, Vec<CallEdge>> = HashMap::new();
        for body in &extraction.bodies {
            let mut edges = Vec::new();
            for raw in collect_calls(body.node, &source) {
                if let Some(edge) = resolve_edge(self, &body.owner, &raw, &locals, &imports) {
                    edges.push(edge);
                }
            }
            if !edges.is_empty() {
                call_edges.entry(body.owner.clone()).or_default().extend(edges);
            }
        }

        let mut entry_points = Vec::new();
        for raw_entry in &extraction.entry_points {
            let mut edges = Vec::new();
            for raw in collect_calls(raw_entry.execute_body, &source) {
                if let Some(edge) = resolve_edge(self, &raw_entry.name, &raw, &locals, &imports) {
                    edges.push(edge);
                }
            }
            entry_points.push(EntryPoint {
                name: raw_entry.name.clone(),
                description: raw_entry.description.clone(),
                line: raw_entry.line,
                edges,
            });
        }

        Ok(FileAnalysis {
            path: key.to_path_buf(),
            declarations: extraction.declarations,
            imports,
            re_exports,
            call_edges,
            entry_points,
        })
    }
}
