use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::{ChartsmithError, Result};

/// Suffix/index candidates probed when a specifier names no file directly.
/// Implementation files are probed before declaration-only files.
const PROBE_SUFFIXES: &[&str] = &[".ts", ".tsx", ".d.ts"];
const PROBE_INDEXES: &[&str] = &["index.ts", "index.tsx"];

/// Resolves an import specifier to a candidate file path.
///
/// Two strategies exist: program-aware resolution driven by a tsconfig.json
/// (baseUrl + path aliases) and plain heuristic probing relative to the
/// importing file. Both answer the same question; non-relative specifiers
/// that match nothing are external modules (None).
pub trait ImportResolver {
    fn resolve(&self, importing_file: &Path, specifier: &str) -> Option<PathBuf>;

    fn strategy_name(&self) -> &'static str;
}

/// Select the resolution strategy for a project. A configured tsconfig that
/// fails to load degrades gracefully to the heuristic resolver.
pub fn create_resolver(config: &AnalysisConfig) -> Box<dyn ImportResolver> {
    if let Some(tsconfig_path) = &config.tsconfig {
        match ProgramResolver::from_tsconfig(tsconfig_path) {
            Ok(resolver) => {
                debug!("Program-aware import resolution enabled via {}", tsconfig_path.display());
                return Box::new(resolver);
            }
            Err(e) => {
                warn!("Failed to load {}: {}", tsconfig_path.display(), e);
                warn!("Falling back to heuristic import resolution");
            }
        }
    }
    Box::new(HeuristicResolver)
}

/// Normalize a path without touching the filesystem: resolves `.` and `..`
/// components lexically. Used for cache keys and resolved edge paths so the
/// same file always maps to the same key.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Probe a base path (specifier joined onto the importing directory) against
/// the fixed suffix/index candidate list.
fn probe_candidates(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(normalize_path(base));
    }

    let base_str = base.to_string_lossy();
    for suffix in PROBE_SUFFIXES {
        let candidate = PathBuf::from(format!("{}{}", base_str, suffix));
        if candidate.is_file() {
            return Some(normalize_path(&candidate));
        }
    }
    for index in PROBE_INDEXES {
        let candidate = base.join(index);
        if candidate.is_file() {
            return Some(normalize_path(&candidate));
        }
    }
    None
}

/// Prefer an implementation file over a declaration-only result by probing
/// sibling suffixes next to a resolved `.d.ts`.
fn prefer_implementation(resolved: PathBuf) -> PathBuf {
    let as_str = resolved.to_string_lossy();
    if let Some(stem) = as_str.strip_suffix(".d.ts") {
        for suffix in &[".ts", ".tsx"] {
            let sibling = PathBuf::from(format!("{}{}", stem, suffix));
            if sibling.is_file() {
                return normalize_path(&sibling);
            }
        }
    }
    resolved
}

/// Heuristic resolver: relative specifiers probe a fixed ordered candidate
/// list next to the importing file; everything else is external.
pub struct HeuristicResolver;

impl ImportResolver for HeuristicResolver {
    fn resolve(&self, importing_file: &Path, specifier: &str) -> Option<PathBuf> {
        if !specifier.starts_with('.') {
            return None;
        }
        let dir = importing_file.parent()?;
        probe_candidates(&dir.join(specifier)).map(prefer_implementation)
    }

    fn strategy_name(&self) -> &'static str {
        "heuristic"
    }
}

#[derive(Debug, Deserialize, Default)]
struct TsConfig {
    #[serde(rename = "compilerOptions", default)]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Deserialize, Default)]
struct CompilerOptions {
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,

    #[serde(default)]
    paths: HashMap<String, Vec<String>>,
}

/// Program-aware resolver: understands the project's baseUrl and path
/// aliases from tsconfig.json, falling back to relative probing for
/// specifiers the configuration says nothing about.
pub struct ProgramResolver {
    /// Directory all baseUrl-relative lookups are rooted at
    base_dir: PathBuf,

    /// Alias patterns from compilerOptions.paths, e.g. "@app/*" -> ["src/*"]
    paths: Vec<(String, Vec<String>)>,
}

impl ProgramResolver {
    pub fn from_tsconfig(tsconfig_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(tsconfig_path)?;
        // tsconfig.json allows // comments; strip them before parsing
        let stripped: String = content
            .lines()
            .map(|line| match line.trim_start().starts_with("//") {
                true => "",
                false => line,
            })
            .collect::<Vec<_>>()
            .join("\n");
        let parsed: TsConfig = serde_json::from_str(&stripped)
            .map_err(|e| ChartsmithError::Config(format!("invalid tsconfig: {}", e)))?;

        let config_dir = tsconfig_path.parent().unwrap_or(Path::new("."));
        let base_dir = match &parsed.compiler_options.base_url {
            Some(base) => normalize_path(&config_dir.join(base)),
            None => normalize_path(config_dir),
        };

        let mut paths: Vec<(String, Vec<String>)> =
            parsed.compiler_options.paths.into_iter().collect();
        // Longer prefixes first so the most specific alias wins
        paths.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Ok(Self { base_dir, paths })
    }

    /// Match a specifier against one alias pattern, returning the text the
    /// `*` wildcard captured (or an empty capture for exact patterns).
    fn match_alias<'a>(pattern: &str, specifier: &'a str) -> Option<&'a str> {
        match pattern.split_once('*') {
            Some((prefix, suffix)) => {
                let rest = specifier.strip_prefix(prefix)?;
                rest.strip_suffix(suffix)
            }
            None => (pattern == specifier).then_some(""),
        }
    }

    fn resolve_aliased(&self, specifier: &str) -> Option<PathBuf> {
        for (pattern, targets) in &self.paths {
            if let Some(captured) = Self::match_alias(pattern, specifier) {
                for target in targets {
                    let substituted = target.replacen('*', captured, 1);
                    if let Some(found) = probe_candidates(&self.base_dir.join(substituted)) {
                        return Some(prefer_implementation(found));
                    }
                }
            }
        }
        None
    }
}

impl ImportResolver for ProgramResolver {
    fn resolve(&self, importing_file: &Path, specifier: &str) -> Option<PathBuf> {
        if specifier.starts_with('.') {
            let dir = importing_file.parent()?;
            return probe_candidates(&dir.join(specifier)).map(prefer_implementation);
        }

        // Non-relative: try alias mappings, then baseUrl-relative lookup
        if let Some(found) = self.resolve_aliased(specifier) {
            return Some(found);
        }
        probe_candidates(&self.base_dir.join(specifier)).map(prefer_implementation)
    }

    fn strategy_name(&self) -> &'static str {
        "program"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "export {};\n").unwrap();
        path
    }

    #[test]
    fn test_heuristic_probes_suffixes_in_order() {
        let tmp = TempDir::new().unwrap();
        let helper = touch(tmp.path(), "src/helper.ts");
        let importer = touch(tmp.path(), "src/main.ts");

        let resolver = HeuristicResolver;
        let resolved = resolver.resolve(&importer, "./helper").unwrap();
        assert_eq!(resolved, normalize_path(&helper));
    }

    #[test]
    fn test_heuristic_probes_index_file() {
        let tmp = TempDir::new().unwrap();
        let index = touch(tmp.path(), "src/util/index.ts");
        let importer = touch(tmp.path(), "src/main.ts");

        let resolver = HeuristicResolver;
        let resolved = resolver.resolve(&importer, "./util").unwrap();
        assert_eq!(resolved, normalize_path(&index));
    }

    #[test]
    fn test_heuristic_external_specifier_unresolved() {
        let tmp = TempDir::new().unwrap();
        let importer = touch(tmp.path(), "src/main.ts");

        let resolver = HeuristicResolver;
        assert!(resolver.resolve(&importer, "fs").is_none());
        assert!(resolver.resolve(&importer, "./missing").is_none());
    }

    #[test]
    fn test_implementation_preferred_over_declaration() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/api.d.ts");
        let implementation = touch(tmp.path(), "src/api.ts");
        let importer = touch(tmp.path(), "src/main.ts");

        let resolver = HeuristicResolver;
        let resolved = resolver.resolve(&importer, "./api").unwrap();
        assert_eq!(resolved, normalize_path(&implementation));
    }

    #[test]
    fn test_program_resolver_alias_paths() {
        let tmp = TempDir::new().unwrap();
        let target = touch(tmp.path(), "src/services/db.ts");
        let importer = touch(tmp.path(), "src/main.ts");
        let tsconfig = tmp.path().join("tsconfig.json");
        fs::write(
            &tsconfig,
            r#"{
  // project config
  "compilerOptions": {
    "baseUrl": ".",
    "paths": { "@services/*": ["src/services/*"] }
  }
}"#,
        )
        .unwrap();

        let resolver = ProgramResolver::from_tsconfig(&tsconfig).unwrap();
        let resolved = resolver.resolve(&importer, "@services/db").unwrap();
        assert_eq!(resolved, normalize_path(&target));
        assert!(resolver.resolve(&importer, "fs").is_none());
    }

    #[test]
    fn test_broken_tsconfig_degrades_to_heuristic() {
        let tmp = TempDir::new().unwrap();
        let tsconfig = tmp.path().join("tsconfig.json");
        fs::write(&tsconfig, "{ not json").unwrap();

        let config = AnalysisConfig {
            tsconfig: Some(tsconfig),
            max_alias_hops: 4,
            max_file_size: 1024 * 1024,
        };
        let resolver = create_resolver(&config);
        assert_eq!(resolver.strategy_name(), "heuristic");
    }

    #[test]
    fn test_normalize_path_collapses_dots() {
        let normalized = normalize_path(Path::new("/a/b/../c/./d.ts"));
        assert_eq!(normalized, PathBuf::from("/a/c/d.ts"));
    }
}
