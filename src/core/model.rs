use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Kind of extracted declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Function,
    Method,
    Class,
    Interface,
    TypeAlias,
}

/// One parameter of a function or method signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    /// Declared type; defaults to "any" when the source omits an annotation
    pub type_name: String,

    pub optional: bool,
}

/// An extracted function/class/interface/type definition.
///
/// Identity is (file path, name); names are unique within a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: DeclarationKind,

    pub name: String,

    pub parameters: Vec<Parameter>,

    /// Declared return type; defaults to "void"
    pub return_type: String,

    /// Attached documentation text (JSDoc), if any
    pub docs: Option<String>,

    pub is_async: bool,

    /// Whether the declaration (or its enclosing statement) is exported
    pub exported: bool,

    /// Visibility of class members ("public" unless marked otherwise)
    pub visibility: String,

    /// 1-based line of the declaration
    pub line: usize,

    /// Enclosing class for methods
    pub parent_class: Option<String>,
}

impl Declaration {
    /// Render a compact "name(params): ret" signature for display
    pub fn display_signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                let opt = if p.optional { "?" } else { "" };
                format!("{}{}: {}", p.name, opt, p.type_name)
            })
            .collect();
        format!("{}({}): {}", self.name, params.join(", "), self.return_type)
    }
}

/// How an imported name was bound locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
}

/// One local binding created by an import statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Module specifier as written in the source
    pub specifier: String,

    /// Name the binding is visible under in the importing file
    pub local_name: String,

    /// Name exported by the source module ("default" / "*" as applicable)
    pub imported_name: String,

    pub kind: ImportKind,

    /// Resolved absolute file path; None for external/unresolved modules
    pub resolved_path: Option<PathBuf>,
}

/// Which table authoritatively resolved a call edge. A resolved edge has
/// exactly one source; edges matching neither are never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Local,
    Import,
}

/// A directed, resolved call from one declaration to another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEdge {
    /// Name of the calling declaration (or entry point)
    pub caller: String,

    /// Callee name as written at the call site
    pub callee: String,

    /// Display name for diagram labels (e.g. "ns.fn" for namespace calls)
    pub display_name: String,

    /// True for `await f()` call sites
    pub is_async: bool,

    /// 1-based line of the call site
    pub line: usize,

    /// Declaring file for cross-file callees; None for same-file calls
    pub resolved_path: Option<PathBuf>,

    /// Symbol name in the declaring file, when it differs from the callee
    pub resolved_symbol: Option<String>,

    pub source: ResolutionSource,
}

impl CallEdge {
    /// Name to look the callee up under in the declaring file
    pub fn target_symbol(&self) -> &str {
        self.resolved_symbol.as_deref().unwrap_or(&self.callee)
    }
}

/// A detected externally-invokable handler registration, used as the root
/// of an interaction diagram. Its `execute` body has already been distilled
/// into call edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,

    pub description: Option<String>,

    /// 1-based line of the registration call
    pub line: usize,

    /// Call edges extracted from the registration's execute body
    pub edges: Vec<CallEdge>,
}

/// A re-export binding (`export { x } from "./y"`), kept so alias chains
/// can be followed to the declaring file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReExport {
    pub specifier: String,

    pub local_name: String,

    pub exported_name: String,

    pub resolved_path: Option<PathBuf>,
}

/// Complete single-pass analysis of one source file. Created on first
/// reference through the analysis context and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Normalized absolute path
    pub path: PathBuf,

    /// Declarations in source order
    pub declarations: Vec<Declaration>,

    pub imports: Vec<ImportBinding>,

    pub re_exports: Vec<ReExport>,

    /// Outgoing call edges keyed by declaring function/method name
    pub call_edges: HashMap<String, Vec<CallEdge>>,

    pub entry_points: Vec<EntryPoint>,
}

impl FileAnalysis {
    /// Look up a declaration by name
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    /// Outgoing edges of a declaration, if any were recorded
    pub fn edges_of(&self, name: &str) -> &[CallEdge] {
        self.call_edges.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has_exports(&self) -> bool {
        self.declarations.iter().any(|d| d.exported)
    }
}
