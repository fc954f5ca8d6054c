mod engine;
mod extractor;
mod model;

// Cross-file analysis
mod call_graph;
mod context;
mod resolver;

// Role classification and diagram synthesis
mod actors;
mod diagram;
mod validator;

pub use model::{
    CallEdge, Declaration, DeclarationKind, EntryPoint, FileAnalysis,
    ImportBinding, ImportKind, Parameter, ReExport, ResolutionSource,
};
pub use extractor::DeclarationExtractor;
pub use resolver::{create_resolver, normalize_path, HeuristicResolver, ImportResolver, ProgramResolver};
pub use context::AnalysisContext;
pub use call_graph::{collect_calls, CalleeExpr, RawCall};
pub use actors::{classify, step_label, Role};
pub use diagram::{
    sanitize_identifier, sanitize_label, sanitize_type,
    Diagram, DiagramStep, SequenceSynthesizer, StructureSynthesizer,
};
pub use validator::{DiagramIssue, DiagramValidator, ValidationReport};

// Export the main engine
pub use engine::Engine;
