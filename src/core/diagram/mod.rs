//! Mermaid diagram synthesis from call-graph analysis.
//!
//! Two modes share the sanitizers: structural diagrams (class diagrams and
//! call-flow flowcharts) built directly from declarations and edges, and
//! interaction diagrams built per entry point by bounded traversal.

mod sanitize;
mod sequence;
mod structure;

use std::path::PathBuf;

pub use sanitize::{sanitize_identifier, sanitize_label, sanitize_type};
pub use sequence::{DiagramStep, SequenceSynthesizer};
pub use structure::StructureSynthesizer;

/// One synthesized diagram with its (file, line) provenance, used later to
/// merge validation results.
#[derive(Debug, Clone)]
pub struct Diagram {
    pub file: PathBuf,
    pub line: usize,
    pub title: String,
    pub text: String,
}
