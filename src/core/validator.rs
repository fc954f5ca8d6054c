use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::ValidationConfig;
use super::diagram::Diagram;

/// Diagram-type keywords a valid first line may start with
const DIAGRAM_KEYWORDS: &[&str] = &[
    "sequenceDiagram",
    "classDiagram",
    "flowchart",
    "graph",
    "stateDiagram",
    "erDiagram",
];

const MAX_ERROR_LENGTH: usize = 300;

/// A validation failure, keyed by the diagram's provenance
#[derive(Debug, Clone)]
pub struct DiagramIssue {
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub checked: usize,
    pub issues: Vec<DiagramIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validates synthesized diagram text.
///
/// A heuristic syntax check always runs; when an external renderer binary is
/// configured, each diagram is additionally rendered into a throwaway
/// temporary directory under a timeout. A missing binary silently falls back
/// to the heuristic result. Renderer failures degrade to reported issues,
/// never a crash.
pub struct DiagramValidator {
    renderer: Option<String>,
    timeout: Duration,
    max_concurrent: usize,
}

impl DiagramValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            renderer: config.renderer.clone(),
            timeout: Duration::from_secs(config.render_timeout_secs),
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Disable the external renderer, making the heuristic authoritative
    pub fn without_renderer(mut self) -> Self {
        self.renderer = None;
        self
    }

    /// Heuristic syntax check. Returns the failure reason, or None when the
    /// text looks valid.
    pub fn heuristic_check(text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return Some("empty diagram".to_string());
        }

        let first_line = text.lines().find(|l| !l.trim().is_empty())?;
        let recognized = DIAGRAM_KEYWORDS
            .iter()
            .any(|k| first_line.trim_start().starts_with(k));
        if !recognized {
            return Some(format!(
                "first line does not start with a diagram keyword: {}",
                first_line.trim()
            ));
        }

        for (index, line) in text.lines().enumerate() {
            if unescaped_quote_count(line) % 2 != 0 {
                return Some(format!("unmatched quotes on line {}", index + 1));
            }
        }

        None
    }

    /// Validate many diagrams concurrently under the worker bound. Tasks are
    /// independent: one failure or timeout never affects the others. Results
    /// are order-independent and merged by (file, line) provenance.
    pub async fn validate_all(&self, diagrams: &[Diagram]) -> ValidationReport {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut join_set = JoinSet::new();

        for diagram in diagrams {
            let diagram = diagram.clone();
            let renderer = self.renderer.clone();
            let timeout = self.timeout;
            let semaphore = semaphore.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                validate_one(diagram, renderer, timeout).await
            });
        }

        let mut issues = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some(issue)) => issues.push(issue),
                Ok(None) => {}
                Err(e) => warn!("Validation task failed: {}", e),
            }
        }

        issues.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));

        ValidationReport {
            checked: diagrams.len(),
            issues,
        }
    }
}

async fn validate_one(
    diagram: Diagram,
    renderer: Option<String>,
    timeout: Duration,
) -> Option<DiagramIssue> {
    if let Some(reason) = DiagramValidator::heuristic_check(&diagram.text) {
        return Some(DiagramIssue {
            file: diagram.file,
            line: diagram.line,
            message: reason,
        });
    }

    let renderer = renderer?;
    match render_check(&renderer, &diagram.text, timeout).await {
        RenderOutcome::Valid | RenderOutcome::Unavailable => None,
        RenderOutcome::Invalid(reason) => Some(DiagramIssue {
            file: diagram.file,
            line: diagram.line,
            message: reason,
        }),
    }
}

enum RenderOutcome {
    Valid,
    Invalid(String),
    /// Renderer binary missing; the heuristic result stands
    Unavailable,
}

/// Render the diagram to a throwaway file in a fresh temporary directory.
/// The directory is removed on every exit path (RAII).
async fn render_check(renderer: &str, text: &str, timeout: Duration) -> RenderOutcome {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Could not create render directory: {}", e);
            return RenderOutcome::Unavailable;
        }
    };

    let input = dir.path().join("diagram.mmd");
    let output = dir.path().join("diagram.svg");
    if let Err(e) = std::fs::write(&input, text) {
        warn!("Could not write render input: {}", e);
        return RenderOutcome::Unavailable;
    }

    let command = tokio::process::Command::new(renderer)
        .arg(&input)
        .arg(&output)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, command).await {
        Err(_) => RenderOutcome::Invalid(format!(
            "renderer timed out after {}s",
            timeout.as_secs()
        )),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Renderer '{}' not found, using heuristic result", renderer);
            RenderOutcome::Unavailable
        }
        Ok(Err(e)) => RenderOutcome::Invalid(format!("renderer failed to start: {}", e)),
        Ok(Ok(output)) if output.status.success() => RenderOutcome::Valid,
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            RenderOutcome::Invalid(clean_error(&stderr))
        }
    }
}

/// Reduce renderer stderr to a short single-line message
fn clean_error(raw: &str) -> String {
    let joined = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    let cleaned = if joined.is_empty() {
        "renderer exited with an error".to_string()
    } else {
        joined
    };

    if cleaned.len() > MAX_ERROR_LENGTH {
        let truncated: String = cleaned.chars().take(MAX_ERROR_LENGTH).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

fn unescaped_quote_count(line: &str) -> usize {
    let mut count = 0;
    let mut previous_was_escape = false;
    for c in line.chars() {
        if c == '"' && !previous_was_escape {
            count += 1;
        }
        previous_was_escape = c == '\\' && !previous_was_escape;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn diagram(text: &str) -> Diagram {
        Diagram {
            file: PathBuf::from("/src/a.ts"),
            line: 10,
            title: "test".to_string(),
            text: text.to_string(),
        }
    }

    fn validator() -> DiagramValidator {
        DiagramValidator::new(&ValidationConfig {
            renderer: None,
            render_timeout_secs: 5,
            max_concurrent: 2,
        })
    }

    #[test]
    fn test_empty_text_rejected() {
        assert_eq!(
            DiagramValidator::heuristic_check("  \n "),
            Some("empty diagram".to_string())
        );
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let reason = DiagramValidator::heuristic_check("notADiagram\nA --> B").unwrap();
        assert!(reason.contains("diagram keyword"));
    }

    #[test]
    fn test_unbalanced_quote_rejected() {
        let reason =
            DiagramValidator::heuristic_check("sequenceDiagram\nA->>B: \"open").unwrap();
        assert!(reason.contains("unmatched quotes"));
    }

    #[test]
    fn test_escaped_quote_not_counted() {
        let text = "sequenceDiagram\nA->>B: say \\\" once";
        assert_eq!(DiagramValidator::heuristic_check(text), None);
    }

    #[test]
    fn test_valid_diagram_passes() {
        let text = "sequenceDiagram\n    participant A\n    A->>B: \"hello\"";
        assert_eq!(DiagramValidator::heuristic_check(text), None);
    }

    #[tokio::test]
    async fn test_batch_validation_merges_by_provenance() {
        let diagrams = vec![
            Diagram {
                file: PathBuf::from("/src/b.ts"),
                line: 5,
                title: "bad-quote".to_string(),
                text: "sequenceDiagram\nA->>B: \"open".to_string(),
            },
            diagram("flowchart TD\n    a --> b"),
            Diagram {
                file: PathBuf::from("/src/a.ts"),
                line: 2,
                title: "bad-keyword".to_string(),
                text: "mystery\n".to_string(),
            },
        ];

        let report = validator().validate_all(&diagrams).await;
        assert_eq!(report.checked, 3);
        assert_eq!(report.issues.len(), 2);
        assert!(!report.is_valid());

        // Sorted by (file, line)
        assert_eq!(report.issues[0].file, Path::new("/src/a.ts"));
        assert_eq!(report.issues[0].line, 2);
        assert_eq!(report.issues[1].file, Path::new("/src/b.ts"));
        assert_eq!(report.issues[1].line, 5);
    }

    #[tokio::test]
    async fn test_missing_renderer_falls_back_to_heuristic() {
        let validator = DiagramValidator::new(&ValidationConfig {
            renderer: Some("definitely-not-a-real-renderer-binary".to_string()),
            render_timeout_secs: 5,
            max_concurrent: 2,
        });

        let report = validator
            .validate_all(&[diagram("flowchart TD\n    a --> b")])
            .await;
        assert!(report.is_valid());
    }

    #[test]
    fn test_clean_error_truncates_and_joins() {
        let raw = "line one\n\n  line two  \n";
        assert_eq!(clean_error(raw), "line one; line two");

        let long = "x".repeat(500);
        assert!(clean_error(&long).len() <= MAX_ERROR_LENGTH + 3);
    }
}
