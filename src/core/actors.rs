use serde::{Deserialize, Serialize};

/// Architectural role a callee participates as in an interaction diagram.
/// A small closed set; everything unrecognized is Internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    ModelInteraction,
    Scheduling,
    Orchestration,
    Validation,
    Storage,
    Executor,
    Internal,
}

impl Role {
    /// Participant identifier used in sequence diagrams
    pub fn participant(&self) -> &'static str {
        match self {
            Role::ModelInteraction => "Model",
            Role::Scheduling => "Scheduler",
            Role::Orchestration => "Orchestrator",
            Role::Validation => "Validator",
            Role::Storage => "Storage",
            Role::Executor => "Executor",
            Role::Internal => "Internal",
        }
    }
}

struct RoleRule {
    role: Role,
    keywords: &'static [&'static str],
}

/// Ordered rule table, first match wins. Model interaction is checked
/// before runtime/scheduling, then orchestration, validation, storage and
/// the generic executor bucket. The keyword lists are heuristics; the
/// ordering is the contract.
const ROLE_RULES: &[RoleRule] = &[
    RoleRule {
        role: Role::ModelInteraction,
        keywords: &["llm", "model", "prompt", "completion", "embed", "inference"],
    },
    RoleRule {
        role: Role::Scheduling,
        keywords: &["schedul", "queue", "worker", "timer", "cron", "runtime"],
    },
    RoleRule {
        role: Role::Orchestration,
        keywords: &["orchestrat", "pipeline", "coordinat", "dispatch", "engine"],
    },
    RoleRule {
        role: Role::Validation,
        keywords: &["validat", "verif", "check", "lint"],
    },
    RoleRule {
        role: Role::Storage,
        keywords: &["cache", "store", "persist", "repo", "database", "save", "load"],
    },
    RoleRule {
        role: Role::Executor,
        keywords: &["execut", "run", "invoke", "spawn", "launch"],
    },
];

/// Map a callee's name and documentation to a role. Pure and deterministic:
/// the same inputs always select the same rule.
pub fn classify(name: &str, docs: Option<&str>) -> Role {
    let mut haystack = name.to_lowercase();
    if let Some(docs) = docs {
        haystack.push(' ');
        haystack.push_str(&docs.to_lowercase());
    }

    for rule in ROLE_RULES {
        if rule.keywords.iter().any(|k| haystack.contains(k)) {
            return rule.role;
        }
    }
    Role::Internal
}

/// Pick a human-readable step label for a callee.
///
/// Preference order: an explicit `@summary` tag, else the first doc line
/// when it is short narrative text, else the bare callee name.
pub fn step_label(callee: &str, docs: Option<&str>, max_length: usize) -> String {
    let docs = match docs {
        Some(d) => d,
        None => return callee.to_string(),
    };

    for line in docs.lines() {
        let trimmed = line.trim();
        if let Some(summary) = trimmed.strip_prefix("@summary") {
            let summary = summary.trim();
            if !summary.is_empty() {
                return summary.to_string();
            }
        }
    }

    if let Some(first) = docs.lines().next() {
        let first = first.trim();
        if !first.is_empty()
            && !first.starts_with('@')
            && first.len() < max_length
            && is_narrative(first)
        {
            return first.to_string();
        }
    }

    callee.to_string()
}

/// Narrative-language check: plain ASCII prose with at least one letter
fn is_narrative(text: &str) -> bool {
    text.is_ascii() && text.chars().any(|c| c.is_ascii_alphabetic())
}
