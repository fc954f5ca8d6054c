/// Identifier and type sanitization shared by both diagram modes.
///
/// Mermaid is unforgiving about identifiers; everything emitted as a node or
/// participant id goes through `sanitize_identifier` first.

/// Words Mermaid treats as syntax; identifiers colliding with one are renamed
const RESERVED_WORDS: &[&str] = &[
    "end", "loop", "alt", "opt", "par", "rect", "note", "participant",
    "actor", "class", "graph", "subgraph", "style", "direction",
];

const MAX_TYPE_LENGTH: usize = 30;

/// Make an arbitrary string safe to use as a Mermaid identifier.
///
/// Strips everything outside `[A-Za-z0-9_]`, collapses repeated underscores,
/// trims leading/trailing underscores, prefixes a letter when digit-leading,
/// substitutes a placeholder when nothing remains, and renames collisions
/// with the reserved-word list. Already-valid identifiers pass unchanged.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut last_was_underscore = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            cleaned.push(c);
            last_was_underscore = false;
        } else if c == '_' {
            if !last_was_underscore {
                cleaned.push('_');
            }
            last_was_underscore = true;
        }
        // Everything else is stripped
    }

    let mut cleaned = cleaned.trim_matches('_').to_string();

    if cleaned.is_empty() {
        cleaned = "item".to_string();
    }
    if cleaned.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        cleaned.insert(0, 'n');
    }
    if RESERVED_WORDS.contains(&cleaned.as_str()) {
        cleaned.push('_');
    }

    cleaned
}

/// Sanitize a type annotation for display inside a class diagram: strip
/// module-qualifier prefixes and whitespace, truncate, then apply the same
/// character restriction as identifiers.
pub fn sanitize_type(raw: &str) -> String {
    let unqualified = raw.rsplit('.').next().unwrap_or(raw);
    let compact: String = unqualified.chars().filter(|c| !c.is_whitespace()).collect();
    let truncated: String = compact.chars().take(MAX_TYPE_LENGTH).collect();
    truncated
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Flatten free text into a single safe diagram label line
pub fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' | ';' | '#' => ' ',
            other => other,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid(id: &str) -> bool {
        let pattern = regex::Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap();
        pattern.is_match(id)
    }

    #[test]
    fn test_valid_identifier_unchanged() {
        assert_eq!(sanitize_identifier("fetchData"), "fetchData");
        assert_eq!(sanitize_identifier("snake_case_name"), "snake_case_name");
    }

    #[test]
    fn test_sanitized_output_always_valid() {
        let inputs = [
            "fetch-data!",
            "a..b//c",
            "__trimmed__",
            "42things",
            "",
            "---",
            "ステップ",
            "weird  spaces",
        ];
        for input in inputs {
            let out = sanitize_identifier(input);
            assert!(is_valid(&out), "{:?} -> {:?}", input, out);
            assert!(!out.is_empty());
        }
    }

    #[test]
    fn test_repeated_underscores_collapsed() {
        assert_eq!(sanitize_identifier("a__b___c"), "a_b_c");
    }

    #[test]
    fn test_digit_leading_gets_letter_prefix() {
        assert_eq!(sanitize_identifier("42nd"), "n42nd");
    }

    #[test]
    fn test_empty_input_gets_placeholder() {
        assert_eq!(sanitize_identifier("!!!"), "item");
    }

    #[test]
    fn test_reserved_words_renamed() {
        let renamed = sanitize_identifier("end");
        assert_ne!(renamed, "end");
        assert!(is_valid(&renamed));
    }

    #[test]
    fn test_type_sanitizer_strips_qualifiers_and_whitespace() {
        assert_eq!(sanitize_type("api.Response"), "Response");
        assert_eq!(sanitize_type("Map<string, number>"), "Mapstringnumber");
    }

    #[test]
    fn test_type_sanitizer_truncates() {
        let long = "AnExtremelyLongGenericTypeNameThatKeepsGoingForever";
        assert!(sanitize_type(long).len() <= 30);
    }

    #[test]
    fn test_label_sanitizer_removes_quotes_and_newlines() {
        assert_eq!(sanitize_label("say \"hi\"\nplease"), "say 'hi' please");
    }
}
