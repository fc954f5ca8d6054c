use tree_sitter::{Node, Parser, Tree};

use crate::error::{ChartsmithError, Result};
use super::model::{
    Declaration, DeclarationKind, ImportBinding, ImportKind, Parameter, ReExport,
};

/// Entry-point registration as found in the syntax tree. The `execute` body
/// node is kept alive only for the duration of the per-file analysis; the
/// call graph builder distills it into edges before the tree is dropped.
pub struct RawEntryPoint<'t> {
    pub name: String,
    pub description: Option<String>,
    pub line: usize,
    pub execute_body: Node<'t>,
}

/// A declaration body pending call extraction
pub struct RawBody<'t> {
    pub owner: String,
    pub node: Node<'t>,
}

/// Everything extracted from one file's syntax tree. Import bindings and
/// re-exports still carry `resolved_path: None`; the import resolver fills
/// them in afterwards.
pub struct FileExtraction<'t> {
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportBinding>,
    pub re_exports: Vec<ReExport>,
    pub bodies: Vec<RawBody<'t>>,
    pub entry_points: Vec<RawEntryPoint<'t>>,
}

/// TypeScript declaration extractor using Tree-sitter.
///
/// Extraction never aborts the run: Tree-sitter recovers from malformed
/// input and we keep whatever declarations survive.
pub struct DeclarationExtractor {
    parser: Parser,
}

impl DeclarationExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_typescript::language_typescript();
        parser.set_language(&language)
            .map_err(|e| ChartsmithError::Parser(format!("Failed to set TypeScript language: {}", e)))?;

        Ok(Self { parser })
    }

    pub fn parse(&mut self, content: &str) -> Result<Tree> {
        self.parser.parse(content, None)
            .ok_or_else(|| ChartsmithError::Parser("Failed to parse TypeScript code".to_string()))
    }

    /// Walk a parsed file and extract declarations, imports and entry-point
    /// registrations.
    pub fn extract<'t>(&self, root: Node<'t>, source: &str) -> FileExtraction<'t> {
        let mut extraction = FileExtraction {
            declarations: Vec::new(),
            imports: Vec::new(),
            re_exports: Vec::new(),
            bodies: Vec::new(),
            entry_points: Vec::new(),
        };

        self.extract_items(root, source, false, &mut extraction);
        extraction
    }

    fn extract_items<'t>(
        &self,
        node: Node<'t>,
        source: &str,
        exported: bool,
        out: &mut FileExtraction<'t>,
    ) {
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_statement" => {
                    self.parse_import(child, source, out);
                }
                "export_statement" => {
                    if child.child_by_field_name("source").is_some() {
                        self.parse_re_export(child, source, out);
                    } else {
                        // Declarations nested under an export statement
                        // inherit the exported flag
                        self.extract_items(child, source, true, out);
                    }
                }
                "function_declaration" => {
                    self.parse_function(child, source, exported, out);
                }
                "lexical_declaration" | "variable_declaration" => {
                    self.parse_function_binding(child, source, exported, out);
                }
                "class_declaration" => {
                    self.parse_class(child, source, exported, out);
                }
                "interface_declaration" => {
                    self.parse_type_like(child, source, exported, DeclarationKind::Interface, out);
                }
                "type_alias_declaration" => {
                    self.parse_type_like(child, source, exported, DeclarationKind::TypeAlias, out);
                }
                "expression_statement" => {
                    self.detect_entry_points(child, source, out);
                }
                _ => {
                    // Recursively check child nodes
                    self.extract_items(child, source, exported, out);
                }
            }
        }
    }

    /// Parse an import statement into local-name bindings
    fn parse_import<'t>(&self, node: Node<'t>, source: &str, out: &mut FileExtraction<'t>) {
        let specifier = match node.child_by_field_name("source") {
            Some(s) => self.string_literal_text(s, source),
            None => return,
        };
        let specifier = match specifier {
            Some(s) => s,
            None => return,
        };

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }

            let mut clause_cursor = child.walk();
            for clause_child in child.children(&mut clause_cursor) {
                match clause_child.kind() {
                    "identifier" => {
                        // `import foo from "..."`
                        let local = self.node_text(clause_child, source);
                        out.imports.push(ImportBinding {
                            specifier: specifier.clone(),
                            local_name: local,
                            imported_name: "default".to_string(),
                            kind: ImportKind::Default,
                            resolved_path: None,
                        });
                    }
                    "namespace_import" => {
                        // `import * as ns from "..."`
                        if let Some(name_node) = self.find_child(clause_child, "identifier") {
                            let local = self.node_text(name_node, source);
                            out.imports.push(ImportBinding {
                                specifier: specifier.clone(),
                                local_name: local,
                                imported_name: "*".to_string(),
                                kind: ImportKind::Namespace,
                                resolved_path: None,
                            });
                        }
                    }
                    "named_imports" => {
                        let mut named_cursor = clause_child.walk();
                        for spec in clause_child.children(&mut named_cursor) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let imported = spec.child_by_field_name("name")
                                .map(|n| self.node_text(n, source));
                            let alias = spec.child_by_field_name("alias")
                                .map(|n| self.node_text(n, source));

                            if let Some(imported) = imported {
                                out.imports.push(ImportBinding {
                                    specifier: specifier.clone(),
                                    local_name: alias.unwrap_or_else(|| imported.clone()),
                                    imported_name: imported,
                                    kind: ImportKind::Named,
                                    resolved_path: None,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Parse `export { a as b } from "./x"` into re-export bindings
    fn parse_re_export<'t>(&self, node: Node<'t>, source: &str, out: &mut FileExtraction<'t>) {
        let specifier = match node.child_by_field_name("source")
            .and_then(|s| self.string_literal_text(s, source))
        {
            Some(s) => s,
            None => return,
        };

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "export_clause" {
                continue;
            }
            let mut clause_cursor = child.walk();
            for spec in child.children(&mut clause_cursor) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let name = spec.child_by_field_name("name")
                    .map(|n| self.node_text(n, source));
                let alias = spec.child_by_field_name("alias")
                    .map(|n| self.node_text(n, source));

                if let Some(name) = name {
                    out.re_exports.push(ReExport {
                        specifier: specifier.clone(),
                        exported_name: alias.unwrap_or_else(|| name.clone()),
                        local_name: name,
                        resolved_path: None,
                    });
                }
            }
        }
    }

    fn parse_function<'t>(
        &self,
        node: Node<'t>,
        source: &str,
        exported: bool,
        out: &mut FileExtraction<'t>,
    ) {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.node_text(n, source),
            None => return,
        };

        let declaration = Declaration {
            kind: DeclarationKind::Function,
            name: name.clone(),
            parameters: self.extract_parameters(node, source),
            return_type: self.extract_return_type(node, source),
            docs: self.extract_docs_before_node(node, source),
            is_async: self.has_async_keyword(node, source),
            exported,
            visibility: "public".to_string(),
            line: node.start_position().row + 1,
            parent_class: None,
        };
        out.declarations.push(declaration);

        if let Some(body) = node.child_by_field_name("body") {
            out.bodies.push(RawBody { owner: name, node: body });
        }
    }

    /// Parse `const f = (..) => ..` / `const f = function (..) {..}` bindings
    fn parse_function_binding<'t>(
        &self,
        node: Node<'t>,
        source: &str,
        exported: bool,
        out: &mut FileExtraction<'t>,
    ) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "variable_declarator" {
                continue;
            }
            let name_node = child.child_by_field_name("name");
            let value_node = child.child_by_field_name("value");

            if let (Some(name_node), Some(value)) = (name_node, value_node) {
                if value.kind() != "arrow_function" && value.kind() != "function_expression" {
                    continue;
                }
                let name = self.node_text(name_node, source);

                out.declarations.push(Declaration {
                    kind: DeclarationKind::Function,
                    name: name.clone(),
                    parameters: self.extract_parameters(value, source),
                    return_type: self.extract_return_type(value, source),
                    docs: self.extract_docs_before_node(node, source),
                    is_async: self.has_async_keyword(value, source),
                    exported,
                    visibility: "public".to_string(),
                    line: node.start_position().row + 1,
                    parent_class: None,
                });

                if let Some(body) = value.child_by_field_name("body") {
                    out.bodies.push(RawBody { owner: name, node: body });
                }
            }
        }
    }

    fn parse_class<'t>(
        &self,
        node: Node<'t>,
        source: &str,
        exported: bool,
        out: &mut FileExtraction<'t>,
    ) {
        let class_name = match node.child_by_field_name("name") {
            Some(n) => self.node_text(n, source),
            None => return,
        };

        out.declarations.push(Declaration {
            kind: DeclarationKind::Class,
            name: class_name.clone(),
            parameters: Vec::new(),
            return_type: "void".to_string(),
            docs: self.extract_docs_before_node(node, source),
            is_async: false,
            exported,
            visibility: "public".to_string(),
            line: node.start_position().row + 1,
            parent_class: None,
        });

        let body = match node.child_by_field_name("body") {
            Some(b) => b,
            None => return,
        };

        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            if member.kind() != "method_definition" {
                continue;
            }
            let method_name = match member.child_by_field_name("name") {
                Some(n) => self.node_text(n, source),
                None => continue,
            };

            out.declarations.push(Declaration {
                kind: DeclarationKind::Method,
                name: method_name.clone(),
                parameters: self.extract_parameters(member, source),
                return_type: self.extract_return_type(member, source),
                docs: self.extract_docs_before_node(member, source),
                is_async: self.has_async_keyword(member, source),
                exported,
                visibility: self.member_visibility(member, source),
                line: member.start_position().row + 1,
                parent_class: Some(class_name.clone()),
            });

            if let Some(method_body) = member.child_by_field_name("body") {
                out.bodies.push(RawBody { owner: method_name, node: method_body });
            }
        }
    }

    fn parse_type_like<'t>(
        &self,
        node: Node<'t>,
        source: &str,
        exported: bool,
        kind: DeclarationKind,
        out: &mut FileExtraction<'t>,
    ) {
        if let Some(name_node) = node.child_by_field_name("name") {
            out.declarations.push(Declaration {
                kind,
                name: self.node_text(name_node, source),
                parameters: Vec::new(),
                return_type: "void".to_string(),
                docs: self.extract_docs_before_node(node, source),
                is_async: false,
                exported,
                visibility: "public".to_string(),
                line: node.start_position().row + 1,
                parent_class: None,
            });
        }
    }

    /// Detect `register(...)({ name, description, execute })` registrations.
    ///
    /// A missing or non-literal `name` ignores the registration; `execute`
    /// may be an inline function value or a method-shorthand body.
    fn detect_entry_points<'t>(&self, node: Node<'t>, source: &str, out: &mut FileExtraction<'t>) {
        if node.kind() == "call_expression" {
            if let Some(entry) = self.parse_registration(node, source) {
                out.entry_points.push(entry);
                return;
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.detect_entry_points(child, source, out);
        }
    }

    fn parse_registration<'t>(&self, node: Node<'t>, source: &str) -> Option<RawEntryPoint<'t>> {
        // Shape: outer call whose function is itself a call, e.g.
        // `registerCommand(registry)({ ... })`
        let inner = node.child_by_field_name("function")?;
        if inner.kind() != "call_expression" {
            return None;
        }
        let register_fn = inner.child_by_field_name("function")?;
        let register_name = self.node_text(register_fn, source);
        let tail = register_name.rsplit('.').next().unwrap_or(&register_name);
        if !tail.to_lowercase().contains("register") {
            return None;
        }

        let args = node.child_by_field_name("arguments")?;
        let config = self.find_child(args, "object")?;

        let mut name = None;
        let mut description = None;
        let mut execute_body = None;

        let mut cursor = config.walk();
        for prop in config.children(&mut cursor) {
            match prop.kind() {
                "pair" => {
                    let key = prop.child_by_field_name("key")
                        .map(|k| self.node_text(k, source));
                    let value = prop.child_by_field_name("value");
                    match (key.as_deref(), value) {
                        (Some("name"), Some(v)) => {
                            name = self.string_literal_text(v, source);
                        }
                        (Some("description"), Some(v)) => {
                            description = self.string_literal_text(v, source);
                        }
                        (Some("execute"), Some(v)) => {
                            if v.kind() == "arrow_function" || v.kind() == "function_expression" {
                                execute_body = v.child_by_field_name("body");
                            }
                        }
                        _ => {}
                    }
                }
                "method_definition" => {
                    // `execute() { ... }` shorthand
                    let is_execute = prop.child_by_field_name("name")
                        .map(|n| self.node_text(n, source) == "execute")
                        .unwrap_or(false);
                    if is_execute {
                        execute_body = prop.child_by_field_name("body");
                    }
                }
                _ => {}
            }
        }

        match (name, execute_body) {
            (Some(name), Some(body)) => Some(RawEntryPoint {
                name,
                description,
                line: node.start_position().row + 1,
                execute_body: body,
            }),
            _ => None,
        }
    }

    fn extract_parameters(&self, node: Node, source: &str) -> Vec<Parameter> {
        let params_node = node.child_by_field_name("parameters")
            .or_else(|| node.child_by_field_name("parameter"));
        let params_node = match params_node {
            Some(p) => p,
            None => return Vec::new(),
        };

        // Single-identifier arrow shorthand: `x => ...`
        if params_node.kind() == "identifier" {
            return vec![Parameter {
                name: self.node_text(params_node, source),
                type_name: "any".to_string(),
                optional: false,
            }];
        }

        let mut parameters = Vec::new();
        let mut cursor = params_node.walk();
        for param in params_node.children(&mut cursor) {
            match param.kind() {
                "required_parameter" | "optional_parameter" => {
                    let name = param.child_by_field_name("pattern")
                        .map(|p| self.node_text(p, source))
                        .unwrap_or_default();
                    if name.is_empty() {
                        continue;
                    }
                    let type_name = param.child_by_field_name("type")
                        .map(|t| self.type_annotation_text(t, source))
                        .unwrap_or_else(|| "any".to_string());
                    parameters.push(Parameter {
                        name,
                        type_name,
                        optional: param.kind() == "optional_parameter",
                    });
                }
                "identifier" => {
                    parameters.push(Parameter {
                        name: self.node_text(param, source),
                        type_name: "any".to_string(),
                        optional: false,
                    });
                }
                _ => {}
            }
        }

        parameters
    }

    fn extract_return_type(&self, node: Node, source: &str) -> String {
        node.child_by_field_name("return_type")
            .map(|t| self.type_annotation_text(t, source))
            .unwrap_or_else(|| "void".to_string())
    }

    /// Text of a type annotation with the leading `:` stripped
    fn type_annotation_text(&self, node: Node, source: &str) -> String {
        let text = self.node_text(node, source);
        text.trim_start_matches(':').trim().to_string()
    }

    fn member_visibility(&self, node: Node, source: &str) -> String {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "accessibility_modifier" {
                return self.node_text(child, source);
            }
        }
        "public".to_string()
    }

    fn has_async_keyword(&self, node: Node, source: &str) -> bool {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "async" {
                return true;
            }
            // Keyword may sit before the field children with no named kind
            if !child.is_named() && self.node_text(child, source) == "async" {
                return true;
            }
        }
        false
    }

    /// Unquoted text of a string literal; None for anything else
    fn string_literal_text(&self, node: Node, source: &str) -> Option<String> {
        if node.kind() != "string" {
            return None;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "string_fragment" {
                return Some(self.node_text(child, source));
            }
        }
        // Empty string literal has no fragment
        Some(String::new())
    }

    fn find_child<'t>(&self, node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).find(|c| c.kind() == kind);
        found
    }

    /// Extract text content of a node
    fn node_text(&self, node: Node, source: &str) -> String {
        source[node.byte_range()].to_string()
    }

    /// Extract JSDoc comments before a node
    fn extract_docs_before_node(&self, node: Node, source: &str) -> Option<String> {
        let start_row = node.start_position().row;
        let lines: Vec<&str> = source.lines().collect();
        let mut doc_lines = Vec::new();
        let mut in_jsdoc = false;

        // Look backwards from the node's line for JSDoc comments
        for i in (0..start_row).rev() {
            if i >= lines.len() {
                continue;
            }

            let line = lines[i].trim();

            if line.ends_with("*/") && !in_jsdoc {
                // Single-line JSDoc opens and closes on the same line
                if line.starts_with("/**") {
                    let content = line
                        .trim_start_matches("/**")
                        .trim_end_matches("*/")
                        .trim();
                    if !content.is_empty() {
                        doc_lines.insert(0, content.to_string());
                    }
                    break;
                }
                in_jsdoc = true;
                let content = line.trim_end_matches("*/").trim_start_matches("*").trim();
                if !content.is_empty() {
                    doc_lines.insert(0, content.to_string());
                }
            } else if in_jsdoc {
                if line.starts_with("/**") {
                    let content = line.trim_start_matches("/**").trim();
                    if !content.is_empty() && content != "*/" {
                        doc_lines.insert(0, content.to_string());
                    }
                    break;
                } else {
                    let content = line.trim_start_matches("*").trim();
                    if !content.is_empty() {
                        doc_lines.insert(0, content.to_string());
                    }
                }
            } else if line.starts_with("//") {
                let content = line.trim_start_matches("//").trim();
                if !content.is_empty() {
                    doc_lines.insert(0, content.to_string());
                } else {
                    break;
                }
            } else if line.is_empty() {
                continue;
            } else {
                // Hit code, stop looking
                break;
            }
        }

        if doc_lines.is_empty() {
            None
        } else {
            Some(doc_lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> (Vec<Declaration>, Vec<ImportBinding>, usize) {
        let mut extractor = DeclarationExtractor::new().unwrap();
        let tree = extractor.parse(source).unwrap();
        let extraction = extractor.extract(tree.root_node(), source);
        (
            extraction.declarations,
            extraction.imports,
            extraction.entry_points.len(),
        )
    }

    #[test]
    fn test_extract_exported_async_function() {
        let source = r#"
/** Fetches remote data. */
export async function fetchData(url: string, retries?: number): Promise<string> {
    return load(url);
}
"#;
        let (decls, _, _) = extract(source);
        assert_eq!(decls.len(), 1);

        let f = &decls[0];
        assert_eq!(f.name, "fetchData");
        assert_eq!(f.kind, DeclarationKind::Function);
        assert!(f.is_async);
        assert!(f.exported);
        assert_eq!(f.return_type, "Promise<string>");
        assert_eq!(f.parameters.len(), 2);
        assert_eq!(f.parameters[0].type_name, "string");
        assert!(f.parameters[1].optional);
        assert_eq!(f.docs.as_deref(), Some("Fetches remote data."));
    }

    #[test]
    fn test_single_line_jsdoc_captured_without_markers() {
        let source = r#"
const unrelated = 1;
/** Saves the cache to disk. */
function persist(): void {}
"#;
        let (decls, _, _) = extract(source);
        let f = decls.iter().find(|d| d.name == "persist").unwrap();
        // Markers stripped, and the scan stops at the comment line
        assert_eq!(f.docs.as_deref(), Some("Saves the cache to disk."));
    }

    #[test]
    fn test_parameter_type_defaults_to_any() {
        let source = "function greet(who) { return who; }";
        let (decls, _, _) = extract(source);
        assert_eq!(decls[0].parameters[0].type_name, "any");
        assert_eq!(decls[0].return_type, "void");
        assert!(!decls[0].exported);
    }

    #[test]
    fn test_extract_arrow_function_binding() {
        let source = "export const doubler = async (n: number): Promise<number> => n * 2;";
        let (decls, _, _) = extract(source);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "doubler");
        assert!(decls[0].is_async);
        assert!(decls[0].exported);
    }

    #[test]
    fn test_extract_class_with_private_method() {
        let source = r#"
export class Store {
    save(key: string): void {}
    private flush(): void {}
}
"#;
        let (decls, _, _) = extract(source);
        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0].kind, DeclarationKind::Class);
        assert_eq!(decls[1].name, "save");
        assert_eq!(decls[1].parent_class.as_deref(), Some("Store"));
        assert_eq!(decls[2].visibility, "private");
    }

    #[test]
    fn test_extract_imports() {
        let source = r#"
import fallback from "./fallback";
import { helper, other as renamed } from "./util";
import * as fs from "fs";
"#;
        let (_, imports, _) = extract(source);
        assert_eq!(imports.len(), 4);
        assert_eq!(imports[0].kind, ImportKind::Default);
        assert_eq!(imports[1].local_name, "helper");
        assert_eq!(imports[2].local_name, "renamed");
        assert_eq!(imports[2].imported_name, "other");
        assert_eq!(imports[3].kind, ImportKind::Namespace);
        assert_eq!(imports[3].local_name, "fs");
    }

    #[test]
    fn test_entry_point_registration_detected() {
        let source = r#"
registerCommand(registry)({
    name: "sync",
    description: "Synchronize state",
    execute: async () => { doWork(); },
});
"#;
        let mut extractor = DeclarationExtractor::new().unwrap();
        let tree = extractor.parse(source).unwrap();
        let extraction = extractor.extract(tree.root_node(), source);
        assert_eq!(extraction.entry_points.len(), 1);
        assert_eq!(extraction.entry_points[0].name, "sync");
        assert_eq!(
            extraction.entry_points[0].description.as_deref(),
            Some("Synchronize state")
        );
    }

    #[test]
    fn test_entry_point_with_non_literal_name_ignored() {
        let source = r#"
registerCommand(registry)({
    name: dynamicName,
    execute: () => { doWork(); },
});
"#;
        let (_, _, entry_count) = extract(source);
        assert_eq!(entry_count, 0);
    }

    #[test]
    fn test_entry_point_method_shorthand_execute() {
        let source = r#"
registerTool(api)({
    name: "lint",
    execute() { check(); },
});
"#;
        let (_, _, entry_count) = extract(source);
        assert_eq!(entry_count, 1);
    }

    #[test]
    fn test_malformed_input_yields_partial_declarations() {
        let source = r#"
export function good(): void {}
function broken( {{{
"#;
        let (decls, _, _) = extract(source);
        assert!(decls.iter().any(|d| d.name == "good"));
    }
}
