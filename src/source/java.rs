//! Java source view using tree-sitter
//!
//! One tree-sitter parse yields both the token sequence (the leaves) and the
//! AST arena. Any ERROR or MISSING node makes the sample a syntax error.

use super::{Ast, Location, SourceView, SyntaxError, Token, TokenKind};
use tree_sitter::{Node, Parser, Tree};

/// Reserved words of the Java language
pub const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface",
    "long", "native", "new", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while",
];

const SEPARATORS: &[&str] = &["(", ")", "{", "}", "[", "]", ";", ",", ".", "@", "...", "::"];

/// Longest slice of offending text quoted in an error description
const MAX_ERROR_SNIPPET: usize = 24;

/// tree-sitter backed [`SourceView`] for Java.
///
/// Stateless: a parser is created per call, so one instance can be shared
/// by every worker thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaSourceView;

impl JavaSourceView {
    pub fn new() -> Self {
        Self
    }

    fn parse_tree(&self, text: &str) -> Result<Tree, SyntaxError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| SyntaxError::new(format!("failed to load Java grammar: {e}"), None))?;

        let tree = parser
            .parse(text, None)
            .ok_or_else(|| SyntaxError::new("parser produced no tree", None))?;

        if tree.root_node().has_error() {
            return Err(first_error(&tree, text.as_bytes()));
        }
        Ok(tree)
    }
}

impl SourceView for JavaSourceView {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, SyntaxError> {
        self.view(text).map(|(tokens, _)| tokens)
    }

    fn parse(&self, text: &str) -> Result<Ast, SyntaxError> {
        self.view(text).map(|(_, ast)| ast)
    }

    fn view(&self, text: &str) -> Result<(Vec<Token>, Ast), SyntaxError> {
        let tree = self.parse_tree(text)?;
        Ok(walk(&tree, text.as_bytes()))
    }
}

fn is_comment(kind: &str) -> bool {
    matches!(kind, "line_comment" | "block_comment" | "comment")
}

/// Literal nodes are single tokens even when the grammar gives them children
/// (string fragments, escape sequences).
fn is_literal(kind: &str) -> bool {
    (kind.ends_with("_literal") && kind != "class_literal")
        || matches!(kind, "true" | "false" | "text_block")
}

fn classify(node: &Node, text: &str) -> TokenKind {
    let kind = node.kind();
    if is_literal(kind) {
        TokenKind::Literal
    } else if JAVA_KEYWORDS.contains(&text) {
        TokenKind::Keyword
    } else if matches!(kind, "identifier" | "type_identifier") {
        TokenKind::Identifier
    } else if SEPARATORS.contains(&text) {
        TokenKind::Separator
    } else {
        TokenKind::Operator
    }
}

/// Pre-order walk with an explicit parent stack, so deep expression chains
/// cannot exhaust the call stack.
fn walk(tree: &Tree, source: &[u8]) -> (Vec<Token>, Ast) {
    let mut ast = Ast::new();
    let mut tokens = Vec::new();
    let mut parents: Vec<usize> = Vec::new();
    let mut cursor = tree.walk();

    loop {
        let node = cursor.node();
        let kind = node.kind();
        let mut descend = false;

        if !is_comment(kind) {
            let id = ast.push(kind, node.is_named(), parents.last().copied());
            let atomic = is_literal(kind);

            if atomic || node.child_count() == 0 {
                let text = node.utf8_text(source).unwrap_or_default();
                if !text.is_empty() {
                    let pos = node.start_position();
                    tokens.push(Token {
                        kind: classify(&node, text),
                        text: text.to_string(),
                        line: pos.row + 1,
                        column: pos.column + 1,
                    });
                }
            }

            if !atomic && cursor.goto_first_child() {
                parents.push(id);
                descend = true;
            }
        }

        if descend {
            continue;
        }

        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return (tokens, ast);
            }
            parents.pop();
        }
    }
}

/// Locate the first ERROR or MISSING node in document order.
fn first_error(tree: &Tree, source: &[u8]) -> SyntaxError {
    let mut stack = vec![tree.root_node()];

    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            let location = Some(Location {
                line: pos.row + 1,
                column: pos.column + 1,
            });
            let description = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                let text = node.utf8_text(source).unwrap_or_default().trim();
                let snippet: String = text.chars().take(MAX_ERROR_SNIPPET).collect();
                format!("unexpected `{}`", snippet)
            };
            return SyntaxError::new(description, location);
        }

        // Reverse push keeps document order on pop
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).filter(|c| c.has_error()).collect();
        stack.extend(children.into_iter().rev());
    }

    SyntaxError::new("syntax error", None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_class() {
        let view = JavaSourceView::new();
        let (tokens, ast) = view.view("class A{ int x; }").unwrap();

        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["class", "A", "{", "int", "x", ";", "}"]);
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Separator);
        assert_eq!(tokens[3].kind, TokenKind::Keyword);

        assert_eq!(ast.root().map(|n| n.kind), Some("program"));
        assert!(ast.nodes().iter().any(|n| n.kind == "class_declaration"));
        assert!(ast.nodes().iter().any(|n| n.kind == "field_declaration"));
    }

    #[test]
    fn test_string_literal_is_one_token() {
        let view = JavaSourceView::new();
        let tokens = view
            .tokenize(r#"class A { String s = "hello world"; }"#)
            .unwrap();

        let literals: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Literal)
            .collect();
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].text, "\"hello world\"");
        assert!(tokens.iter().any(|t| t.text == "=" && t.kind == TokenKind::Operator));
    }

    #[test]
    fn test_comments_are_skipped() {
        let view = JavaSourceView::new();
        let (tokens, ast) = view
            .view("// leading\nclass A { /* inner */ }")
            .unwrap();

        assert!(tokens.iter().all(|t| !t.text.contains("leading")));
        assert!(ast.nodes().iter().all(|n| !n.kind.ends_with("comment")));
    }

    #[test]
    fn test_token_positions_are_one_based() {
        let view = JavaSourceView::new();
        let tokens = view.tokenize("class A {\n  int x;\n}").unwrap();
        let int_tok = tokens.iter().find(|t| t.text == "int").unwrap();
        assert_eq!((int_tok.line, int_tok.column), (2, 3));
    }

    #[test]
    fn test_invalid_source_reports_location() {
        let view = JavaSourceView::new();
        let err = view.parse("not valid java {{").unwrap_err();
        assert!(!err.description.is_empty());
        assert!(err.location.is_some());
    }

    #[test]
    fn test_missing_semicolon_is_error() {
        let view = JavaSourceView::new();
        let err = view.parse("class A { int x }").unwrap_err();
        let loc = err.location.unwrap();
        assert_eq!(loc.line, 1);
    }

    #[test]
    fn test_empty_source_parses() {
        let view = JavaSourceView::new();
        let (tokens, ast) = view.view("").unwrap();
        assert!(tokens.is_empty());
        assert_eq!(ast.len(), 1);
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let expr = vec!["1"; 1500].join(" + ");
        let code = format!("class A {{ int x = {}; }}", expr);
        let view = JavaSourceView::new();
        let ast = view.parse(&code).unwrap();
        assert!(ast.max_depth().unwrap() > 1000);
    }
}
