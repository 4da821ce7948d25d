//! Lexical and syntactic views of a source sample
//!
//! A [`SourceView`] turns raw text into a token sequence and an abstract
//! syntax tree, or fails with a [`SyntaxError`]. Feature calculators only see
//! these views, never the parser behind them.

pub mod java;

pub use java::JavaSourceView;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 1-based position in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The source text could not be tokenized or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct SyntaxError {
    pub description: String,
    pub location: Option<Location>,
}

impl SyntaxError {
    pub fn new(description: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            description: description.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Literal,
    Separator,
    Operator,
}

/// A lexical token. Comments are not tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

/// A node of an [`Ast`] arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    /// Grammar node type, e.g. `method_declaration` or `if`
    pub kind: &'static str,
    /// Named nodes are syntactic constructs; anonymous ones are keywords and punctuation
    pub named: bool,
    pub parent: Option<usize>,
    /// Distance from the root (the root has depth 0)
    pub depth: usize,
    pub children: Vec<usize>,
}

/// Named leaves whose whole text is a reserved word
const NAMED_KEYWORD_LEAVES: &[(&str, &str)] = &[
    ("void_type", "void"),
    ("boolean_type", "boolean"),
    ("this", "this"),
    ("super", "super"),
];

impl AstNode {
    /// The keyword this node spells, if any.
    ///
    /// Anonymous word nodes (`if`, `class`, `int`, `non-sealed`) spell their
    /// kind. A few keywords are named leaves in the grammar (`void_type`,
    /// `this`) and map to their text.
    pub fn keyword(&self) -> Option<&'static str> {
        if self.named {
            if !self.children.is_empty() {
                return None;
            }
            return NAMED_KEYWORD_LEAVES
                .iter()
                .find(|(kind, _)| *kind == self.kind)
                .map(|(_, kw)| *kw);
        }
        let word = !self.kind.is_empty()
            && self
                .kind
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '-');
        word.then_some(self.kind)
    }

    pub fn is_keyword(&self) -> bool {
        self.keyword().is_some()
    }
}

/// Abstract syntax tree stored as a pre-order arena, root at index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node under `parent` (or as the root) and return its index.
    pub fn push(&mut self, kind: &'static str, named: bool, parent: Option<usize>) -> usize {
        let id = self.nodes.len();
        let depth = match parent {
            Some(p) => {
                self.nodes[p].children.push(id);
                self.nodes[p].depth + 1
            }
            None => 0,
        };
        self.nodes.push(AstNode {
            kind,
            named,
            parent,
            depth,
            children: Vec::new(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&AstNode> {
        self.nodes.first()
    }

    pub fn node(&self, id: usize) -> &AstNode {
        &self.nodes[id]
    }

    /// Nodes in pre-order
    pub fn nodes(&self) -> &[AstNode] {
        &self.nodes
    }

    pub fn parent_of(&self, node: &AstNode) -> Option<&AstNode> {
        node.parent.map(|p| &self.nodes[p])
    }

    pub fn children_of<'a>(&'a self, node: &'a AstNode) -> impl Iterator<Item = &'a AstNode> + 'a {
        node.children.iter().map(move |&c| &self.nodes[c])
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.nodes.iter().map(|n| n.depth).max()
    }
}

/// Tokenizer/parser capability consumed by the extractor.
///
/// Implementations are read-only services shared across worker threads.
pub trait SourceView: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, SyntaxError>;

    fn parse(&self, text: &str) -> Result<Ast, SyntaxError>;

    /// Produce both views. Override when one parse can serve both.
    fn view(&self, text: &str) -> Result<(Vec<Token>, Ast), SyntaxError> {
        let tokens = self.tokenize(text)?;
        let ast = self.parse(text)?;
        Ok((tokens, ast))
    }
}
