//! Syntactic features: tree depth, node-type and node-bigram frequencies,
//! and keyword usage.

use super::stats::term_frequencies;
use super::{AstCalculator, Calculator, Category, Fragment, TokenCalculator};
use crate::source::{Ast, Token, TokenKind};

macro_rules! syntactic_calculator {
    ($ty:ident, $ns:literal) => {
        impl Calculator for $ty {
            fn namespace(&self) -> &'static str {
                $ns
            }

            fn category(&self) -> Category {
                Category::Syntactic
            }
        }
    };
}

/// Depth of the deepest named node, the root being depth 0.
pub struct MaxDepthAstNode;
syntactic_calculator!(MaxDepthAstNode, "max_depth_ast_node");

impl AstCalculator for MaxDepthAstNode {
    fn calculate(&self, ast: &Ast, _length: usize) -> Fragment {
        let depth = ast
            .nodes()
            .iter()
            .filter(|n| n.named)
            .map(|n| n.depth)
            .max()
            .map_or(f64::NAN, |d| d as f64);
        Fragment::scalar(self.namespace(), depth)
    }
}

/// Frequency of each named node type among all named nodes.
pub struct AstNodeTypesTf;
syntactic_calculator!(AstNodeTypesTf, "ast_node_type_tf");

impl AstCalculator for AstNodeTypesTf {
    fn calculate(&self, ast: &Ast, _length: usize) -> Fragment {
        let mut fragment = Fragment::new(self.namespace());
        let kinds = ast.nodes().iter().filter(|n| n.named).map(|n| n.kind);
        for (kind, tf) in term_frequencies(kinds) {
            fragment.push_keyed(kind, tf);
        }
        fragment
    }
}

/// Frequency of each named parent -> named child edge.
pub struct AstNodeBigramsTf;
syntactic_calculator!(AstNodeBigramsTf, "ast_node_bigram_tf");

impl AstCalculator for AstNodeBigramsTf {
    fn calculate(&self, ast: &Ast, _length: usize) -> Fragment {
        let bigrams: Vec<String> = ast
            .nodes()
            .iter()
            .filter(|n| n.named)
            .filter_map(|child| {
                ast.parent_of(child)
                    .filter(|p| p.named)
                    .map(|parent| format!("{}::{}", parent.kind, child.kind))
            })
            .collect();

        let mut fragment = Fragment::new(self.namespace());
        for (bigram, tf) in term_frequencies(bigrams.iter().map(String::as_str)) {
            fragment.push_keyed(bigram, tf);
        }
        fragment
    }
}

/// Share of each keyword among all keyword tokens.
pub struct JavaKeywords;
syntactic_calculator!(JavaKeywords, "java_keyword_tf");

impl TokenCalculator for JavaKeywords {
    fn calculate(&self, tokens: &[Token], _length: usize) -> Fragment {
        let mut fragment = Fragment::new(self.namespace());
        let keywords = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Keyword)
            .map(|t| t.text.as_str());
        for (kw, tf) in term_frequencies(keywords) {
            fragment.push_keyed(kw, tf);
        }
        fragment
    }
}

/// Keyword usage keyed by the syntactic construct that encloses the keyword,
/// e.g. `if_statement::else` or `method_declaration::static`.
pub struct KeywordContextTf;
syntactic_calculator!(KeywordContextTf, "ast_keyword_context_tf");

impl AstCalculator for KeywordContextTf {
    fn calculate(&self, ast: &Ast, _length: usize) -> Fragment {
        let contexts: Vec<String> = ast
            .nodes()
            .iter()
            .filter_map(|n| n.keyword().map(|kw| (n, kw)))
            .map(|(node, kw)| {
                // `modifiers` and `*_type` wrappers say little; report the construct above them
                let mut context = ast.parent_of(node);
                while let Some(node) = context {
                    if node.kind == "modifiers" || node.kind.ends_with("_type") {
                        context = ast.parent_of(node);
                    } else {
                        break;
                    }
                }
                let context = context.map_or("program", |n| n.kind);
                format!("{}::{}", context, kw)
            })
            .collect();

        let mut fragment = Fragment::new(self.namespace());
        for (key, tf) in term_frequencies(contexts.iter().map(String::as_str)) {
            fragment.push_keyed(key, tf);
        }
        fragment
    }
}
