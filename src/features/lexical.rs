//! Lexical features: token statistics, identifier vocabulary, line lengths
//! and parameter counts.

use super::stats::{mean, rate, std_dev, term_frequencies};
use super::{AstCalculator, Calculator, Category, Fragment, TextCalculator, TokenCalculator};
use crate::source::{Ast, AstNode, Token, TokenKind};

/// Keywords whose individual usage rate is reported by [`NumKeyword`].
/// `else-if` counts an `else` immediately followed by `if`.
pub const TRACKED_KEYWORDS: [&str; 7] = ["do", "else-if", "if", "else", "switch", "for", "while"];

const FUNCTION_KINDS: &[&str] = &[
    "method_declaration",
    "constructor_declaration",
    "compact_constructor_declaration",
];

const PARAMETER_KINDS: &[&str] = &["formal_parameter", "spread_parameter"];

macro_rules! calculator {
    ($ty:ident, $ns:literal, $cat:expr) => {
        impl Calculator for $ty {
            fn namespace(&self) -> &'static str {
                $ns
            }

            fn category(&self) -> Category {
                $cat
            }
        }
    };
}

/// Term frequency of each identifier among all identifiers.
pub struct WordUnigramTf;
calculator!(WordUnigramTf, "word_unigram_tf", Category::Lexical);

impl TokenCalculator for WordUnigramTf {
    fn calculate(&self, tokens: &[Token], _length: usize) -> Fragment {
        let mut fragment = Fragment::new(self.namespace());
        let words = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.text.as_str());
        for (word, tf) in term_frequencies(words) {
            fragment.push_keyed(word, tf);
        }
        fragment
    }
}

/// Usage rate of each tracked control-flow keyword.
pub struct NumKeyword;
calculator!(NumKeyword, "num_keyword", Category::Lexical);

impl TokenCalculator for NumKeyword {
    fn calculate(&self, tokens: &[Token], length: usize) -> Fragment {
        let mut counts = [0usize; TRACKED_KEYWORDS.len()];

        for (i, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Keyword {
                continue;
            }
            let kw = token.text.as_str();
            if let Some(slot) = TRACKED_KEYWORDS.iter().position(|k| *k == kw) {
                counts[slot] += 1;
            }
            // Adjacent in the full stream, so `else { if` does not count
            if kw == "else" && tokens.get(i + 1).is_some_and(|next| next.text == "if") {
                counts[1] += 1;
            }
        }

        let mut fragment = Fragment::new(self.namespace());
        for (kw, count) in TRACKED_KEYWORDS.iter().zip(counts) {
            fragment.push_keyed(kw, rate(count, length));
        }
        fragment
    }
}

fn count_kind(tokens: &[Token], kind: TokenKind) -> usize {
    tokens.iter().filter(|t| t.kind == kind).count()
}

pub struct NumTokens;
calculator!(NumTokens, "num_tokens", Category::Lexical);

impl TokenCalculator for NumTokens {
    fn calculate(&self, tokens: &[Token], length: usize) -> Fragment {
        Fragment::scalar(self.namespace(), rate(tokens.len(), length))
    }
}

pub struct NumLiterals;
calculator!(NumLiterals, "num_literals", Category::Lexical);

impl TokenCalculator for NumLiterals {
    fn calculate(&self, tokens: &[Token], length: usize) -> Fragment {
        let count = count_kind(tokens, TokenKind::Literal);
        Fragment::scalar(self.namespace(), rate(count, length))
    }
}

pub struct NumKeywords;
calculator!(NumKeywords, "num_keywords", Category::Lexical);

impl TokenCalculator for NumKeywords {
    fn calculate(&self, tokens: &[Token], length: usize) -> Fragment {
        let count = count_kind(tokens, TokenKind::Keyword);
        Fragment::scalar(self.namespace(), rate(count, length))
    }
}

fn functions(ast: &Ast) -> impl Iterator<Item = &AstNode> {
    ast.nodes()
        .iter()
        .filter(|n| FUNCTION_KINDS.contains(&n.kind))
}

/// Methods and constructors per character.
pub struct NumFunctions;
calculator!(NumFunctions, "num_functions", Category::Lexical);

impl AstCalculator for NumFunctions {
    fn calculate(&self, ast: &Ast, length: usize) -> Fragment {
        Fragment::scalar(self.namespace(), rate(functions(ast).count(), length))
    }
}

/// Ternary expressions per character.
pub struct NumTernary;
calculator!(NumTernary, "num_ternary", Category::Lexical);

impl AstCalculator for NumTernary {
    fn calculate(&self, ast: &Ast, length: usize) -> Fragment {
        let count = ast
            .nodes()
            .iter()
            .filter(|n| n.kind == "ternary_expression")
            .count();
        Fragment::scalar(self.namespace(), rate(count, length))
    }
}

fn line_lengths(text: &str) -> Vec<f64> {
    text.lines().map(|l| l.chars().count() as f64).collect()
}

pub struct AvgLineLength;
calculator!(AvgLineLength, "avg_line_length", Category::Lexical);

impl TextCalculator for AvgLineLength {
    fn calculate(&self, text: &str) -> Fragment {
        Fragment::scalar(self.namespace(), mean(&line_lengths(text)))
    }
}

pub struct StdDevLineLength;
calculator!(StdDevLineLength, "std_dev_line_length", Category::Lexical);

impl TextCalculator for StdDevLineLength {
    fn calculate(&self, text: &str) -> Fragment {
        Fragment::scalar(self.namespace(), std_dev(&line_lengths(text)))
    }
}

/// Declared parameter count of every method and constructor.
fn parameter_counts(ast: &Ast) -> Vec<f64> {
    functions(ast)
        .map(|func| {
            ast.children_of(func)
                .filter(|c| c.kind == "formal_parameters")
                .flat_map(|params| ast.children_of(params))
                .filter(|p| PARAMETER_KINDS.contains(&p.kind))
                .count() as f64
        })
        .collect()
}

pub struct AvgParams;
calculator!(AvgParams, "avg_params", Category::Lexical);

impl AstCalculator for AvgParams {
    fn calculate(&self, ast: &Ast, _length: usize) -> Fragment {
        Fragment::scalar(self.namespace(), mean(&parameter_counts(ast)))
    }
}

pub struct StdDevNumParams;
calculator!(StdDevNumParams, "std_dev_num_params", Category::Lexical);

impl AstCalculator for StdDevNumParams {
    fn calculate(&self, ast: &Ast, _length: usize) -> Fragment {
        Fragment::scalar(self.namespace(), std_dev(&parameter_counts(ast)))
    }
}
