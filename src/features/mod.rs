//! Stylometric feature calculators
//!
//! A [`Registry`] holds a fixed, ordered battery of independent calculators.
//! Each one consumes exactly one view of a sample:
//!
//! - [`TokenCalculator`]: the token stream (plus the sample length)
//! - [`AstCalculator`]: the syntax tree (plus the sample length)
//! - [`TextCalculator`]: the raw text
//!
//! Every calculator owns a namespace. It emits either the bare namespace as a
//! scalar feature or `namespace::key` entries for open-vocabulary features,
//! so feature names of different calculators can never collide.

pub mod layout;
pub mod lexical;
pub mod stats;
pub mod syntactic;

use crate::source::{Ast, Token};
use thiserror::Error;

/// Separator between a namespace and an open-vocabulary key
pub const KEY_SEPARATOR: &str = "::";

/// Feature family, used for listing and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Lexical,
    Layout,
    Syntactic,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Lexical => write!(f, "lexical"),
            Category::Layout => write!(f, "layout"),
            Category::Syntactic => write!(f, "syntactic"),
        }
    }
}

/// The view a calculator consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Tokens,
    Ast,
    Text,
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::Tokens => write!(f, "tokens"),
            Input::Ast => write!(f, "ast"),
            Input::Text => write!(f, "text"),
        }
    }
}

/// Output of one calculator for one sample.
///
/// Names are built from the fragment's namespace, so a calculator cannot
/// write outside its own name space through this type.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    namespace: &'static str,
    values: Vec<(String, f64)>,
}

impl Fragment {
    pub fn new(namespace: &'static str) -> Self {
        Self {
            namespace,
            values: Vec::new(),
        }
    }

    /// A fragment holding the single scalar feature `namespace`.
    pub fn scalar(namespace: &'static str, value: f64) -> Self {
        let mut fragment = Self::new(namespace);
        fragment.push(value);
        fragment
    }

    pub fn push(&mut self, value: f64) {
        self.values.push((self.namespace.to_string(), value));
    }

    pub fn push_keyed(&mut self, key: &str, value: f64) {
        self.values
            .push((format!("{}{}{}", self.namespace, KEY_SEPARATOR, key), value));
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn into_values(self) -> Vec<(String, f64)> {
        self.values
    }
}

/// Metadata shared by all calculators.
///
/// Implementations must be side-effect-free: they are invoked concurrently
/// from every worker without locking.
pub trait Calculator: Send + Sync {
    /// Unique name space of the emitted features; must not contain `::`
    fn namespace(&self) -> &'static str;

    fn category(&self) -> Category;
}

pub trait TokenCalculator: Calculator {
    /// `length` is the sample length in characters, the normalizer of rate features.
    fn calculate(&self, tokens: &[Token], length: usize) -> Fragment;
}

pub trait AstCalculator: Calculator {
    fn calculate(&self, ast: &Ast, length: usize) -> Fragment;
}

pub trait TextCalculator: Calculator {
    fn calculate(&self, text: &str) -> Fragment;
}

/// All views of one sample, borrowed by the calculators.
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    pub text: &'a str,
    pub tokens: &'a [Token],
    pub ast: &'a Ast,
    /// Text length in characters
    pub length: usize,
}

impl<'a> SampleView<'a> {
    pub fn new(text: &'a str, tokens: &'a [Token], ast: &'a Ast) -> Self {
        Self {
            text,
            tokens,
            ast,
            length: text.chars().count(),
        }
    }
}

/// A registered calculator, tagged with the view it consumes
pub enum Registered {
    Tokens(Box<dyn TokenCalculator>),
    Ast(Box<dyn AstCalculator>),
    Text(Box<dyn TextCalculator>),
}

impl Registered {
    pub fn namespace(&self) -> &'static str {
        match self {
            Registered::Tokens(c) => c.namespace(),
            Registered::Ast(c) => c.namespace(),
            Registered::Text(c) => c.namespace(),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Registered::Tokens(c) => c.category(),
            Registered::Ast(c) => c.category(),
            Registered::Text(c) => c.category(),
        }
    }

    pub fn input(&self) -> Input {
        match self {
            Registered::Tokens(_) => Input::Tokens,
            Registered::Ast(_) => Input::Ast,
            Registered::Text(_) => Input::Text,
        }
    }

    /// Run the calculator against the view it declared.
    pub fn run(&self, view: &SampleView<'_>) -> Fragment {
        match self {
            Registered::Tokens(c) => c.calculate(view.tokens, view.length),
            Registered::Ast(c) => c.calculate(view.ast, view.length),
            Registered::Text(c) => c.calculate(view.text),
        }
    }
}

impl std::fmt::Debug for Registered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registered")
            .field("namespace", &self.namespace())
            .field("input", &self.input())
            .finish()
    }
}

/// A calculator set that cannot guarantee disjoint feature names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("calculator namespace `{0}` is registered twice")]
    DuplicateNamespace(String),

    #[error("calculator namespace `{0}` is empty or contains `::`")]
    InvalidNamespace(String),
}

/// Fixed, ordered battery of calculators
#[derive(Debug)]
pub struct Registry {
    calculators: Vec<Registered>,
}

impl Registry {
    /// Build a registry, rejecting namespaces that could make names collide.
    pub fn new(calculators: Vec<Registered>) -> Result<Self, RegistryError> {
        validate(&calculators)?;
        Ok(Self { calculators })
    }

    /// The standard lexical, layout and syntactic battery.
    pub fn standard() -> Self {
        let calculators = vec![
            // Lexical
            Registered::Tokens(Box::new(lexical::WordUnigramTf)),
            Registered::Tokens(Box::new(lexical::NumKeyword)),
            Registered::Tokens(Box::new(lexical::NumTokens)),
            Registered::Tokens(Box::new(lexical::NumLiterals)),
            Registered::Tokens(Box::new(lexical::NumKeywords)),
            Registered::Ast(Box::new(lexical::NumFunctions)),
            Registered::Ast(Box::new(lexical::NumTernary)),
            Registered::Text(Box::new(lexical::AvgLineLength)),
            Registered::Text(Box::new(lexical::StdDevLineLength)),
            Registered::Ast(Box::new(lexical::AvgParams)),
            Registered::Ast(Box::new(lexical::StdDevNumParams)),
            // Layout
            Registered::Text(Box::new(layout::NumTabs)),
            Registered::Text(Box::new(layout::NumSpaces)),
            Registered::Text(Box::new(layout::NumEmptyLines)),
            Registered::Text(Box::new(layout::WhiteSpaceRatio)),
            Registered::Text(Box::new(layout::NewLineBeforeOpenBrace)),
            Registered::Text(Box::new(layout::TabsLeadLines)),
            // Syntactic
            Registered::Ast(Box::new(syntactic::MaxDepthAstNode)),
            Registered::Ast(Box::new(syntactic::AstNodeBigramsTf)),
            Registered::Ast(Box::new(syntactic::AstNodeTypesTf)),
            Registered::Tokens(Box::new(syntactic::JavaKeywords)),
            Registered::Ast(Box::new(syntactic::KeywordContextTf)),
        ];
        debug_assert!(validate(&calculators).is_ok());
        Self { calculators }
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registered> {
        self.calculators.iter()
    }

    /// Whether any calculator needs the given view
    pub fn requires(&self, input: Input) -> bool {
        self.calculators.iter().any(|c| c.input() == input)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

fn validate(calculators: &[Registered]) -> Result<(), RegistryError> {
    let mut seen = rustc_hash::FxHashSet::default();
    for calc in calculators {
        let ns = calc.namespace();
        if ns.is_empty() || ns.contains(KEY_SEPARATOR) {
            return Err(RegistryError::InvalidNamespace(ns.to_string()));
        }
        if !seen.insert(ns) {
            return Err(RegistryError::DuplicateNamespace(ns.to_string()));
        }
    }
    Ok(())
}
