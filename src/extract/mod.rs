//! Per-sample feature extraction
//!
//! [`SampleExtractor`] parses one sample through a [`SourceView`] and runs the
//! whole calculator [`Registry`] over the resulting views. Either every
//! calculator ran and a complete [`FeatureRecord`] is returned, or the sample
//! fails as a whole; callers never see a half-merged record.
//!
//! [`BatchExtractor`] fans samples out over a rayon pool and turns per-sample
//! failures into a manifest instead of aborting the batch.

pub mod batch;

pub use batch::{BatchError, BatchExtractor, BatchReport, CancellationFlag, FailureKind, SampleFailure};

use crate::features::{Registry, SampleView};
use crate::models::{FeatureRecord, Sample};
use crate::source::{JavaSourceView, Location, SourceView};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use thiserror::Error;
use tracing::debug;

thread_local! {
    /// Set while this thread runs a calculator under `catch_unwind`
    static IN_CALCULATOR: Cell<bool> = const { Cell::new(false) };
}

static QUIET_PANIC_HOOK: Once = Once::new();

/// Silence the default panic report for calculator panics.
///
/// Those faults already reach the failure manifest; panics anywhere else
/// still go to the previously installed hook.
fn install_quiet_panic_hook() {
    QUIET_PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_CALCULATOR.with(Cell::get) {
                debug!("Calculator panicked: {}", info);
            } else {
                previous(info);
            }
        }));
    });
}

fn at(location: &Option<Location>) -> String {
    location.map(|l| format!(" at {}", l)).unwrap_or_default()
}

/// Why a sample produced no record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The sample is not valid source text. Common for real-world snippets.
    #[error("{sample_id}: {description}{}", at(.location))]
    Parse {
        sample_id: String,
        description: String,
        location: Option<Location>,
    },

    /// A calculator panicked instead of returning NaN.
    #[error("{sample_id}: calculator `{calculator}` panicked: {message}")]
    CalculatorFault {
        sample_id: String,
        calculator: String,
        message: String,
    },

    /// A calculator returned a fragment built for another namespace.
    #[error("calculator `{calculator}` emitted features for namespace `{namespace}`")]
    NamespaceViolation {
        calculator: String,
        namespace: String,
    },

    /// Two emitted features share a name.
    #[error("feature `{feature}` emitted twice (second time by `{calculator}`)")]
    NameCollision { calculator: String, feature: String },
}

impl ExtractError {
    /// Programming errors in the calculator battery, as opposed to bad input.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            ExtractError::NamespaceViolation { .. } | ExtractError::NameCollision { .. }
        )
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs the calculator battery against one sample.
///
/// Read-only after construction; one instance serves all worker threads.
pub struct SampleExtractor {
    source: Box<dyn SourceView>,
    registry: Registry,
}

impl SampleExtractor {
    pub fn new(source: Box<dyn SourceView>, registry: Registry) -> Self {
        install_quiet_panic_hook();
        Self { source, registry }
    }

    /// Java source view with the standard battery
    pub fn java() -> Self {
        Self::new(Box::new(JavaSourceView::new()), Registry::standard())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Compute the full feature record of one sample.
    pub fn extract(&self, sample: &Sample) -> Result<FeatureRecord, ExtractError> {
        let (tokens, ast) = self
            .source
            .view(&sample.code)
            .map_err(|e| ExtractError::Parse {
                sample_id: sample.id.clone(),
                description: e.description,
                location: e.location,
            })?;

        let view = SampleView::new(&sample.code, &tokens, &ast);
        let mut record = FeatureRecord::new();

        for calc in self.registry.iter() {
            let namespace = calc.namespace();
            IN_CALCULATOR.with(|flag| flag.set(true));
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| calc.run(&view)));
            IN_CALCULATOR.with(|flag| flag.set(false));

            let fragment = outcome.map_err(|payload| ExtractError::CalculatorFault {
                sample_id: sample.id.clone(),
                calculator: namespace.to_string(),
                message: panic_message(payload),
            })?;

            if fragment.namespace() != namespace {
                return Err(ExtractError::NamespaceViolation {
                    calculator: namespace.to_string(),
                    namespace: fragment.namespace().to_string(),
                });
            }

            for (name, value) in fragment.into_values() {
                if record.contains(&name) {
                    return Err(ExtractError::NameCollision {
                        calculator: namespace.to_string(),
                        feature: name,
                    });
                }
                record.insert(name, value);
            }
        }

        Ok(record)
    }
}

impl Default for SampleExtractor {
    fn default() -> Self {
        Self::java()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Calculator, Category, Fragment, Registered, TextCalculator};

    struct Panics;

    impl Calculator for Panics {
        fn namespace(&self) -> &'static str {
            "panics"
        }

        fn category(&self) -> Category {
            Category::Layout
        }
    }

    impl TextCalculator for Panics {
        fn calculate(&self, _text: &str) -> Fragment {
            panic!("boom")
        }
    }

    struct Twice;

    impl Calculator for Twice {
        fn namespace(&self) -> &'static str {
            "twice"
        }

        fn category(&self) -> Category {
            Category::Layout
        }
    }

    impl TextCalculator for Twice {
        fn calculate(&self, _text: &str) -> Fragment {
            let mut fragment = Fragment::new("twice");
            fragment.push(1.0);
            fragment.push(2.0);
            fragment
        }
    }

    struct Impostor;

    impl Calculator for Impostor {
        fn namespace(&self) -> &'static str {
            "impostor"
        }

        fn category(&self) -> Category {
            Category::Layout
        }
    }

    impl TextCalculator for Impostor {
        fn calculate(&self, _text: &str) -> Fragment {
            Fragment::scalar("num_tabs", 0.0)
        }
    }

    fn extractor_with(calc: Registered) -> SampleExtractor {
        let registry = Registry::new(vec![calc]).unwrap();
        SampleExtractor::new(Box::new(JavaSourceView::new()), registry)
    }

    #[test]
    fn test_extract_valid_sample() {
        let extractor = SampleExtractor::java();
        let record = extractor
            .extract(&Sample::new("a", "class A{ int x; }"))
            .unwrap();

        assert!(record.contains("num_tokens"));
        assert!(record.contains("word_unigram_tf::A"));
        assert!(record.contains("ast_node_type_tf::class_declaration"));
        assert!(record.contains("new_line_before_open_brace"));
        for kw in crate::features::lexical::TRACKED_KEYWORDS {
            assert!(record.contains(&format!("num_keyword::{}", kw)));
        }
    }

    #[test]
    fn test_parse_failure_carries_id_and_location() {
        let extractor = SampleExtractor::java();
        let err = extractor
            .extract(&Sample::new("b", "not valid java {{"))
            .unwrap_err();

        match &err {
            ExtractError::Parse {
                sample_id,
                location,
                ..
            } => {
                assert_eq!(sample_id, "b");
                assert!(location.is_some());
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(!err.is_defect());
        assert!(err.to_string().starts_with("b: "));
    }

    #[test]
    fn test_panicking_calculator_is_a_fault() {
        let extractor = extractor_with(Registered::Text(Box::new(Panics)));
        let err = extractor.extract(&Sample::new("a", "class A {}")).unwrap_err();
        assert_eq!(
            err,
            ExtractError::CalculatorFault {
                sample_id: "a".into(),
                calculator: "panics".into(),
                message: "boom".into(),
            }
        );
        assert!(!err.is_defect());
    }

    #[test]
    fn test_calculator_flag_cleared_after_fault() {
        let extractor = extractor_with(Registered::Text(Box::new(Panics)));
        assert!(extractor.extract(&Sample::new("a", "class A {}")).is_err());
        assert!(!IN_CALCULATOR.with(Cell::get));

        // Panics outside calculators still unwind normally
        let outside = panic::catch_unwind(|| panic!("elsewhere"));
        assert!(outside.is_err());
    }

    #[test]
    fn test_duplicate_feature_is_a_defect() {
        let extractor = extractor_with(Registered::Text(Box::new(Twice)));
        let err = extractor.extract(&Sample::new("a", "class A {}")).unwrap_err();
        assert!(matches!(err, ExtractError::NameCollision { .. }));
        assert!(err.is_defect());
    }

    #[test]
    fn test_foreign_namespace_is_a_defect() {
        let extractor = extractor_with(Registered::Text(Box::new(Impostor)));
        let err = extractor.extract(&Sample::new("a", "class A {}")).unwrap_err();
        assert!(matches!(err, ExtractError::NamespaceViolation { .. }));
        assert!(err.is_defect());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = SampleExtractor::java();
        let sample = Sample::new("c", "class C{ void m(int p){} }");
        let first = extractor.extract(&sample).unwrap();
        let second = extractor.extract(&sample).unwrap();
        let names_a: Vec<&str> = first.names().collect();
        let names_b: Vec<&str> = second.names().collect();
        assert_eq!(names_a, names_b);
    }
}
