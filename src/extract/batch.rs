//! Parallel batch extraction
//!
//! Every sample is an independent unit of work on a dedicated rayon pool.
//! Units share nothing mutable; each contributes exactly one [`Outcome`],
//! collected by rayon before the outcomes are split into extracted records
//! and a failure manifest. Result association is by [`SampleKey`], never by
//! position.

use super::{ExtractError, SampleExtractor};
use crate::models::{ExtractedSample, Sample, SampleKey};
use crate::source::Location;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Cooperative cancellation shared between a batch and its caller.
///
/// Samples not yet started when the flag is raised are reported as
/// [`FailureKind::Cancelled`] and never run.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed input
    Parse,
    /// A calculator bug surfaced on this sample
    CalculatorFault,
    /// Skipped because the batch was cancelled
    Cancelled,
}

/// Manifest entry for a sample that produced no record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFailure {
    pub key: SampleKey,
    pub kind: FailureKind,
    pub message: String,
    #[serde(default)]
    pub location: Option<Location>,
}

/// Records of the samples that succeeded plus the manifest of those that did not
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub extracted: Vec<ExtractedSample>,
    pub failures: Vec<SampleFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.extracted.len() + self.failures.len()
    }

    pub fn failed(&self, kind: FailureKind) -> impl Iterator<Item = &SampleFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    /// The calculator battery itself is broken; every sample would be affected.
    #[error("feature extraction defect: {0}")]
    Defect(ExtractError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result of one unit of work
enum Outcome {
    Extracted(ExtractedSample),
    Failed(SampleKey, ExtractError),
    Cancelled(SampleKey),
}

type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Runs a [`SampleExtractor`] over a batch of samples in parallel.
pub struct BatchExtractor {
    extractor: SampleExtractor,
    /// Worker threads; 0 lets rayon pick one per core
    workers: usize,
    cancel: CancellationFlag,
    progress_callback: Option<ProgressCallback>,
}

impl BatchExtractor {
    pub fn new(extractor: SampleExtractor) -> Self {
        Self {
            extractor,
            workers: 0,
            cancel: CancellationFlag::new(),
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called with `(completed, total)` after each sample.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn extractor(&self) -> &SampleExtractor {
        &self.extractor
    }

    /// Extract every sample; only a calculator defect fails the whole batch.
    pub fn run(&self, samples: &[Sample]) -> Result<BatchReport, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let total = samples.len();
        let completed = AtomicUsize::new(0);

        let outcomes: Vec<Outcome> = pool.install(|| {
            samples
                .par_iter()
                .map(|sample| {
                    let outcome = self.run_single(sample);

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(done, total);
                    }

                    outcome
                })
                .collect()
        });

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Extracted(extracted) => report.extracted.push(extracted),
                Outcome::Failed(key, err) if err.is_defect() => {
                    error!("Feature extraction defect on {}: {}", key, err);
                    return Err(BatchError::Defect(err));
                }
                Outcome::Failed(key, err) => {
                    warn!("Skipping {}: {}", key, err);
                    report.failures.push(failure_entry(key, err));
                }
                Outcome::Cancelled(key) => {
                    report.failures.push(SampleFailure {
                        key,
                        kind: FailureKind::Cancelled,
                        message: "batch cancelled".to_string(),
                        location: None,
                    });
                }
            }
        }

        debug!(
            "Extracted {} of {} samples ({} failed)",
            report.extracted.len(),
            total,
            report.failures.len()
        );

        Ok(report)
    }

    fn run_single(&self, sample: &Sample) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled(sample.key());
        }
        match self.extractor.extract(sample) {
            Ok(record) => Outcome::Extracted(ExtractedSample::new(sample.key(), record)),
            Err(err) => Outcome::Failed(sample.key(), err),
        }
    }
}

fn failure_entry(key: SampleKey, err: ExtractError) -> SampleFailure {
    let message = err.to_string();
    match err {
        ExtractError::Parse { location, .. } => SampleFailure {
            key,
            kind: FailureKind::Parse,
            message,
            location,
        },
        // Defects abort the batch before reaching the manifest
        ExtractError::CalculatorFault { .. }
        | ExtractError::NamespaceViolation { .. }
        | ExtractError::NameCollision { .. } => SampleFailure {
            key,
            kind: FailureKind::CalculatorFault,
            message,
            location: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Calculator, Category, Fragment, Registered, Registry, TextCalculator};
    use crate::source::JavaSourceView;

    fn samples() -> Vec<Sample> {
        vec![
            Sample::new("a", "class A{ int x; }").with_index(0),
            Sample::new("b", "not valid java {{").with_index(1),
            Sample::new("c", "class C{ void m(int p){} }").with_index(2),
        ]
    }

    #[test]
    fn test_one_bad_sample_does_not_abort_batch() {
        let batch = BatchExtractor::new(SampleExtractor::java()).with_workers(2);
        let report = batch.run(&samples()).unwrap();

        let mut ids: Vec<&str> = report
            .extracted
            .iter()
            .map(|e| e.key.sample_id.as_str())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);

        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.key.sample_id, "b");
        assert_eq!(failure.key.secondary_index, Some(1));
        assert_eq!(failure.kind, FailureKind::Parse);
        assert!(failure.location.is_some());
        assert_eq!(report.total(), 3);
    }

    #[test]
    fn test_secondary_index_preserved() {
        let batch = BatchExtractor::new(SampleExtractor::java());
        let report = batch.run(&samples()).unwrap();
        let c = report
            .extracted
            .iter()
            .find(|e| e.key.sample_id == "c")
            .unwrap();
        assert_eq!(c.key.secondary_index, Some(2));
    }

    #[test]
    fn test_cancelled_batch_runs_nothing() {
        let batch = BatchExtractor::new(SampleExtractor::java()).with_workers(1);
        batch.cancellation().cancel();
        let report = batch.run(&samples()).unwrap();

        assert!(report.extracted.is_empty());
        assert_eq!(report.failed(FailureKind::Cancelled).count(), 3);
    }

    #[test]
    fn test_progress_reports_every_sample() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = Arc::clone(&seen);
        let batch = BatchExtractor::new(SampleExtractor::java())
            .with_workers(2)
            .with_progress(move |_, total| {
                assert_eq!(total, 3);
                seen_in_cb.fetch_add(1, Ordering::SeqCst);
            });
        batch.run(&samples()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_empty_batch() {
        let batch = BatchExtractor::new(SampleExtractor::java());
        let report = batch.run(&[]).unwrap();
        assert_eq!(report.total(), 0);
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
            fragment.push(1.0);
            fragment
        }
    }

    /// Panics on any sample whose text mentions `boom`
    struct Fragile;

    impl Calculator for Fragile {
        fn namespace(&self) -> &'static str {
            "fragile"
        }

        fn category(&self) -> Category {
            Category::Layout
        }
    }

    impl TextCalculator for Fragile {
        fn calculate(&self, text: &str) -> Fragment {
            if text.contains("boom") {
                panic!("cannot handle {}", text.len());
            }
            Fragment::scalar("fragile", 1.0)
        }
    }

    #[test]
    fn test_calculator_fault_isolated_to_its_sample() {
        let registry = Registry::new(vec![Registered::Text(Box::new(Fragile))]).unwrap();
        let extractor = SampleExtractor::new(Box::new(JavaSourceView::new()), registry);
        let batch = vec![
            Sample::new("a", "class A {}").with_index(0),
            Sample::new("b", "// boom\nclass B {}").with_index(1),
            Sample::new("c", "class C {}").with_index(2),
        ];

        let report = BatchExtractor::new(extractor)
            .with_workers(2)
            .run(&batch)
            .unwrap();

        assert_eq!(report.extracted.len(), 2);
        assert!(report
            .extracted
            .iter()
            .all(|e| e.record.get("fragile") == Some(1.0)));

        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.key.sample_id, "b");
        assert_eq!(failure.kind, FailureKind::CalculatorFault);
        assert_eq!(failure.location, None);
        assert!(failure.message.contains("fragile"));
        assert_eq!(report.failed(FailureKind::Parse).count(), 0);
    }

    #[test]
    fn test_defect_fails_the_batch() {
        let registry = Registry::new(vec![Registered::Text(Box::new(Twice))]).unwrap();
        let extractor = SampleExtractor::new(Box::new(JavaSourceView::new()), registry);
        let err = BatchExtractor::new(extractor)
            .run(&[Sample::new("a", "class A {}")])
            .unwrap_err();
        assert!(matches!(err, BatchError::Defect(_)));
    }
}
