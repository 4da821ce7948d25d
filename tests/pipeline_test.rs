//! End-to-end library tests: extraction, schema unification, projection
//! and top-k ranking over real Java snippets.

use stylometer::extract::FailureKind;
use stylometer::{
    build_dataset, top_k, BatchExtractor, ClassDistribution, FeatureSchema, InferenceProjector,
    Sample, SampleExtractor,
};

fn batch() -> Vec<Sample> {
    vec![
        Sample::new("a", "class A{ int x; }"),
        Sample::new("b", "not valid java {{"),
        Sample::new("c", "class C{ void m(int p){} }"),
    ]
}

#[test]
fn test_failure_isolation() {
    let report = BatchExtractor::new(SampleExtractor::java())
        .with_workers(2)
        .run(&batch())
        .unwrap();

    let ids: Vec<&str> = report
        .extracted
        .iter()
        .map(|e| e.key.sample_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a", "c"]);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key.sample_id, "b");
    assert_eq!(report.failures[0].kind, FailureKind::Parse);
    assert!(report.failures[0].location.is_some());
}

#[test]
fn test_schema_covers_union_of_records() {
    let report = BatchExtractor::new(SampleExtractor::java())
        .run(&batch())
        .unwrap();
    let dataset = build_dataset(&report.extracted);

    let mut union: Vec<&str> = report
        .extracted
        .iter()
        .flat_map(|e| e.record.names())
        .collect();
    union.sort_unstable();
    union.dedup();

    assert_eq!(dataset.n_cols(), union.len());
    assert_eq!(dataset.schema().names(), union.as_slice());
    assert_eq!(dataset.n_rows(), 2);

    // Method-only features exist because of "c"; "a" has none of them
    let a = dataset.row_of(&report.extracted[0].key).unwrap();
    assert!(dataset.get(a, "avg_params").is_some());
    assert!(dataset.get(a, "ast_node_type_tf::method_declaration").unwrap().is_nan());
}

#[test]
fn test_reprojecting_a_record_reproduces_its_row() {
    let report = BatchExtractor::new(SampleExtractor::java())
        .run(&batch())
        .unwrap();
    let dataset = build_dataset(&report.extracted);
    let projector = InferenceProjector::new(dataset.schema().clone());

    let a = &report.extracted[0];
    let (projected, matched) = projector.project_record(&a.record);
    assert!(matched);

    let built_row = dataset.row_values(dataset.row_of(&a.key).unwrap());
    for (built, proj) in built_row.iter().zip(&projected) {
        if built.is_finite() {
            assert_eq!(built, proj);
        } else {
            assert_eq!(*proj, 0.0);
        }
    }

    // Exact once both sides go through the projector
    let aligned = projector.project_dataset(&dataset);
    assert_eq!(aligned.row_values(0), projected);
    assert_eq!(projector.project_dataset(&aligned), aligned);
}

#[test]
fn test_schema_derivation_is_deterministic() {
    let extractor = BatchExtractor::new(SampleExtractor::java());
    let first = extractor.run(&batch()).unwrap();
    let mut reversed = batch();
    reversed.reverse();
    let second = extractor.run(&reversed).unwrap();

    let s1 = FeatureSchema::derive(&first.extracted);
    let s2 = FeatureSchema::derive(&second.extracted);
    assert_eq!(s1.names(), s2.names());
    assert_eq!(s1.fingerprint(), s2.fingerprint());
}

#[test]
fn test_projection_never_leaves_schema() {
    let report = BatchExtractor::new(SampleExtractor::java())
        .run(&batch())
        .unwrap();
    let schema = FeatureSchema::fixed(["num_tokens", "avg_params", "not_a_feature"]).unwrap();
    let dataset = InferenceProjector::new(schema.clone()).project(&report.extracted);

    assert_eq!(dataset.schema(), &schema);
    assert!(dataset.is_finite());
    assert_eq!(dataset.get(0, "not_a_feature"), Some(0.0));
}

#[test]
fn test_top_k_is_non_increasing() {
    let classes: Vec<String> = (0..8).map(|i| format!("author{}", i)).collect();
    let probabilities = vec![0.02, 0.3, 0.1, 0.05, 0.2, 0.13, 0.15, 0.05];
    let dist = ClassDistribution::new(probabilities.clone());

    for k in 0..=classes.len() {
        let ranked = top_k(&dist, &classes, k);
        assert_eq!(ranked.len(), k);
        let scores: Vec<f64> = ranked
            .iter()
            .map(|label| probabilities[classes.iter().position(|c| c == label).unwrap()])
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}
