//! Numeric helpers shared by the calculators
//!
//! Every helper defines its empty-input behaviour explicitly: NaN, never a
//! panic and never an incidental `0/0`.

use rustc_hash::FxHashMap;

/// `count / normalizer`, NaN when the normalizer is zero.
pub fn rate(count: usize, normalizer: usize) -> f64 {
    if normalizer == 0 {
        f64::NAN
    } else {
        count as f64 / normalizer as f64
    }
}

/// Arithmetic mean, NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, NaN for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Relative frequency of each distinct term, sorted by term.
///
/// Empty input yields no terms.
pub fn term_frequencies<'a, I>(terms: I) -> Vec<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: FxHashMap<&'a str, usize> = FxHashMap::default();
    let mut total = 0usize;
    for term in terms {
        *counts.entry(term).or_insert(0) += 1;
        total += 1;
    }

    let mut tf: Vec<(&str, f64)> = counts
        .into_iter()
        .map(|(term, count)| (term, rate(count, total)))
        .collect();
    tf.sort_by(|a, b| a.0.cmp(b.0));
    tf
}
