use review_types::TestCase;

/// Percentage of correct test cases, rounded to the nearest integer.
///
/// Defined as `0` for an empty collection. Always computed from the full
/// collection, never patched incrementally.
pub fn recompute_metric(test_cases: &[TestCase]) -> f64 {
    if test_cases.is_empty() {
        return 0.0;
    }
    let correct = test_cases.iter().filter(|case| case.is_correct).count();
    (100.0 * correct as f64 / test_cases.len() as f64).round()
}

/// The server's value when it sent one, otherwise a local recomputation
pub fn resolve_metric(server_value: Option<f64>, test_cases: &[TestCase]) -> f64 {
    server_value.unwrap_or_else(|| recompute_metric(test_cases))
}
