use std::cmp::Ordering;

/// Number of recommendations returned per request.
pub const TOP_K: usize = 3;

/// A class label paired with the probability the model assigned to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbability<'a> {
    pub label: &'a str,
    pub probability: f32,
}

/// Orders by descending probability, then ascending label so equal
/// probabilities always come out in the same order.
fn by_rank(a: &ClassProbability<'_>, b: &ClassProbability<'_>) -> Ordering {
    b.probability
        .total_cmp(&a.probability)
        .then_with(|| a.label.cmp(b.label))
}

/// Keeps the `k` most probable classes, best first.
pub fn top_k(mut classes: Vec<ClassProbability<'_>>, k: usize) -> Vec<ClassProbability<'_>> {
    classes.sort_unstable_by(by_rank);
    classes.truncate(k);
    classes
}

/// `0.4567` -> `"45.67%"`.
pub fn format_confidence(probability: f32) -> String {
    format!("{:.2}%", f64::from(probability) * 100.0)
}
