//! Aggregation over per-task scores.

use super::{BenchmarkMetrics, TaskScore};

/// Arithmetic means per dimension; aggregate is the mean of the four means.
/// An empty run is all zeros.
pub fn average_metrics(scores: &[TaskScore]) -> BenchmarkMetrics {
    if scores.is_empty() {
        return BenchmarkMetrics::default();
    }
    let n = scores.len() as f64;
    let accuracy = scores.iter().map(|s| s.accuracy).sum::<f64>() / n;
    let completeness = scores.iter().map(|s| s.completeness).sum::<f64>() / n;
    let efficiency = scores.iter().map(|s| s.efficiency).sum::<f64>() / n;
    let tool_usage = scores.iter().map(|s| s.tool_usage).sum::<f64>() / n;
    BenchmarkMetrics {
        accuracy,
        completeness,
        efficiency,
        tool_usage,
        aggregate_score: (accuracy + completeness + efficiency + tool_usage) / 4.0,
        num_tasks: scores.len(),
    }
}
