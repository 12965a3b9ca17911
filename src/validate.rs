//! Approximate local-enrichment re-scoring of loop calls
//!
//! A global z-score proxy, not a true local background model: the maternal
//! minus paternal pair difference of each loop is standardized against the
//! population of all loop calls in the run.

use crate::calls::LoopCall;
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Fill `local_enrichment_z` / `local_enrichment_p` on every call.
///
/// Runs after classification and never touches `bias_call`. A zero-variance
/// difference population (including a single-row table) gets a unit standard
/// deviation, so z and p stay finite.
pub fn validate_local(calls: &mut [LoopCall]) {
    if calls.is_empty() {
        return;
    }

    let diffs: Vec<f64> = calls
        .iter()
        .map(|c| c.stats.counts.maternal_pairs as f64 - c.stats.counts.paternal_pairs as f64)
        .collect();

    let n = diffs.len() as f64;
    let mean = diffs.iter().sum::<f64>() / n;
    let variance = diffs.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
    let mut std = variance.sqrt();
    if std == 0.0 {
        std = 1.0;
    }

    for (call, diff) in calls.iter_mut().zip(diffs) {
        let z = (diff - mean) / std;
        call.local_enrichment_z = z;
        // 2 * (1 - Phi(|z|)) under a standard normal
        call.local_enrichment_p = erfc(z.abs() / SQRT_2);
    }
}
