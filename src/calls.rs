//! Multi-criterion bias classification

use crate::stats::{LoopStats, PeakStats};
use crate::{BiasCall, LophosError, LophosResult};
use serde::{Deserialize, Serialize};

/// Thresholds controlling bias calling; peaks and loops each get their own
/// instance so pair-level cutoffs can differ from read-level ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasThresholds {
    /// Minimum informative count (m + p) to attempt a call
    pub min_reads: u32,
    /// Maximum BH-adjusted p-value considered significant
    pub fdr: f64,
    /// Minimum fold-change of one parental count over the other
    pub min_fold: f64,
    /// Minimum |log2 ratio| effect size
    pub min_abs_log2: f64,
    /// Maximum tolerated ambiguous-pair fraction (loops only)
    pub max_ambiguous_frac: f64,
}

impl Default for BiasThresholds {
    fn default() -> Self {
        Self {
            min_reads: 5,
            fdr: 0.05,
            min_fold: 1.5,
            min_abs_log2: 0.0,
            max_ambiguous_frac: 1.0,
        }
    }
}

pub fn validate_thresholds(thr: &BiasThresholds) -> LophosResult<()> {
    if thr.fdr <= 0.0 || thr.fdr > 1.0 {
        return Err(LophosError::InvalidConfig(
            "fdr must be in (0, 1]".to_string(),
        ));
    }
    if thr.min_fold < 1.0 {
        return Err(LophosError::InvalidConfig(
            "min_fold must be >= 1.0".to_string(),
        ));
    }
    if thr.min_abs_log2 < 0.0 {
        return Err(LophosError::InvalidConfig(
            "min_abs_log2 must be >= 0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&thr.max_ambiguous_frac) {
        return Err(LophosError::InvalidConfig(
            "max_ambiguous_frac must be in [0, 1]".to_string(),
        ));
    }
    Ok(())
}

/// Classify one feature. Rules are evaluated in a fixed order and the first
/// match wins: the coverage and ambiguity guards run before significance,
/// and significance before effect size, because noisy low-count features
/// can be significant at a trivial ratio.
pub fn classify(
    m: u32,
    p: u32,
    q: f64,
    log2_ratio: f64,
    ambiguous_frac: Option<f64>,
    thr: &BiasThresholds,
) -> BiasCall {
    let total = m + p;
    if total < thr.min_reads {
        return BiasCall::Undetermined;
    }
    if let Some(frac) = ambiguous_frac {
        if frac > thr.max_ambiguous_frac {
            return BiasCall::Undetermined;
        }
    }
    if q > thr.fdr {
        return BiasCall::Balanced;
    }
    if log2_ratio.abs() < thr.min_abs_log2 {
        return BiasCall::Balanced;
    }
    if m >= std::cmp::max(1, (p as f64 * thr.min_fold).floor() as u32) {
        return BiasCall::Maternal;
    }
    if p >= std::cmp::max(1, (m as f64 * thr.min_fold).floor() as u32) {
        return BiasCall::Paternal;
    }
    BiasCall::Balanced
}

/// A peak row with its final call
#[derive(Debug, Clone, Serialize)]
pub struct PeakCall {
    pub stats: PeakStats,
    pub bias_call: BiasCall,
}

/// A loop row with its final call and local-validation annotations.
/// The annotations stay at their neutral values until the validator runs.
#[derive(Debug, Clone, Serialize)]
pub struct LoopCall {
    pub stats: LoopStats,
    pub bias_call: BiasCall,
    pub local_enrichment_z: f64,
    pub local_enrichment_p: f64,
}

pub fn call_peaks(stats: Vec<PeakStats>, thr: &BiasThresholds) -> Vec<PeakCall> {
    stats
        .into_iter()
        .map(|s| {
            let bias_call = classify(
                s.counts.maternal,
                s.counts.paternal,
                s.fdr,
                s.log2_ratio,
                None,
                thr,
            );
            PeakCall {
                stats: s,
                bias_call,
            }
        })
        .collect()
}

pub fn call_loops(stats: Vec<LoopStats>, thr: &BiasThresholds) -> Vec<LoopCall> {
    stats
        .into_iter()
        .map(|s| {
            let bias_call = classify(
                s.counts.maternal_pairs,
                s.counts.paternal_pairs,
                s.fdr,
                s.log2_ratio,
                Some(s.ambiguous_frac),
                thr,
            );
            LoopCall {
                stats: s,
                bias_call,
                local_enrichment_z: 0.0,
                local_enrichment_p: 1.0,
            }
        })
        .collect()
}
