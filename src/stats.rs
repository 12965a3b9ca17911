//! Effect-size, exact binomial testing and BH-FDR correction

use crate::{LoopCounts, PeakCounts};
use serde::Serialize;
use statrs::distribution::{Binomial, DiscreteCDF};

/// Constant added to both counts before taking a ratio
pub const PSEUDOCOUNT: f64 = 1.0;

/// log2((m + c) / (p + c)); exactly 0.0 when m == p
pub fn log2_ratio(m: u32, p: u32, pseudocount: f64) -> f64 {
    ((m as f64 + pseudocount) / (p as f64 + pseudocount)).log2()
}

/// Two-sided exact binomial test of m successes out of m + p trials
/// against a success probability of 0.5. Zero total evidence yields 1.0.
pub fn binom_test_two_sided(m: u32, p: u32) -> f64 {
    let n = (m + p) as u64;
    if n == 0 {
        return 1.0;
    }
    let k = m.min(p) as u64;
    let binom = Binomial::new(0.5, n).unwrap();
    // The null is symmetric, so doubling the smaller tail is exact
    (2.0 * binom.cdf(k)).min(1.0)
}

/// Benjamini-Hochberg step-up correction.
///
/// Ranks p-values ascending, scales by n / rank, and enforces monotonicity
/// with a suffix minimum, so adjusted values never decrease when read in
/// ascending-p order. Output is clamped to [0, 1].
pub fn bh_fdr(pvals: &[f64]) -> Vec<f64> {
    let n = pvals.len();
    if n == 0 {
        return vec![];
    }

    let mut indexed: Vec<(usize, f64)> = pvals.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut adjusted = vec![0.0; n];
    let mut prev = 1.0_f64;
    for (rank, (idx, pval)) in indexed.iter().enumerate().rev() {
        let q = (pval * n as f64 / (rank + 1) as f64).min(prev).min(1.0);
        adjusted[*idx] = q;
        prev = q;
    }
    adjusted
}

/// Peak counts annotated with test results
#[derive(Debug, Clone, Serialize)]
pub struct PeakStats {
    pub counts: PeakCounts,
    pub total: u32,
    pub log2_ratio: f64,
    pub p_value: f64,
    pub fdr: f64,
}

/// Annotate peak counts with ratio, p-value and BH-FDR over the whole set
pub fn compute_peak_stats(counts: Vec<PeakCounts>, pseudocount: f64) -> Vec<PeakStats> {
    let pvals: Vec<f64> = counts
        .iter()
        .map(|c| binom_test_two_sided(c.maternal, c.paternal))
        .collect();
    let qvals = bh_fdr(&pvals);

    counts
        .into_iter()
        .zip(pvals.into_iter().zip(qvals))
        .map(|(c, (p_value, fdr))| {
            let total = c.maternal + c.paternal;
            let log2_ratio = log2_ratio(c.maternal, c.paternal, pseudocount);
            PeakStats {
                counts: c,
                total,
                log2_ratio,
                p_value,
                fdr,
            }
        })
        .collect()
}

/// Loop counts annotated with test results.
///
/// The total and the test use informative pairs only; the ambiguous
/// fraction is taken over all anchor-spanning pairs.
#[derive(Debug, Clone, Serialize)]
pub struct LoopStats {
    pub counts: LoopCounts,
    pub total_pairs: u32,
    pub ambiguous_frac: f64,
    pub log2_ratio: f64,
    pub p_value: f64,
    pub fdr: f64,
}

pub fn compute_loop_stats(counts: Vec<LoopCounts>, pseudocount: f64) -> Vec<LoopStats> {
    let pvals: Vec<f64> = counts
        .iter()
        .map(|c| binom_test_two_sided(c.maternal_pairs, c.paternal_pairs))
        .collect();
    let qvals = bh_fdr(&pvals);

    counts
        .into_iter()
        .zip(pvals.into_iter().zip(qvals))
        .map(|(c, (p_value, fdr))| {
            let total_pairs = c.maternal_pairs + c.paternal_pairs;
            let denom = total_pairs + c.ambiguous_pairs;
            let ambiguous_frac = if denom > 0 {
                c.ambiguous_pairs as f64 / denom as f64
            } else {
                0.0
            };
            let log2_ratio = log2_ratio(c.maternal_pairs, c.paternal_pairs, pseudocount);
            LoopStats {
                counts: c,
                total_pairs,
                ambiguous_frac,
                log2_ratio,
                p_value,
                fdr,
            }
        })
        .collect()
}
