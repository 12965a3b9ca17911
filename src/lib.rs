//! # lophos-rs - Allele-Specific Peak & Loop Phasing
//!
//! A Rust implementation of the LOPHOS tool for calling parental-origin
//! (allele) bias of CTCF peaks and chromatin loops from haplotype-tagged
//! HiChIP alignments.

pub mod bam;
pub mod calls;
pub mod dispatch;
pub mod features;
pub mod motif;
pub mod report;
pub mod stats;
pub mod utils;
pub mod validate;

use serde::{Deserialize, Serialize};

/// A half-open, 0-based genomic interval
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicInterval {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
}

impl GenomicInterval {
    pub fn new(chrom: String, start: i64, end: i64) -> LophosResult<Self> {
        if start > end {
            return Err(LophosError::InvalidFeatureTable(format!(
                "interval start > end: {}:{}-{}",
                chrom, start, end
            )));
        }
        Ok(Self { chrom, start, end })
    }

    /// Midpoint of the interval, rounded down
    pub fn center(&self) -> i64 {
        (self.start + self.end) / 2
    }

    pub fn contains(&self, pos: i64) -> bool {
        self.start <= pos && pos < self.end
    }
}

/// A point-like feature counted over a symmetric window around its center
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peak {
    pub id: String,
    pub interval: GenomicInterval,
}

impl Peak {
    /// Evidence window `[center - w, center + w)`
    pub fn window(&self, window_bp: i64) -> (i64, i64) {
        let center = self.interval.center();
        (center - window_bp, center + window_bp)
    }
}

/// A paired-anchor feature counted over padded anchor windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loop {
    pub id: String,
    pub anchor1: GenomicInterval,
    pub anchor2: GenomicInterval,
}

impl Loop {
    /// Padded window for one anchor: `[start - pad, end + pad)`
    pub fn anchor_window(anchor: &GenomicInterval, pad: i64) -> (i64, i64) {
        (anchor.start - pad, anchor.end + pad)
    }
}

/// Parental-origin assignment for a single alignment record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allele {
    Maternal,
    Paternal,
    Unknown,
}

/// Allele-labeled read counts for one peak
#[derive(Debug, Clone, Serialize)]
pub struct PeakCounts {
    pub peak: Peak,
    pub maternal: u32,
    pub paternal: u32,
}

/// Allele-labeled pair counts for one loop
#[derive(Debug, Clone, Serialize)]
pub struct LoopCounts {
    pub loop_: Loop,
    pub maternal_pairs: u32,
    pub paternal_pairs: u32,
    pub ambiguous_pairs: u32,
}

/// Categorical bias call attached to each feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiasCall {
    Maternal,
    Paternal,
    Balanced,
    Undetermined,
}

impl BiasCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            BiasCall::Maternal => "Maternal",
            BiasCall::Paternal => "Paternal",
            BiasCall::Balanced => "Balanced",
            BiasCall::Undetermined => "Undetermined",
        }
    }
}

impl std::fmt::Display for BiasCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record-level filtering and windowing parameters, fixed for a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountParams {
    pub mapq: u8,
    pub peak_window: i64,
    pub anchor_pad: i64,
    pub keep_duplicates: bool,
}

impl Default for CountParams {
    fn default() -> Self {
        Self {
            mapq: 30,
            peak_window: 500,
            anchor_pad: 10_000,
            keep_duplicates: false,
        }
    }
}

/// Error types for the lophos library
#[derive(Debug, thiserror::Error)]
pub enum LophosError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTSlib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid haplotype-tag pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid feature table: {0}")]
    InvalidFeatureTable(String),

    #[error("Chromosome not present in alignment file: {0}")]
    UnknownChromosome(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type LophosResult<T> = Result<T, LophosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_center() {
        let iv = GenomicInterval::new("chr1".to_string(), 100, 200).unwrap();
        assert_eq!(iv.center(), 150);
        assert!(iv.contains(100));
        assert!(iv.contains(199));
        assert!(!iv.contains(200));
    }

    #[test]
    fn test_interval_rejects_inverted_coordinates() {
        let result = GenomicInterval::new("chr1".to_string(), 200, 100);
        assert!(matches!(result, Err(LophosError::InvalidFeatureTable(_))));
    }

    #[test]
    fn test_peak_window() {
        let peak = Peak {
            id: "peak_0".to_string(),
            interval: GenomicInterval::new("chr1".to_string(), 1000, 2000).unwrap(),
        };
        assert_eq!(peak.window(500), (1000, 2000));
    }

    #[test]
    fn test_anchor_window_padding() {
        let anchor = GenomicInterval::new("chr2".to_string(), 50_000, 55_000).unwrap();
        assert_eq!(Loop::anchor_window(&anchor, 10_000), (40_000, 65_000));
    }

    #[test]
    fn test_bias_call_display() {
        assert_eq!(BiasCall::Maternal.to_string(), "Maternal");
        assert_eq!(BiasCall::Undetermined.to_string(), "Undetermined");
    }
}
