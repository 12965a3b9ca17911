//! CTCF motif annotation stub
//!
//! Motif scanning is not implemented. The public shape is stable so a real
//! PWM scanner can be dropped in later; until then every anchor gets a
//! typed capability result instead of a silent runtime fallback.

use crate::GenomicInterval;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotifCapability {
    /// No FASTA supplied; scanning was never requested
    Disabled,
    /// FASTA supplied but the scanner is not implemented yet
    NotImplemented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Convergent,
    Divergent,
    Same,
}

#[derive(Debug, Clone, Serialize)]
pub struct MotifCheck {
    pub has_ctcf_motif: bool,
    pub orientation: Option<Orientation>,
    pub capability: MotifCapability,
}

/// One neutral result per anchor
pub fn check_ctcf_motifs(
    anchors: &[GenomicInterval],
    fasta_path: Option<&Path>,
) -> Vec<MotifCheck> {
    let capability = if fasta_path.is_some() {
        MotifCapability::NotImplemented
    } else {
        MotifCapability::Disabled
    };

    anchors
        .iter()
        .map(|_| MotifCheck {
            has_ctcf_motif: false,
            orientation: None,
            capability,
        })
        .collect()
}
