//! Calls-table, summary and resolved-configuration writers

use crate::calls::{LoopCall, PeakCall};
use crate::utils::ensure_parent_dirs;
use crate::{BiasCall, LophosResult};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Headerless TSV of peak calls; the column order is frozen for downstream
/// parsing: chrom, start, end, peak_id, maternal, paternal, total,
/// log2_ratio, p_value, fdr, bias_call.
pub fn write_peak_calls(path: &Path, calls: &[PeakCall]) -> LophosResult<()> {
    ensure_parent_dirs(path)?;
    let mut writer = File::create(path)?;

    for call in calls {
        let c = &call.stats.counts;
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            c.peak.interval.chrom,
            c.peak.interval.start,
            c.peak.interval.end,
            c.peak.id,
            c.maternal,
            c.paternal,
            call.stats.total,
            call.stats.log2_ratio,
            call.stats.p_value,
            call.stats.fdr,
            call.bias_call,
        )?;
    }

    Ok(())
}

/// Headerless TSV of loop calls, ending in bias_call plus the two
/// local-enrichment annotation columns.
pub fn write_loop_calls(path: &Path, calls: &[LoopCall]) -> LophosResult<()> {
    ensure_parent_dirs(path)?;
    let mut writer = File::create(path)?;

    for call in calls {
        let c = &call.stats.counts;
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            c.loop_.anchor1.chrom,
            c.loop_.anchor1.start,
            c.loop_.anchor1.end,
            c.loop_.anchor2.chrom,
            c.loop_.anchor2.start,
            c.loop_.anchor2.end,
            c.loop_.id,
            c.maternal_pairs,
            c.paternal_pairs,
            c.ambiguous_pairs,
            call.stats.total_pairs,
            call.stats.log2_ratio,
            call.stats.p_value,
            call.stats.fdr,
            call.bias_call,
            call.local_enrichment_z,
            call.local_enrichment_p,
        )?;
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    metric: String,
    value: String,
}

fn count_calls<T>(items: &[T], get: impl Fn(&T) -> BiasCall, call: BiasCall) -> usize {
    items.iter().filter(|item| get(item) == call).count()
}

/// Call-distribution summary for both feature kinds, one metric per row
pub fn write_summary(
    path: &Path,
    peaks: &[PeakCall],
    loops: &[LoopCall],
) -> LophosResult<()> {
    ensure_parent_dirs(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let peak_call = |c: &PeakCall| c.bias_call;
    let loop_call = |c: &LoopCall| c.bias_call;

    let rows = [
        ("peaks_total", peaks.len()),
        (
            "peaks_maternal",
            count_calls(peaks, peak_call, BiasCall::Maternal),
        ),
        (
            "peaks_paternal",
            count_calls(peaks, peak_call, BiasCall::Paternal),
        ),
        (
            "peaks_balanced",
            count_calls(peaks, peak_call, BiasCall::Balanced),
        ),
        (
            "peaks_undetermined",
            count_calls(peaks, peak_call, BiasCall::Undetermined),
        ),
        ("loops_total", loops.len()),
        (
            "loops_maternal",
            count_calls(loops, loop_call, BiasCall::Maternal),
        ),
        (
            "loops_paternal",
            count_calls(loops, loop_call, BiasCall::Paternal),
        ),
        (
            "loops_balanced",
            count_calls(loops, loop_call, BiasCall::Balanced),
        ),
        (
            "loops_undetermined",
            count_calls(loops, loop_call, BiasCall::Undetermined),
        ),
    ];

    for (metric, value) in rows {
        writer.serialize(SummaryRow {
            metric: metric.to_string(),
            value: value.to_string(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Every threshold and pattern value actually used in a run, recorded once
/// for reproducibility.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub mapq: u8,
    pub peak_window: i64,
    pub anchor_pad: i64,
    pub keep_duplicates: bool,
    pub maternal_pattern: String,
    pub paternal_pattern: String,
    pub pseudocount: f64,
    pub min_reads_peak: u32,
    pub min_pairs_loop: u32,
    pub fdr: f64,
    pub min_fold: f64,
    pub min_abs_log2: f64,
    pub max_ambiguous_frac: f64,
    pub validate_loops: String,
    pub threads: usize,
}

/// One-row TSV with a header of field names
pub fn write_resolved_config(path: &Path, config: &ResolvedConfig) -> LophosResult<()> {
    ensure_parent_dirs(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    writer.serialize(config)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::{call_loops, call_peaks, BiasThresholds};
    use crate::stats::{compute_loop_stats, compute_peak_stats, PSEUDOCOUNT};
    use crate::validate::validate_local;
    use crate::{GenomicInterval, Loop, LoopCounts, Peak, PeakCounts};
    use tempfile::tempdir;

    fn peak_counts(id: &str, m: u32, p: u32) -> PeakCounts {
        PeakCounts {
            peak: Peak {
                id: id.to_string(),
                interval: GenomicInterval::new("chr1".to_string(), 1000, 2000).unwrap(),
            },
            maternal: m,
            paternal: p,
        }
    }

    fn loop_counts(id: &str, m: u32, p: u32, amb: u32) -> LoopCounts {
        LoopCounts {
            loop_: Loop {
                id: id.to_string(),
                anchor1: GenomicInterval::new("chr1".to_string(), 1000, 2000).unwrap(),
                anchor2: GenomicInterval::new("chr1".to_string(), 900_000, 901_000).unwrap(),
            },
            maternal_pairs: m,
            paternal_pairs: p,
            ambiguous_pairs: amb,
        }
    }

    #[test]
    fn test_end_to_end_peak_calls_and_output() {
        // Two extreme peaks with default thresholds get opposite calls
        let counts = vec![peak_counts("p1", 10, 0), peak_counts("p2", 0, 10)];
        let stats = compute_peak_stats(counts, PSEUDOCOUNT);
        let calls = call_peaks(stats, &BiasThresholds::default());

        assert_eq!(calls[0].bias_call, crate::BiasCall::Maternal);
        assert_eq!(calls[1].bias_call, crate::BiasCall::Paternal);

        let dir = tempdir().unwrap();
        let path = dir.path().join("run.peaks.bed");
        write_peak_calls(&path, &calls).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(fields.len(), 11);
        assert_eq!(fields[3], "p1");
        assert_eq!(fields[10], "Maternal");
    }

    #[test]
    fn test_loop_output_columns() {
        let counts = vec![loop_counts("l1", 10, 0, 1), loop_counts("l2", 0, 10, 0)];
        let stats = compute_loop_stats(counts, PSEUDOCOUNT);
        let mut calls = call_loops(stats, &BiasThresholds::default());
        validate_local(&mut calls);

        let dir = tempdir().unwrap();
        let path = dir.path().join("run.loops.bedpe");
        write_loop_calls(&path, &calls).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let fields: Vec<&str> = content.lines().next().unwrap().split('\t').collect();
        assert_eq!(fields.len(), 17);
        assert_eq!(fields[6], "l1");
        assert_eq!(fields[14], "Maternal");
    }

    #[test]
    fn test_summary_counts() {
        let stats = compute_peak_stats(
            vec![
                peak_counts("p1", 10, 0),
                peak_counts("p2", 0, 10),
                peak_counts("p3", 1, 1),
            ],
            PSEUDOCOUNT,
        );
        let calls = call_peaks(stats, &BiasThresholds::default());

        let dir = tempdir().unwrap();
        let path = dir.path().join("run.summary.tsv");
        write_summary(&path, &calls, &[]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("metric\tvalue"));
        assert!(content.contains("peaks_total\t3"));
        assert!(content.contains("peaks_maternal\t1"));
        assert!(content.contains("peaks_undetermined\t1"));
        assert!(content.contains("loops_total\t0"));
    }

    #[test]
    fn test_resolved_config_record() {
        let config = ResolvedConfig {
            mapq: 30,
            peak_window: 500,
            anchor_pad: 10_000,
            keep_duplicates: false,
            maternal_pattern: "mat".to_string(),
            paternal_pattern: "pat".to_string(),
            pseudocount: 1.0,
            min_reads_peak: 5,
            min_pairs_loop: 3,
            fdr: 0.05,
            min_fold: 1.5,
            min_abs_log2: 0.0,
            max_ambiguous_frac: 1.0,
            validate_loops: "local".to_string(),
            threads: 4,
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("run.config.tsv");
        write_resolved_config(&path, &config).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("maternal_pattern"));
        assert!(lines[1].contains("mat"));
        assert!(lines[1].contains("0.05"));
    }
}
