//! CLI binary for lophos - phases CTCF peaks and loops from a haplotype-tagged BAM

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use lophos_rs::{
    bam::{count_loop_chunk, count_peak_chunk, AlleleTagger, DEFAULT_MATERNAL_PATTERN,
          DEFAULT_PATERNAL_PATTERN},
    calls::{call_loops, call_peaks, validate_thresholds, BiasThresholds},
    dispatch::dispatch,
    features::{read_loops, read_peaks},
    motif::check_ctcf_motifs,
    report::{write_loop_calls, write_peak_calls, write_resolved_config, write_summary,
             ResolvedConfig},
    stats::{compute_loop_stats, compute_peak_stats, PSEUDOCOUNT},
    utils::{get_num_cpus, validate_file_readable, Timer},
    validate::validate_local,
    BiasCall, CountParams,
};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ValidateMode {
    /// Skip local validation; annotation columns stay neutral
    None,
    /// Approximate z-score re-scoring of loop calls
    Local,
}

#[derive(Parser)]
#[command(name = "lophos")]
#[command(about = "LOPHOS - allele-specific phasing of CTCF peaks & loops")]
#[command(long_about = "
LOPHOS assigns parental-origin bias to CTCF peaks and chromatin loops from a
phased HiChIP BAM whose read groups carry the haplotype assignment.

The workflow:
1. Reads peak (BED) and loop (BEDPE) feature tables
2. Counts maternal/paternal evidence over each feature's windows, in
   parallel chunks with one BAM handle per worker
3. Tests counts against a no-bias null (exact binomial, BH-FDR corrected)
4. Classifies each feature as Maternal/Paternal/Balanced/Undetermined
5. Re-scores loop calls with an approximate local-enrichment z-score

The BAM index file (.bai) must be present next to the BAM file, either as
<name>.bam.bai or <name>.bai.

Outputs, per --out prefix: .peaks.bed, .loops.bedpe, .summary.tsv and a
.config.tsv recording every parameter value actually used.
")]
struct Args {
    /// Phased HiChIP BAM with haplotype RG tags
    #[arg(long, value_name = "FILE")]
    bam: PathBuf,

    /// CTCF peaks (BED, optionally gzipped)
    #[arg(long, value_name = "FILE")]
    peaks: PathBuf,

    /// Loops (BEDPE, optionally gzipped)
    #[arg(long, value_name = "FILE")]
    loops: PathBuf,

    /// Output path prefix
    #[arg(long, value_name = "PREFIX")]
    out: PathBuf,

    /// Minimum MAPQ to count a record
    #[arg(long, default_value_t = 30)]
    mapq: u8,

    /// Peak center +/- bp evidence window
    #[arg(long, default_value_t = 500)]
    peak_window: i64,

    /// Anchor padding (bp) when matching mates
    #[arg(long, default_value_t = 10_000)]
    anchor_pad: i64,

    /// Minimum total reads to call a peak
    #[arg(long, default_value_t = 5)]
    min_reads_peak: u32,

    /// Minimum informative pairs to call a loop
    #[arg(long, default_value_t = 3)]
    min_pairs_loop: u32,

    /// BH-FDR significance threshold
    #[arg(long, default_value_t = 0.05)]
    fdr: f64,

    /// Minimum fold-change of one parental count over the other
    #[arg(long, default_value_t = 1.5)]
    min_fold: f64,

    /// Minimum |log2 ratio| effect size
    #[arg(long, default_value_t = 0.0)]
    min_abs_log2: f64,

    /// Maximum ambiguous-pair fraction before a loop is Undetermined
    #[arg(long, default_value_t = 1.0)]
    max_ambiguous_frac: f64,

    /// Case-insensitive regex matching maternal read-group tags
    #[arg(long, default_value = DEFAULT_MATERNAL_PATTERN)]
    maternal_pattern: String,

    /// Case-insensitive regex matching paternal read-group tags
    #[arg(long, default_value = DEFAULT_PATERNAL_PATTERN)]
    paternal_pattern: String,

    /// Keep PCR/optical duplicates
    #[arg(long)]
    keep_duplicates: bool,

    /// Loop re-scoring mode
    #[arg(long, value_enum, default_value_t = ValidateMode::Local)]
    validate_loops: ValidateMode,

    /// Reference FASTA for CTCF motif annotation (scanner not implemented)
    #[arg(long, value_name = "FILE")]
    fasta: Option<PathBuf>,

    /// Number of parallel counting workers
    #[arg(long, default_value_t = get_num_cpus())]
    threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of output files if they exist
    #[arg(short, long)]
    force: bool,
}

fn out_path(prefix: &PathBuf, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix.display(), suffix))
}

fn log_call_distribution(kind: &str, calls: &[BiasCall]) {
    if calls.is_empty() {
        return;
    }
    let count = |c: BiasCall| calls.iter().filter(|&&x| x == c).count();
    log::info!(
        "{} calls: {} maternal, {} paternal, {} balanced, {} undetermined",
        kind,
        count(BiasCall::Maternal),
        count(BiasCall::Paternal),
        count(BiasCall::Balanced),
        count(BiasCall::Undetermined),
    );
}

fn run() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    log::info!("Starting LOPHOS phasing");
    log::info!("Input BAM: {:?}", args.bam);
    log::info!("Peaks: {:?}  Loops: {:?}", args.peaks, args.loops);
    log::info!("Workers: {}", args.threads);

    validate_file_readable(&args.bam).context("BAM file is not readable")?;
    validate_file_readable(&args.peaks).context("peaks table is not readable")?;
    validate_file_readable(&args.loops).context("loops table is not readable")?;

    let peaks_out = out_path(&args.out, ".peaks.bed");
    let loops_out = out_path(&args.out, ".loops.bedpe");
    let summary_out = out_path(&args.out, ".summary.tsv");
    let config_out = out_path(&args.out, ".config.tsv");
    for path in [&peaks_out, &loops_out, &summary_out, &config_out] {
        if path.exists() && !args.force {
            bail!(
                "output file {:?} already exists; use --force to overwrite",
                path
            );
        }
    }

    // Resolve all configuration before any counting starts; the tagger and
    // params are shared read-only by every worker from here on.
    let peak_thresholds = BiasThresholds {
        min_reads: args.min_reads_peak,
        fdr: args.fdr,
        min_fold: args.min_fold,
        min_abs_log2: args.min_abs_log2,
        max_ambiguous_frac: args.max_ambiguous_frac,
    };
    let loop_thresholds = BiasThresholds {
        min_reads: args.min_pairs_loop,
        ..peak_thresholds.clone()
    };
    validate_thresholds(&peak_thresholds).context("invalid peak thresholds")?;
    validate_thresholds(&loop_thresholds).context("invalid loop thresholds")?;

    let tagger = AlleleTagger::new(&args.maternal_pattern, &args.paternal_pattern)
        .context("failed to compile haplotype-tag patterns")?;
    let params = CountParams {
        mapq: args.mapq,
        peak_window: args.peak_window,
        anchor_pad: args.anchor_pad,
        keep_duplicates: args.keep_duplicates,
    };

    let peaks = {
        let _timer = Timer::new("Reading feature tables");
        read_peaks(&args.peaks).context("failed to read peaks table")?
    };
    let loops = read_loops(&args.loops).context("failed to read loops table")?;
    log::info!("Read {} peaks and {} loops", peaks.len(), loops.len());

    let peak_counts = {
        let _timer = Timer::new("Counting peak evidence");
        dispatch(&peaks, args.threads, |chunk| {
            count_peak_chunk(chunk, &args.bam, &tagger, &params)
        })
        .context("peak counting failed")?
    };

    let loop_counts = {
        let _timer = Timer::new("Counting loop evidence");
        dispatch(&loops, args.threads, |chunk| {
            count_loop_chunk(chunk, &args.bam, &tagger, &params)
        })
        .context("loop counting failed")?
    };

    let peak_stats = compute_peak_stats(peak_counts, PSEUDOCOUNT);
    let loop_stats = compute_loop_stats(loop_counts, PSEUDOCOUNT);

    let peak_calls = call_peaks(peak_stats, &peak_thresholds);
    let mut loop_calls = call_loops(loop_stats, &loop_thresholds);

    if args.validate_loops == ValidateMode::Local {
        let _timer = Timer::new("Local validation of loop calls");
        validate_local(&mut loop_calls);
    }

    if let Some(fasta) = &args.fasta {
        let anchors: Vec<_> = loops
            .iter()
            .flat_map(|l| [l.anchor1.clone(), l.anchor2.clone()])
            .collect();
        let checks = check_ctcf_motifs(&anchors, Some(fasta));
        log::warn!(
            "CTCF motif scanning is not implemented; {} anchors left unannotated",
            checks.len()
        );
    }

    log_call_distribution(
        "peak",
        &peak_calls.iter().map(|c| c.bias_call).collect::<Vec<_>>(),
    );
    log_call_distribution(
        "loop",
        &loop_calls.iter().map(|c| c.bias_call).collect::<Vec<_>>(),
    );

    write_peak_calls(&peaks_out, &peak_calls).context("failed to write peak calls")?;
    write_loop_calls(&loops_out, &loop_calls).context("failed to write loop calls")?;
    write_summary(&summary_out, &peak_calls, &loop_calls)
        .context("failed to write summary")?;

    let resolved = ResolvedConfig {
        mapq: args.mapq,
        peak_window: args.peak_window,
        anchor_pad: args.anchor_pad,
        keep_duplicates: args.keep_duplicates,
        maternal_pattern: args.maternal_pattern.clone(),
        paternal_pattern: args.paternal_pattern.clone(),
        pseudocount: PSEUDOCOUNT,
        min_reads_peak: args.min_reads_peak,
        min_pairs_loop: args.min_pairs_loop,
        fdr: args.fdr,
        min_fold: args.min_fold,
        min_abs_log2: args.min_abs_log2,
        max_ambiguous_frac: args.max_ambiguous_frac,
        validate_loops: match args.validate_loops {
            ValidateMode::None => "none".to_string(),
            ValidateMode::Local => "local".to_string(),
        },
        threads: args.threads,
    };
    write_resolved_config(&config_out, &resolved)
        .context("failed to write resolved configuration")?;

    log::info!(
        "Done. Outputs: {:?}, {:?}, {:?}, {:?}",
        peaks_out,
        loops_out,
        summary_out,
        config_out
    );

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from([
            "lophos", "--bam", "in.bam", "--peaks", "p.bed", "--loops", "l.bedpe", "--out",
            "out/run",
        ])
        .unwrap();

        assert_eq!(args.mapq, 30);
        assert_eq!(args.peak_window, 500);
        assert_eq!(args.anchor_pad, 10_000);
        assert_eq!(args.min_reads_peak, 5);
        assert_eq!(args.min_pairs_loop, 3);
        assert_eq!(args.validate_loops, ValidateMode::Local);
        assert!(!args.keep_duplicates);
    }

    #[test]
    fn test_out_path_prefix() {
        let prefix = PathBuf::from("results/run1");
        assert_eq!(
            out_path(&prefix, ".peaks.bed"),
            PathBuf::from("results/run1.peaks.bed")
        );
    }

    #[test]
    fn test_validate_mode_parsing() {
        let args = Args::try_parse_from([
            "lophos", "--bam", "in.bam", "--peaks", "p.bed", "--loops", "l.bedpe", "--out", "o",
            "--validate-loops", "none",
        ])
        .unwrap();
        assert_eq!(args.validate_loops, ValidateMode::None);
    }
}
