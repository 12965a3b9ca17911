//! BAM access, haplotype-tag resolution, and windowed evidence counting

use crate::{
    Allele, CountParams, Loop, LoopCounts, LophosError, LophosResult, Peak, PeakCounts,
};
use regex::{Regex, RegexBuilder};
use rust_htslib::bam::{record::Aux, IndexedReader, Read, Record};
use std::path::Path;

/// Default read-group tokens accepted as maternal / paternal
pub const DEFAULT_MATERNAL_PATTERN: &str = r"^(?:maternal|mat|m)$";
pub const DEFAULT_PATERNAL_PATTERN: &str = r"^(?:paternal|pat|p)$";

/// Maps a record's read-group tag to a parental allele.
///
/// Both patterns are compiled once, before any counting starts, and the
/// tagger is shared read-only across workers for the rest of the run.
#[derive(Debug, Clone)]
pub struct AlleleTagger {
    maternal: Regex,
    paternal: Regex,
}

impl AlleleTagger {
    pub fn new(maternal_pattern: &str, paternal_pattern: &str) -> LophosResult<Self> {
        let maternal = RegexBuilder::new(maternal_pattern)
            .case_insensitive(true)
            .build()?;
        let paternal = RegexBuilder::new(paternal_pattern)
            .case_insensitive(true)
            .build()?;
        Ok(Self { maternal, paternal })
    }

    /// Resolve a raw haplotype tag. A tag matching both patterns resolves
    /// as paternal; an absent or unmatched tag is Unknown.
    pub fn resolve(&self, tag: Option<&str>) -> Allele {
        let tag = match tag {
            Some(t) => t,
            None => return Allele::Unknown,
        };
        if self.maternal.is_match(tag) && !self.paternal.is_match(tag) {
            Allele::Maternal
        } else if self.paternal.is_match(tag) {
            Allele::Paternal
        } else {
            Allele::Unknown
        }
    }

    /// Resolve the allele of an alignment record from its RG tag
    pub fn allele_of(&self, record: &Record) -> Allele {
        match record.aux(b"RG") {
            Ok(Aux::String(rg)) => self.resolve(Some(rg)),
            _ => self.resolve(None),
        }
    }
}

/// Indexed BAM scanner owning one reader handle.
///
/// Handles are not safe to share across threads; every parallel worker
/// opens its own scanner (see `count_peak_chunk` / `count_loop_chunk`).
pub struct BamScanner {
    reader: IndexedReader,
}

impl BamScanner {
    pub fn open<P: AsRef<Path>>(bam_path: P) -> LophosResult<Self> {
        let bam_path = bam_path.as_ref();

        // Check for BAI index file next to the BAM file
        let bai_path = bam_path.with_extension("bam.bai");
        let alt_bai_path = bam_path.with_extension("bai");

        let reader = if bai_path.exists() {
            IndexedReader::from_path_and_index(bam_path, &bai_path)?
        } else if alt_bai_path.exists() {
            IndexedReader::from_path_and_index(bam_path, &alt_bai_path)?
        } else {
            return Err(LophosError::FileNotFound(format!(
                "BAM index file not found. Expected {} or {}",
                bai_path.display(),
                alt_bai_path.display()
            )));
        };

        Ok(BamScanner { reader })
    }

    fn resolve_tid(&self, chrom: &str) -> LophosResult<u32> {
        self.reader
            .header()
            .tid(chrom.as_bytes())
            .ok_or_else(|| LophosError::UnknownChromosome(chrom.to_string()))
    }

    fn passes_filters(record: &Record, params: &CountParams) -> bool {
        if record.is_unmapped() || record.mapq() < params.mapq {
            return false;
        }
        if !params.keep_duplicates && record.is_duplicate() {
            return false;
        }
        true
    }

    /// Count allele-tagged reads over the peak's evidence window.
    /// Reads without a resolvable haplotype tag are dropped.
    pub fn count_peak(
        &mut self,
        peak: &Peak,
        tagger: &AlleleTagger,
        params: &CountParams,
    ) -> LophosResult<PeakCounts> {
        let tid = self.resolve_tid(&peak.interval.chrom)?;
        let (wstart, wend) = peak.window(params.peak_window);
        self.reader.fetch((tid as i32, wstart.max(0), wend))?;

        let mut maternal = 0u32;
        let mut paternal = 0u32;
        let mut record = Record::new();
        while let Some(result) = self.reader.read(&mut record) {
            result?;
            if !Self::passes_filters(&record, params) {
                continue;
            }
            // fetch can return reads that only touch the region via clipping
            if record.pos() >= wend || record.cigar().end_pos() <= wstart {
                continue;
            }
            match tagger.allele_of(&record) {
                Allele::Maternal => maternal += 1,
                Allele::Paternal => paternal += 1,
                Allele::Unknown => {}
            }
        }

        Ok(PeakCounts {
            peak: peak.clone(),
            maternal,
            paternal,
        })
    }

    /// Count read pairs connecting the loop's padded anchor windows.
    pub fn count_loop(
        &mut self,
        loop_: &Loop,
        tagger: &AlleleTagger,
        params: &CountParams,
    ) -> LophosResult<LoopCounts> {
        let tid1 = self.resolve_tid(&loop_.anchor1.chrom)?;
        let tid2 = self.resolve_tid(&loop_.anchor2.chrom)?;
        let (a1s, a1e) = Loop::anchor_window(&loop_.anchor1, params.anchor_pad);
        let (a2s, a2e) = Loop::anchor_window(&loop_.anchor2, params.anchor_pad);

        self.reader.fetch((tid1 as i32, a1s.max(0), a1e))?;

        let mut maternal_pairs = 0u32;
        let mut paternal_pairs = 0u32;
        let mut ambiguous_pairs = 0u32;
        let mut record = Record::new();
        while let Some(result) = self.reader.read(&mut record) {
            result?;
            if !Self::passes_filters(&record, params) {
                continue;
            }
            if !record.is_paired() || record.mtid() < 0 {
                continue;
            }
            let mate_in_anchor2 = record.mtid() == tid2 as i32
                && a2s <= record.mpos()
                && record.mpos() < a2e;
            if !mate_in_anchor2 {
                continue;
            }

            let a = tagger.allele_of(&record);
            // Mates share the RG tag in phased HiChIP pipelines, so the mate
            // side is resolved from this record's tag as well; a pair only
            // becomes ambiguous when the tag itself is uninformative.
            let b = a;
            match (a, b) {
                (Allele::Maternal, Allele::Maternal) => maternal_pairs += 1,
                (Allele::Paternal, Allele::Paternal) => paternal_pairs += 1,
                _ => ambiguous_pairs += 1,
            }
        }

        Ok(LoopCounts {
            loop_: loop_.clone(),
            maternal_pairs,
            paternal_pairs,
            ambiguous_pairs,
        })
    }
}

/// Count a chunk of peaks on a freshly opened scanner handle
pub fn count_peak_chunk(
    peaks: &[Peak],
    bam_path: &Path,
    tagger: &AlleleTagger,
    params: &CountParams,
) -> LophosResult<Vec<PeakCounts>> {
    let mut scanner = BamScanner::open(bam_path)?;
    let mut results = Vec::with_capacity(peaks.len());
    for peak in peaks {
        results.push(scanner.count_peak(peak, tagger, params)?);
    }
    Ok(results)
}

/// Count a chunk of loops on a freshly opened scanner handle
pub fn count_loop_chunk(
    loops: &[Loop],
    bam_path: &Path,
    tagger: &AlleleTagger,
    params: &CountParams,
) -> LophosResult<Vec<LoopCounts>> {
    let mut scanner = BamScanner::open(bam_path)?;
    let mut results = Vec::with_capacity(loops.len());
    for loop_ in loops {
        results.push(scanner.count_loop(loop_, tagger, params)?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::NamedTempFile;

    fn default_tagger() -> AlleleTagger {
        AlleleTagger::new(DEFAULT_MATERNAL_PATTERN, DEFAULT_PATERNAL_PATTERN).unwrap()
    }

    #[test]
    fn test_resolve_default_patterns() {
        let tagger = default_tagger();
        assert_eq!(tagger.resolve(Some("maternal")), Allele::Maternal);
        assert_eq!(tagger.resolve(Some("MAT")), Allele::Maternal);
        assert_eq!(tagger.resolve(Some("m")), Allele::Maternal);
        assert_eq!(tagger.resolve(Some("paternal")), Allele::Paternal);
        assert_eq!(tagger.resolve(Some("Pat")), Allele::Paternal);
        assert_eq!(tagger.resolve(Some("p")), Allele::Paternal);
        assert_eq!(tagger.resolve(Some("hap1")), Allele::Unknown);
        assert_eq!(tagger.resolve(None), Allele::Unknown);
    }

    #[test]
    fn test_resolve_custom_patterns() {
        let tagger = AlleleTagger::new("hp1", "hp2").unwrap();
        assert_eq!(tagger.resolve(Some("sample_hp1")), Allele::Maternal);
        assert_eq!(tagger.resolve(Some("sample_HP2")), Allele::Paternal);
        assert_eq!(tagger.resolve(Some("sample")), Allele::Unknown);
    }

    #[test]
    fn test_resolve_dual_match_falls_to_paternal() {
        // A tag matching both patterns fails the maternal-and-not-paternal
        // rule and resolves via the paternal branch.
        let tagger = AlleleTagger::new("hap", "hap2").unwrap();
        assert_eq!(tagger.resolve(Some("hap2")), Allele::Paternal);
        assert_eq!(tagger.resolve(Some("hap1")), Allele::Maternal);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(AlleleTagger::new("(unclosed", "pat").is_err());
    }

    #[test]
    fn test_scanner_index_detection() {
        let temp_bam = NamedTempFile::new().unwrap();
        let bam_path = temp_bam.path();

        // No index file exists, should return error
        let result = BamScanner::open(bam_path);
        assert!(result.is_err());

        if let Err(LophosError::FileNotFound(msg)) = result {
            assert!(msg.contains("BAM index file not found"));
            assert!(msg.contains(".bam.bai"));
            assert!(msg.contains(".bai"));
        } else {
            panic!("Expected FileNotFound error");
        }
    }

    #[test]
    fn test_scanner_with_bai_extension() {
        let temp_bam = NamedTempFile::new().unwrap();
        let bam_path = temp_bam.path();

        let bai_path = bam_path.with_extension("bam.bai");
        let _temp_bai = File::create(&bai_path).unwrap();

        // The scanner finds the index but still fails on the bogus BAM body
        let result = BamScanner::open(bam_path);
        assert!(result.is_err());

        std::fs::remove_file(bai_path).ok();
    }
}
