//! Feature table parsing (BED peaks, BEDPE loops)

use crate::utils::is_gzipped;
use crate::{GenomicInterval, Loop, LophosError, LophosResult, Peak};
use csv::ReaderBuilder;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

fn open_table<P: AsRef<Path>>(path: P) -> LophosResult<Box<dyn Read>> {
    let file = File::open(&path)
        .map_err(|_| LophosError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    let reader: Box<dyn Read> = if is_gzipped(&path)? {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

fn table_reader(input: Box<dyn Read>) -> csv::Reader<Box<dyn Read>> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(input)
}

fn parse_coord(field: &str, row: usize, what: &str) -> LophosResult<i64> {
    field.trim().parse::<i64>().map_err(|_| {
        LophosError::InvalidFeatureTable(format!("row {}: invalid {}: {:?}", row, what, field))
    })
}

/// Read a BED-like peaks table. Requires chrom/start/end; an optional 4th
/// column provides the peak id, otherwise a synthetic `peak_<row>` id is
/// assigned. Gzipped input and `#` comment lines are handled.
pub fn read_peaks<P: AsRef<Path>>(path: P) -> LophosResult<Vec<Peak>> {
    let mut reader = table_reader(open_table(path)?);
    let mut peaks = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() < 3 {
            return Err(LophosError::InvalidFeatureTable(format!(
                "peaks table row {} has {} columns, expected at least 3 (chrom, start, end)",
                idx,
                record.len()
            )));
        }
        let chrom = record[0].to_string();
        let start = parse_coord(&record[1], idx, "start")?;
        let end = parse_coord(&record[2], idx, "end")?;
        let id = match record.get(3) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("peak_{}", idx),
        };
        peaks.push(Peak {
            id,
            interval: GenomicInterval::new(chrom, start, end)?,
        });
    }

    Ok(peaks)
}

/// Read a BEDPE-like loops table. Requires the six anchor coordinate
/// columns; an optional 7th column provides the loop id.
pub fn read_loops<P: AsRef<Path>>(path: P) -> LophosResult<Vec<Loop>> {
    let mut reader = table_reader(open_table(path)?);
    let mut loops = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() < 6 {
            return Err(LophosError::InvalidFeatureTable(format!(
                "loops table row {} has {} columns, expected at least 6 (chrom1..end2)",
                idx,
                record.len()
            )));
        }
        let anchor1 = GenomicInterval::new(
            record[0].to_string(),
            parse_coord(&record[1], idx, "start1")?,
            parse_coord(&record[2], idx, "end1")?,
        )?;
        let anchor2 = GenomicInterval::new(
            record[3].to_string(),
            parse_coord(&record[4], idx, "start2")?,
            parse_coord(&record[5], idx, "end2")?,
        )?;
        let id = match record.get(6) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("loop_{}", idx),
        };
        loops.push(Loop {
            id,
            anchor1,
            anchor2,
        });
    }

    Ok(loops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_peaks_with_and_without_names() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# CTCF peaks").unwrap();
        writeln!(file, "chr1\t1000\t2000\tsummit_a").unwrap();
        writeln!(file, "chr2\t5000\t5400").unwrap();

        let peaks = read_peaks(file.path()).unwrap();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].id, "summit_a");
        assert_eq!(peaks[0].interval.chrom, "chr1");
        assert_eq!(peaks[1].id, "peak_1");
        assert_eq!(peaks[1].interval.end, 5400);
    }

    #[test]
    fn test_read_peaks_missing_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t1000").unwrap();

        let result = read_peaks(file.path());
        assert!(matches!(
            result,
            Err(LophosError::InvalidFeatureTable(_))
        ));
    }

    #[test]
    fn test_read_peaks_bad_coordinate() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\tnot_a_number\t2000").unwrap();
        assert!(read_peaks(file.path()).is_err());
    }

    #[test]
    fn test_read_loops() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t1000\t2000\tchr1\t900000\t901000\tloop_a\t55").unwrap();
        writeln!(file, "chr2\t100\t200\tchr2\t5000\t5100").unwrap();

        let loops = read_loops(file.path()).unwrap();
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].id, "loop_a");
        assert_eq!(loops[0].anchor2.start, 900_000);
        assert_eq!(loops[1].id, "loop_1");
    }

    #[test]
    fn test_read_loops_missing_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t1000\t2000\tchr1").unwrap();
        assert!(read_loops(file.path()).is_err());
    }

    #[test]
    fn test_read_gzipped_peaks() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let file = NamedTempFile::new().unwrap();
        {
            let mut enc = GzEncoder::new(File::create(file.path()).unwrap(), Compression::default());
            writeln!(enc, "chr1\t10\t20\tpk").unwrap();
            enc.finish().unwrap();
        }

        let peaks = read_peaks(file.path()).unwrap();
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].id, "pk");
    }
}
