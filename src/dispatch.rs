//! Order-preserving chunked dispatch of evidence counting

use crate::LophosResult;
use rayon::prelude::*;

/// Split a feature slice into at most `num_chunks` contiguous chunks of
/// near-equal size (ceiling division). Never returns an empty chunk list.
pub fn chunkify<T>(items: &[T], num_chunks: usize) -> Vec<&[T]> {
    if items.is_empty() || num_chunks <= 1 {
        return vec![items];
    }
    let num_chunks = std::cmp::min(num_chunks, items.len());
    let chunk_size = items.len().div_ceil(num_chunks);
    items.chunks(chunk_size).collect()
}

/// Run `count_chunk` over the feature table with `workers` parallel jobs.
///
/// With `workers <= 1` (or an empty table) the whole slice is processed in
/// a single call, on a single handle. Otherwise each chunk job is expected
/// to open its own alignment handle; results are concatenated in chunk
/// order, so output row order always equals input row order. The first
/// chunk error aborts the whole dispatch.
pub fn dispatch<Feat, Row, F>(
    features: &[Feat],
    workers: usize,
    count_chunk: F,
) -> LophosResult<Vec<Row>>
where
    Feat: Sync,
    Row: Send,
    F: Fn(&[Feat]) -> LophosResult<Vec<Row>> + Sync,
{
    if workers <= 1 || features.is_empty() {
        return count_chunk(features);
    }

    let chunks = chunkify(features, workers);
    log::debug!(
        "dispatching {} features across {} chunks",
        features.len(),
        chunks.len()
    );

    let chunk_results: LophosResult<Vec<Vec<Row>>> =
        chunks.into_par_iter().map(|chunk| count_chunk(chunk)).collect();

    let mut results = Vec::with_capacity(features.len());
    for chunk_result in chunk_results? {
        results.extend(chunk_result);
    }
    Ok(results)
}
