//! Splitting the glacier population into worker chunks.

use std::ops::Range;

/// Chunk size for a population: the population divided evenly across the
/// workers (rounded up), capped by the configured group size.
pub fn chunk_size(population: usize, num_workers: usize, group_size: usize) -> usize {
    let workers = num_workers.max(1);
    let per_worker = (population + workers - 1) / workers;
    per_worker.clamp(1, group_size.max(1))
}

/// Contiguous index ranges covering `0..population` in steps of `size`; the
/// last range may be shorter.
pub fn chunk_ranges(population: usize, size: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < population {
        let end = (start + size).min(population);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_divides_across_workers_rounding_up() {
        assert_eq!(chunk_size(10, 5, 500), 2);
        assert_eq!(chunk_size(11, 5, 500), 3);
        assert_eq!(chunk_size(1, 5, 500), 1);
    }

    #[test]
    fn group_size_caps_the_chunk() {
        assert_eq!(chunk_size(10_000, 2, 500), 500);
    }

    #[test]
    fn ranges_cover_the_population_exactly_once() {
        let ranges = chunk_ranges(11, 3);
        assert_eq!(ranges, vec![0..3, 3..6, 6..9, 9..11]);
        assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), 11);
    }

    #[test]
    fn empty_population_yields_no_ranges() {
        assert!(chunk_ranges(0, 3).is_empty());
    }
}
