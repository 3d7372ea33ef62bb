use crate::TransferError;

/// `Content-Range` value used for the single PUT of an empty object.
pub const EMPTY_CONTENT_RANGE: &str = "bytes */0";

// ---------------------------------------------------------------------------
// ChunkRange
// ---------------------------------------------------------------------------

/// A contiguous byte range of the source object, addressed by one PUT.
///
/// `end` is inclusive, matching the `Content-Range` header form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Position of this range in the plan (0-based).
    pub index: usize,
    /// First byte offset.
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl ChunkRange {
    /// Number of bytes covered by this range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A range always covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Formats the `Content-Range` header value for an object of `total` bytes.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Ordered ranges of at most `chunk_size` bytes covering `[0, size)`.
///
/// Ranges are computed as they are consumed, so a tiny chunk ceiling on a
/// huge object costs no memory up front.
#[derive(Debug, Clone)]
pub struct Ranges {
    size: u64,
    chunk_size: u64,
    next_start: u64,
    next_index: usize,
}

impl Iterator for Ranges {
    type Item = ChunkRange;

    fn next(&mut self) -> Option<ChunkRange> {
        if self.chunk_size == 0 || self.next_start >= self.size {
            return None;
        }
        let start = self.next_start;
        let end = start.saturating_add(self.chunk_size).min(self.size) - 1;
        let range = ChunkRange {
            index: self.next_index,
            start,
            end,
        };
        self.next_start = end + 1;
        self.next_index += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.chunk_size == 0 {
            return (0, Some(0));
        }
        let left = (self.size - self.next_start).div_ceil(self.chunk_size);
        match usize::try_from(left) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl std::iter::FusedIterator for Ranges {}

/// Splits `[0, size)` into ordered ranges of at most `chunk_size` bytes.
///
/// Only the last range may be shorter than `chunk_size`. A `size` of 0, or a
/// `chunk_size` of 0, yields no ranges.
pub fn plan_ranges(size: u64, chunk_size: u64) -> Ranges {
    Ranges {
        size,
        chunk_size,
        next_start: 0,
        next_index: 0,
    }
}

/// The chunk layout for one transfer. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    size: u64,
    chunk_size: u64,
}

impl TransferPlan {
    /// Builds the plan for an object of `size` bytes.
    ///
    /// A zero `chunk_size` is an error rather than a fallback to
    /// [`DEFAULT_CHUNK_SIZE`](crate::DEFAULT_CHUNK_SIZE).
    pub fn new(size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::ZeroChunkSize);
        }
        Ok(Self { size, chunk_size })
    }

    /// Ordered ranges covering the object.
    pub fn ranges(&self) -> Ranges {
        plan_ranges(self.size, self.chunk_size)
    }

    /// `true` for an empty object (no ranges).
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of ranges (0 for an empty object).
    pub fn len(&self) -> usize {
        usize::try_from(self.size.div_ceil(self.chunk_size)).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn assert_covers(ranges: &[ChunkRange], size: u64, chunk_size: u64) {
        let mut expected_start = 0u64;
        for (i, r) in ranges.iter().enumerate() {
            assert_eq!(r.index, i);
            assert_eq!(r.start, expected_start, "range {i} not contiguous");
            assert!(r.end >= r.start);
            assert!(r.len() <= chunk_size);
            if i + 1 < ranges.len() {
                assert_eq!(r.len(), chunk_size, "only the last range may be short");
            }
            expected_start = r.end + 1;
        }
        assert_eq!(expected_start, size);
        assert_eq!(ranges.iter().map(ChunkRange::len).sum::<u64>(), size);
    }

    #[test]
    fn zero_size_has_no_ranges() {
        let plan = TransferPlan::new(0, 100 * MIB).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn small_object_is_single_range() {
        let plan = TransferPlan::new(10, 100 * MIB).unwrap();
        assert_eq!(
            plan.ranges().collect::<Vec<_>>(),
            [ChunkRange { index: 0, start: 0, end: 9 }]
        );
    }

    #[test]
    fn exact_chunk_size_is_single_range() {
        let plan = TransferPlan::new(100 * MIB, 100 * MIB).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.ranges().next().map(|r| r.end), Some(100 * MIB - 1));
    }

    #[test]
    fn one_byte_over_splits() {
        let plan = TransferPlan::new(100 * MIB + 1, 100 * MIB).unwrap();
        assert_eq!(plan.len(), 2);
        let last = plan.ranges().last().unwrap();
        assert_eq!(last.start, 100 * MIB);
        assert_eq!(last.len(), 1);
    }

    #[test]
    fn two_hundred_fifty_mib_plan() {
        let plan = TransferPlan::new(250 * MIB, 100 * MIB).unwrap();
        let bounds: Vec<(u64, u64)> = plan.ranges().map(|r| (r.start, r.end)).collect();
        assert_eq!(
            bounds,
            vec![
                (0, 104_857_599),
                (104_857_600, 209_715_199),
                (209_715_200, 262_143_999),
            ]
        );
    }

    #[test]
    fn ranges_cover_object_exactly() {
        for size in [1u64, 2, 3, 7, 8, 9, 63, 64, 65, 1000, 4097] {
            for chunk in [1u64, 2, 3, 8, 64, 4096] {
                let ranges: Vec<_> = plan_ranges(size, chunk).collect();
                assert_covers(&ranges, size, chunk);
            }
        }
    }

    #[test]
    fn small_sizes_fit_one_range() {
        for size in 1..=16u64 {
            let ranges: Vec<_> = plan_ranges(size, 16).collect();
            assert_eq!(ranges, vec![ChunkRange { index: 0, start: 0, end: size - 1 }]);
        }
    }

    #[test]
    fn zero_chunk_size_rejected() {
        assert!(matches!(
            TransferPlan::new(10, 0),
            Err(TransferError::ZeroChunkSize)
        ));
    }

    #[test]
    fn huge_object_does_not_overflow() {
        let ranges: Vec<_> = plan_ranges(u64::MAX, u64::MAX / 2 + 1).collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].end, u64::MAX - 1);
    }

    #[test]
    fn content_range_header() {
        let r = ChunkRange { index: 1, start: 104_857_600, end: 209_715_199 };
        assert_eq!(
            r.content_range(262_144_000),
            "bytes 104857600-209715199/262144000"
        );
    }

    #[test]
    fn one_byte_chunks_on_huge_object_are_lazy() {
        let size = 15 * 1024 * MIB;
        let plan = TransferPlan::new(size, 1).unwrap();
        assert_eq!(plan.len() as u64, size);

        let mut ranges = plan.ranges();
        assert_eq!(ranges.size_hint(), (size as usize, Some(size as usize)));
        assert_eq!(ranges.next(), Some(ChunkRange { index: 0, start: 0, end: 0 }));
        assert_eq!(ranges.next(), Some(ChunkRange { index: 1, start: 1, end: 1 }));
        assert_eq!(ranges.size_hint().0 as u64, size - 2);
    }

    #[test]
    fn zero_chunk_size_yields_nothing() {
        assert_eq!(plan_ranges(10, 0).next(), None);
        assert_eq!(plan_ranges(10, 0).size_hint(), (0, Some(0)));
    }
}
