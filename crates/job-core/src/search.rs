//! Software nonce search from a prepared midstate.
//!
//! Lanes split the 32-bit nonce space into disjoint ranges and hash only the
//! 16-byte header tail per nonce.

use crate::pipeline::PreparedWork;
use crate::share::Validation;

/// Size of the nonce space.
pub const NONCE_SPACE: u64 = 1 << 32;

/// Half-open nonce range `start..end`, `end` at most [`NONCE_SPACE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    start: u64,
    end: u64,
}

impl NonceRange {
    pub fn new(start: u64, end: u64) -> Self {
        let end = end.min(NONCE_SPACE);
        NonceRange {
            start: start.min(end),
            end,
        }
    }

    /// Every 32-bit nonce.
    pub fn full() -> Self {
        NonceRange::new(0, NONCE_SPACE)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Split into `lanes` disjoint ranges covering this one. Earlier lanes
    /// take the remainder.
    pub fn split(&self, lanes: usize) -> Vec<NonceRange> {
        let lanes = lanes.max(1) as u64;
        let chunk = self.len() / lanes;
        let extra = self.len() % lanes;

        let mut cursor = self.start;
        (0..lanes)
            .map(|lane| {
                let len = chunk + u64::from(lane < extra);
                let range = NonceRange::new(cursor, cursor + len);
                cursor += len;
                range
            })
            .collect()
    }

    /// Take the first `count` nonces off the front.
    pub fn take_batch(&mut self, count: u64) -> NonceRange {
        let batch = NonceRange::new(self.start, self.start.saturating_add(count).min(self.end));
        self.start = batch.end;
        batch
    }

    /// Drop every nonce up to and including `nonce`.
    pub fn resume_after(&mut self, nonce: u32) {
        self.start = self.start.max(u64::from(nonce) + 1).min(self.end);
    }
}

/// A nonce whose header met the work's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub nonce: u32,
    pub validation: Validation,
}

/// Outcome of searching one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    pub found: Option<Found>,
    pub hashes_computed: u64,
}

impl SearchResult {
    pub fn not_found(hashes: u64) -> Self {
        SearchResult {
            found: None,
            hashes_computed: hashes,
        }
    }
}

/// Try every nonce in `range` against the work's primary midstate and stop
/// at the first one meeting its target.
pub fn search(work: &PreparedWork, range: NonceRange) -> SearchResult {
    let midstate = work.midstate();
    let mut tail = work.header.tail();

    for (tried, nonce) in (range.start..range.end).enumerate() {
        let nonce = nonce as u32;
        tail[12..16].copy_from_slice(&nonce.to_le_bytes());

        let validation = Validation::from_hash(&midstate.finish(&tail), &work.target);
        if validation.accepted {
            return SearchResult {
                found: Some(Found { nonce, validation }),
                hashes_computed: tried as u64 + 1,
            };
        }
    }

    SearchResult::not_found(range.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_full_range() {
        let full = NonceRange::full();
        assert_eq!(full.len(), 1 << 32);
        assert_eq!(NonceRange::new(5, u64::MAX), NonceRange::new(5, NONCE_SPACE));
        assert!(NonceRange::new(10, 3).is_empty());
    }

    #[test]
    fn test_split_four_lanes() {
        let lanes = NonceRange::full().split(4);
        assert_eq!(
            lanes,
            vec![
                NonceRange::new(0, 0x4000_0000),
                NonceRange::new(0x4000_0000, 0x8000_0000),
                NonceRange::new(0x8000_0000, 0xc000_0000),
                NonceRange::new(0xc000_0000, NONCE_SPACE),
            ]
        );
    }

    #[test]
    fn test_take_batch() {
        let mut range = NonceRange::new(0, 10);
        assert_eq!(range.take_batch(4), NonceRange::new(0, 4));
        assert_eq!(range.take_batch(4), NonceRange::new(4, 8));
        assert_eq!(range.take_batch(4), NonceRange::new(8, 10));
        assert!(range.take_batch(4).is_empty());
    }

    #[test]
    fn test_resume_after_hit() {
        let mut range = NonceRange::new(0, 100);
        range.take_batch(50);
        range.resume_after(20);
        assert_eq!(range, NonceRange::new(50, 100));

        range.resume_after(70);
        assert_eq!(range.start(), 71);
        range.resume_after(u32::MAX);
        assert!(range.is_empty());
        assert_eq!(range.end(), 100);
    }

    #[test]
    fn test_range_never_exceeds_nonce_space() {
        let mut range = NonceRange::new(0, u64::MAX);
        assert_eq!(range.end(), NONCE_SPACE);
        range.resume_after(u32::MAX);
        assert!(range.is_empty());
        assert!(range.take_batch(10).is_empty());
    }

    proptest! {
        #[test]
        fn split_is_disjoint_and_covering(
            start in 0u64..NONCE_SPACE,
            len in 0u64..100_000,
            lanes in 1usize..17,
        ) {
            let range = NonceRange::new(start, start + len);
            let parts = range.split(lanes);

            prop_assert_eq!(parts.len(), lanes);
            prop_assert_eq!(parts[0].start, range.start);
            prop_assert_eq!(parts[lanes - 1].end, range.end);
            for pair in parts.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            prop_assert_eq!(parts.iter().map(NonceRange::len).sum::<u64>(), range.len());
        }
    }
}
