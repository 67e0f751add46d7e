//! Extranonce handling: the connection-fixed `extranonce1` and the per-job
//! `extranonce2` counter, plus the allocator that keeps concurrent lanes on
//! disjoint counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// True when `value` is representable in `size` bytes.
#[inline]
pub fn fits(value: u64, size: usize) -> bool {
    size >= 8 || value >> (8 * size) == 0
}

/// Number of distinct extranonce2 values for a width, saturating at `u64::MAX`.
pub fn search_space(size: usize) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        1u64 << (8 * size)
    }
}

/// Encode an extranonce2 counter big-endian, left-padded with zeros to `size`.
pub fn encode_extranonce2(value: u64, size: usize) -> Result<Vec<u8>> {
    if !fits(value, size) {
        return Err(Error::Overflow { value, size });
    }

    let mut encoded = vec![0u8; size];
    let be = value.to_be_bytes();
    let take = size.min(be.len());
    encoded[size - take..].copy_from_slice(&be[be.len() - take..]);
    Ok(encoded)
}

/// Connection-scoped extranonce parameters from `mining.subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraNonce {
    #[serde(with = "hex_bytes")]
    pub extranonce1: Vec<u8>,
    pub extranonce2_size: usize,
}

impl ExtraNonce {
    pub fn new(extranonce1: Vec<u8>, extranonce2_size: usize) -> Self {
        ExtraNonce {
            extranonce1,
            extranonce2_size,
        }
    }

    pub fn from_hex(extranonce1: &str, extranonce2_size: usize) -> Result<Self> {
        let extranonce1 = hex::decode(extranonce1).map_err(Error::parse("extranonce1"))?;
        Ok(Self::new(extranonce1, extranonce2_size))
    }

    /// Encode an extranonce2 counter at this connection's width.
    pub fn extranonce2(&self, value: u64) -> Result<Vec<u8>> {
        encode_extranonce2(value, self.extranonce2_size)
    }

    /// Hex form used in `mining.submit`.
    pub fn extranonce2_hex(&self, value: u64) -> Result<String> {
        self.extranonce2(value).map(hex::encode)
    }

    /// Decode a submitted extranonce2 back to its counter value.
    pub fn parse_extranonce2(&self, hex_value: &str) -> Result<u64> {
        let bytes = hex::decode(hex_value).map_err(Error::parse("extranonce2"))?;
        if bytes.len() != self.extranonce2_size {
            return Err(Error::assembly(
                "extranonce2",
                self.extranonce2_size,
                bytes.len(),
            ));
        }

        let significant = bytes.iter().skip_while(|b| **b == 0).count();
        if significant > 8 {
            return Err(Error::Overflow {
                value: u64::MAX,
                size: self.extranonce2_size,
            });
        }

        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

/// Hands out extranonce2 counters for one job.
///
/// Shared by reference between lanes; each call to [`next`](Self::next)
/// returns a value no other lane has seen. Once the width is exhausted the
/// caller must wait for a new job.
#[derive(Debug)]
pub struct Extranonce2Allocator {
    size: usize,
    next: AtomicU64,
    limit: u64,
}

impl Extranonce2Allocator {
    pub fn new(size: usize) -> Self {
        Extranonce2Allocator {
            size,
            next: AtomicU64::new(0),
            limit: search_space(size),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Next unused counter, or `Overflow` once the width is exhausted.
    pub fn next(&self) -> Result<u64> {
        let limit = self.limit;
        let size = self.size;
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
                (value < limit).then(|| value + 1)
            })
            .map_err(|value| {
                tracing::warn!(size, "extranonce2 space exhausted");
                Error::Overflow { value, size }
            })
    }

    /// Split the remaining space into `lanes` disjoint ranges, one per lane.
    ///
    /// The allocator itself is left exhausted: every value now belongs to a
    /// range.
    pub fn partition(&self, lanes: usize) -> Vec<Extranonce2Range> {
        let start = self.next.swap(self.limit, Ordering::AcqRel).min(self.limit);
        let remaining = self.limit - start;
        let lanes = lanes.max(1) as u64;
        let chunk = remaining / lanes;
        let extra = remaining % lanes;

        let mut ranges = Vec::with_capacity(lanes as usize);
        let mut cursor = start;
        for lane in 0..lanes {
            let len = chunk + u64::from(lane < extra);
            ranges.push(Extranonce2Range {
                size: self.size,
                next: cursor,
                end: cursor + len,
            });
            cursor += len;
        }
        ranges
    }
}

/// A lane's private slice of the extranonce2 space, passed by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extranonce2Range {
    size: usize,
    next: u64,
    end: u64,
}

impl Extranonce2Range {
    pub fn remaining(&self) -> u64 {
        self.end - self.next
    }

    /// Next counter in this range, or `Overflow` when it is used up.
    pub fn next_value(&mut self) -> Result<u64> {
        if self.next >= self.end {
            return Err(Error::Overflow {
                value: self.end,
                size: self.size,
            });
        }
        let value = self.next;
        self.next += 1;
        Ok(value)
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
