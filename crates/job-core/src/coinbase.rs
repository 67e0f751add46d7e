//! Coinbase transaction assembly from Stratum job fragments.
//!
//! The pool splits the coinbase around the extranonce fields: the miner only
//! splices `extranonce1 || extranonce2` between `coinb1` and `coinb2`.

use crate::error::Result;
use crate::extranonce::{encode_extranonce2, ExtraNonce};
use crate::hash::double_sha256;

/// Concatenate `prefix || extranonce1 || extranonce2 || suffix`.
///
/// `extranonce2` is encoded big-endian and zero-padded on the left to
/// `extranonce2_size`; a counter wider than that is an `Overflow`.
pub fn assemble(
    prefix: &[u8],
    extranonce1: &[u8],
    extranonce2: u64,
    extranonce2_size: usize,
    suffix: &[u8],
) -> Result<Vec<u8>> {
    let extranonce2 = encode_extranonce2(extranonce2, extranonce2_size)?;

    let mut raw =
        Vec::with_capacity(prefix.len() + extranonce1.len() + extranonce2.len() + suffix.len());
    raw.extend_from_slice(prefix);
    raw.extend_from_slice(extranonce1);
    raw.extend_from_slice(&extranonce2);
    raw.extend_from_slice(suffix);

    Ok(raw)
}

/// Builder for the coinbase of one job.
#[derive(Debug, Clone)]
pub struct CoinbaseBuilder<'a> {
    /// `coinb1` from the job.
    prefix: &'a [u8],
    /// `coinb2` from the job.
    suffix: &'a [u8],
}

impl<'a> CoinbaseBuilder<'a> {
    pub fn new(prefix: &'a [u8], suffix: &'a [u8]) -> Self {
        CoinbaseBuilder { prefix, suffix }
    }

    /// Build the coinbase for one extranonce2 counter.
    pub fn build(&self, extranonce: &ExtraNonce, extranonce2: u64) -> Result<CoinbaseTransaction> {
        let raw = assemble(
            self.prefix,
            &extranonce.extranonce1,
            extranonce2,
            extranonce.extranonce2_size,
            self.suffix,
        )?;
        let hash = double_sha256(&raw);

        Ok(CoinbaseTransaction { raw, hash })
    }
}

/// A constructed coinbase transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseTransaction {
    /// Serialized transaction as the pool will see it.
    pub raw: Vec<u8>,
    /// Double SHA256 of `raw`; the merkle leaf.
    pub hash: [u8; 32],
}
