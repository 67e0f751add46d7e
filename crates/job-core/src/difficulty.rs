//! Compact "nbits" decoding and 256-bit share targets.

use core::fmt;

use primitive_types::U256;

use crate::error::{Error, Result};

/// Compact bits of the difficulty-1 target.
pub const DIFF1_BITS: u32 = 0x1d00ffff;

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// A 256-bit unsigned target. A hash (display order, read big-endian) meets
/// the target when it is numerically less than or equal to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(U256);

impl Target {
    /// Every bit set: any hash meets it.
    pub const MAX: Target = Target(U256::MAX);

    /// Decode compact "bits": `[exponent (1 byte)][mantissa (3 bytes)]`,
    /// target = mantissa * 256^(exponent - 3).
    ///
    /// The mantissa's top bit is a sign in the compact-number convention;
    /// negative targets are rejected, as are targets wider than 256 bits.
    pub fn from_compact(bits: u32) -> Result<Self> {
        if bits & SIGN_BIT != 0 {
            return Err(Error::InvalidEncoding { bits });
        }

        let exponent = (bits >> 24) as usize;
        let mantissa = bits & MANTISSA_MASK;

        if mantissa == 0 {
            return Ok(Target(U256::zero()));
        }

        if exponent <= 3 {
            let value = mantissa >> (8 * (3 - exponent));
            return Ok(Target(U256::from(value)));
        }

        let shift = 8 * (exponent - 3);
        let mantissa_bits = (32 - mantissa.leading_zeros()) as usize;
        if mantissa_bits + shift > 256 {
            return Err(Error::InvalidEncoding { bits });
        }

        Ok(Target(U256::from(mantissa) << shift))
    }

    /// Share target for a pool difficulty (`mining.set_difficulty`):
    /// the difficulty-1 target divided by the difficulty.
    pub fn from_pool_difficulty(difficulty: u64) -> Result<Self> {
        if difficulty == 0 {
            return Err(Error::InvalidDifficulty(difficulty));
        }
        Ok(Target(diff1_target() / U256::from(difficulty)))
    }

    /// Build a target from a 32-byte big-endian integer.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Target(U256::from_big_endian(&bytes))
    }

    /// 32-byte big-endian representation.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_big_endian()
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    /// True when a hash in display order (big-endian) is at or below the target.
    #[inline]
    pub fn is_met_by(&self, display_hash: &[u8; 32]) -> bool {
        U256::from_big_endian(display_hash) <= self.0
    }
}

impl From<U256> for Target {
    fn from(value: U256) -> Self {
        Target(value)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_be_bytes()))
    }
}

/// Decode compact bits into a target. See [`Target::from_compact`].
pub fn decode(bits: u32) -> Result<Target> {
    Target::from_compact(bits)
}

fn diff1_target() -> U256 {
    U256::from(0xffffu64) << 208
}

/// Difficulty a hash (display order) achieved, relative to difficulty 1.
///
/// Approximate: both sides are reduced to `f64` before dividing.
pub fn difficulty_of(display_hash: &[u8; 32]) -> f64 {
    let hash = U256::from_big_endian(display_hash);
    if hash.is_zero() {
        return f64::INFINITY;
    }
    u256_to_f64(diff1_target()) / u256_to_f64(hash)
}

/// Calculate approximate network difficulty from bits.
pub fn bits_to_difficulty(bits: u32) -> Result<f64> {
    let target = Target::from_compact(bits)?;
    if target.0.is_zero() {
        return Ok(f64::INFINITY);
    }
    Ok(u256_to_f64(diff1_target()) / u256_to_f64(target.0))
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        format!("{:.2}K", difficulty / 1e3)
    } else {
        format!("{:.2}", difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reference_bits() {
        let target = decode(0x1705dd01).unwrap();
        // 0x05dd01 == 384257
        let expected = U256::from(0x05dd01u64) << 160;
        assert_eq!(target.as_u256(), expected);
        assert_eq!(U256::from(384_257u64) << 160, expected);
        assert_eq!(
            target.as_u256(),
            U256::from(0x05dd01u64) * U256::from(256u64).pow(U256::from(20u64))
        );
    }

    #[test]
    fn test_decode_genesis() {
        let target = decode(DIFF1_BITS).unwrap().to_be_bytes();

        // 00000000ffff0000...
        assert_eq!(&target[..4], &[0x00; 4]);
        assert_eq!(target[4], 0xff);
        assert_eq!(target[5], 0xff);
        for (i, byte) in target.iter().enumerate().skip(6) {
            assert_eq!(*byte, 0x00, "byte {} should be 0", i);
        }
    }

    #[test]
    fn test_decode_small_exponent() {
        assert_eq!(decode(0x01123456).unwrap().as_u256(), U256::from(0x12u64));
        assert_eq!(decode(0x02123456).unwrap().as_u256(), U256::from(0x1234u64));
        assert_eq!(decode(0x03123456).unwrap().as_u256(), U256::from(0x123456u64));
        assert_eq!(decode(0x00123456).unwrap().as_u256(), U256::zero());
    }

    #[test]
    fn test_decode_rejects_negative() {
        assert_eq!(decode(0x04923456), Err(Error::InvalidEncoding { bits: 0x04923456 }));
        assert!(decode(0x1d800000).is_err());
    }

    #[test]
    fn test_decode_rejects_overflow() {
        assert!(decode(0x2100ffff).is_ok());
        assert!(decode(0x21010000).is_err());
        assert!(decode(0xff123456).is_err());
        // A zero mantissa never overflows.
        assert_eq!(decode(0xff000000).unwrap().as_u256(), U256::zero());
    }

    #[test]
    fn test_target_comparison_is_inclusive() {
        let target = decode(DIFF1_BITS).unwrap();
        assert!(target.is_met_by(&target.to_be_bytes()));

        let mut above = target.to_be_bytes();
        above[31] = 0x01;
        assert!(!target.is_met_by(&above));

        let mut below = [0u8; 32];
        below[5] = 0x12;
        assert!(target.is_met_by(&below));

        assert!(Target::MAX.is_met_by(&[0xff; 32]));
    }

    #[test]
    fn test_pool_difficulty_target() {
        assert_eq!(
            Target::from_pool_difficulty(1).unwrap(),
            decode(DIFF1_BITS).unwrap()
        );
        assert_eq!(
            Target::from_pool_difficulty(256).unwrap().as_u256(),
            U256::from(0xffffu64) << 200
        );
        assert_eq!(Target::from_pool_difficulty(0), Err(Error::InvalidDifficulty(0)));
    }

    #[test]
    fn test_difficulty_calculation() {
        let genesis = bits_to_difficulty(DIFF1_BITS).unwrap();
        assert!((genesis - 1.0).abs() < 1e-9);

        let diff1 = decode(DIFF1_BITS).unwrap().to_be_bytes();
        assert!((difficulty_of(&diff1) - 1.0).abs() < 1e-9);
        assert_eq!(difficulty_of(&[0u8; 32]), f64::INFINITY);
    }

    #[test]
    fn test_format_difficulty() {
        assert_eq!(format_difficulty(1_500.0), "1.50K");
        assert_eq!(format_difficulty(2.0e12), "2.00T");
        assert_eq!(format_difficulty(12.0), "12.00");
    }
}
