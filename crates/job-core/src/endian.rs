//! Byte and word order conversions between the Stratum wire format and the
//! block header layout.

use crate::error::{Error, Result};

/// Reverse the byte order of a byte string.
///
/// Bitcoin displays hashes byte-reversed, and every integer that arrives as
/// big-endian hex lands in the header little-endian.
pub fn reverse_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

/// Reverse a 32-byte array in place of a copy.
#[inline]
pub fn reverse_hash(hash: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *hash;
    reversed.reverse();
    reversed
}

/// Reverse the bytes inside every `word_size` word, keeping word order.
///
/// Stratum transmits `prevhash` as eight big-endian 32-bit words; swapping
/// each word yields the header's previous-hash field.
pub fn swap_words(bytes: &[u8], word_size: usize) -> Result<Vec<u8>> {
    if word_size == 0 || bytes.len() % word_size != 0 {
        return Err(Error::Alignment {
            len: bytes.len(),
            word_size,
        });
    }

    let mut swapped = Vec::with_capacity(bytes.len());
    for word in bytes.chunks_exact(word_size) {
        swapped.extend(word.iter().rev());
    }

    Ok(swapped)
}

/// How a wire value becomes header bytes.
///
/// Each header field carries one of these so the prevhash/merkle asymmetry is
/// stated in the layout table instead of at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTransform {
    /// The whole value is reversed (big-endian wire integer to little-endian).
    ByteReversed,
    /// Each word of the given size is reversed; word order is preserved.
    WordSwapped(usize),
}

impl FieldTransform {
    /// Apply the transform to a wire value.
    pub fn apply(self, wire: &[u8]) -> Result<Vec<u8>> {
        match self {
            FieldTransform::ByteReversed => Ok(reverse_bytes(wire)),
            FieldTransform::WordSwapped(word_size) => swap_words(wire, word_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_swap_words() {
        let input = hex::decode("0102030405060708").unwrap();
        let swapped = swap_words(&input, 4).unwrap();
        assert_eq!(hex::encode(&swapped), "0403020108070605");
        assert_eq!(swap_words(&swapped, 4).unwrap(), input);
    }

    #[test]
    fn test_swap_words_prevhash() {
        // prevhash from a mining.notify and its header layout
        let wire =
            hex::decode("bf44fd3513dc7b837d60e5c628b572b448d204a8000007490000000000000000")
                .unwrap();
        let header = swap_words(&wire, 4).unwrap();
        assert_eq!(
            hex::encode(header),
            "35fd44bf837bdc13c6e5607db472b528a804d248490700000000000000000000"
        );
    }

    #[test]
    fn test_swap_words_misaligned() {
        let err = swap_words(&[1, 2, 3, 4, 5], 4).unwrap_err();
        assert_eq!(err, Error::Alignment { len: 5, word_size: 4 });

        assert!(swap_words(&[1, 2], 0).is_err());
    }

    #[test]
    fn test_swap_words_empty() {
        assert_eq!(swap_words(&[], 4).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_reverse_bytes() {
        assert_eq!(reverse_bytes(&[0x17, 0x05, 0xdd, 0x01]), vec![0x01, 0xdd, 0x05, 0x17]);

        let mut hash = [0u8; 32];
        hash[0] = 0x01;
        hash[31] = 0x20;
        let reversed = reverse_hash(&hash);
        assert_eq!(reversed[0], 0x20);
        assert_eq!(reversed[31], 0x01);
    }

    #[test]
    fn test_field_transform() {
        let wire = [0x20, 0x00, 0x00, 0x04, 0xaa, 0xbb, 0xcc, 0xdd];
        assert_eq!(
            FieldTransform::ByteReversed.apply(&wire).unwrap(),
            vec![0xdd, 0xcc, 0xbb, 0xaa, 0x04, 0x00, 0x00, 0x20]
        );
        assert_eq!(
            FieldTransform::WordSwapped(4).apply(&wire).unwrap(),
            vec![0x04, 0x00, 0x00, 0x20, 0xdd, 0xcc, 0xbb, 0xaa]
        );
    }

    proptest! {
        #[test]
        fn swap_words_is_an_involution(words in prop::collection::vec(any::<[u8; 4]>(), 0..32)) {
            let bytes: Vec<u8> = words.concat();
            let twice = swap_words(&swap_words(&bytes, 4).unwrap(), 4).unwrap();
            prop_assert_eq!(twice, bytes);
        }
    }
}
