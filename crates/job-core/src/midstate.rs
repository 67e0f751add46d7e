//! SHA-256 midstate of the first header chunk.
//!
//! The first 64 header bytes never change while a lane searches nonces, so
//! hardware is handed the compression state after that chunk and only
//! hashes the remaining 16 bytes per nonce.

use sha2::{
    compress256,
    digest::generic_array::{typenum::U64, GenericArray},
};

use crate::header::{BlockHeader, HEADER_LEN, HEAD_LEN};

const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Byte order used when serializing the eight state words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    Little,
    Big,
}

/// SHA-256 working registers after compressing header bytes 0..64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Midstate {
    pub state: [u32; 8],
}

impl Midstate {
    pub fn compute(header: &BlockHeader) -> Self {
        let mut state = SHA256_IV;
        let block = GenericArray::<u8, U64>::clone_from_slice(header.head());
        compress256(&mut state, std::slice::from_ref(&block));
        Midstate { state }
    }

    pub fn to_bytes(&self, order: WordOrder) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.state) {
            let bytes = match order {
                WordOrder::Little => word.to_le_bytes(),
                WordOrder::Big => word.to_be_bytes(),
            };
            chunk.copy_from_slice(&bytes);
        }
        out
    }

    /// Hash the last 16 header bytes from this state and apply the second
    /// SHA-256. Equals `double_sha256` of the full header.
    pub fn finish(&self, tail: &[u8; HEADER_LEN - HEAD_LEN]) -> [u8; 32] {
        let mut block1 = GenericArray::<u8, U64>::default();
        block1[..16].copy_from_slice(tail);
        block1[16] = 0x80;
        block1[56..64].copy_from_slice(&((HEADER_LEN as u64) * 8).to_be_bytes());

        let mut first = self.state;
        compress256(&mut first, std::slice::from_ref(&block1));

        let mut block2 = GenericArray::<u8, U64>::default();
        for (chunk, word) in block2[..32].chunks_exact_mut(4).zip(first) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        block2[32] = 0x80;
        block2[56..64].copy_from_slice(&256u64.to_be_bytes());

        let mut second = SHA256_IV;
        compress256(&mut second, std::slice::from_ref(&block2));

        Midstate { state: second }.to_bytes(WordOrder::Big)
    }
}
