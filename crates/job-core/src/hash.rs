//! Double hashing over an injected hash primitive.

use sha2::Digest;

/// A 256-bit hash function the pipeline can double.
///
/// SHA-256 is the only primitive Bitcoin uses, but keeping it behind a trait
/// lets the merkle fold and the share check be exercised with other digests.
pub trait HashPrimitive {
    fn digest(data: &[u8]) -> [u8; 32];
}

/// SHA-256 from the `sha2` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256;

impl HashPrimitive for Sha256 {
    #[inline]
    fn digest(data: &[u8]) -> [u8; 32] {
        sha2::Sha256::digest(data).into()
    }
}

/// Apply `H` to the input, then to the first digest.
#[inline]
pub fn double_hash<H: HashPrimitive>(data: &[u8]) -> [u8; 32] {
    H::digest(&H::digest(data))
}

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// This is used for coinbase hashing, merkle folding and header hashing.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    double_hash::<Sha256>(data)
}

/// Single SHA256 hash.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// XOR-folds the input; good enough to show the primitive is injected.
    struct Fold;

    impl HashPrimitive for Fold {
        fn digest(data: &[u8]) -> [u8; 32] {
            let mut out = [0u8; 32];
            for (i, byte) in data.iter().enumerate() {
                out[i % 32] ^= byte.wrapping_add(1);
            }
            out
        }
    }

    #[test]
    fn test_double_sha256() {
        // Test vector: SHA256d("hello")
        let hash = double_sha256(b"hello");
        let expected =
            hex::decode("9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50")
                .unwrap();

        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_double_hash_applies_twice() {
        assert_eq!(double_sha256(b"abc"), sha256(&sha256(b"abc")));

        let data = [0x01u8, 0x02, 0x03];
        assert_eq!(double_hash::<Fold>(&data), Fold::digest(&Fold::digest(&data)));
        assert_ne!(double_hash::<Fold>(&data), double_sha256(&data));
    }
}
