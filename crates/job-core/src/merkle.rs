//! Merkle root computation from a Stratum merkle branch.
//!
//! A pool never sends the transaction list, only the siblings along the
//! coinbase's path to the root. Folding those siblings onto the coinbase hash
//! is all a miner needs, because only the coinbase changes between
//! extranonce2 values.

use crate::hash::{double_hash, HashPrimitive, Sha256};

/// Fold `siblings` onto `coinbase_hash`: `current = H(H(current || sibling))`.
///
/// Concatenation is always current first, sibling second, so sibling order
/// matters. With no siblings the root is the coinbase hash itself.
pub fn compute_root(coinbase_hash: &[u8; 32], siblings: &[[u8; 32]]) -> [u8; 32] {
    compute_root_with::<Sha256>(coinbase_hash, siblings)
}

/// [`compute_root`] over an arbitrary hash primitive.
pub fn compute_root_with<H: HashPrimitive>(
    coinbase_hash: &[u8; 32],
    siblings: &[[u8; 32]],
) -> [u8; 32] {
    siblings.iter().fold(*coinbase_hash, |current, sibling| {
        let mut combined = [0u8; 64];
        combined[..32].copy_from_slice(&current);
        combined[32..].copy_from_slice(sibling);
        double_hash::<H>(&combined)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::double_sha256;
    use proptest::prelude::*;

    fn hash32(s: &str) -> [u8; 32] {
        <[u8; 32]>::try_from(hex::decode(s).unwrap()).unwrap()
    }

    #[test]
    fn test_no_siblings_is_identity() {
        let coinbase = [0x42u8; 32];
        assert_eq!(compute_root(&coinbase, &[]), coinbase);
    }

    #[test]
    fn test_two_sibling_fold() {
        let h = [0x11u8; 32];
        let b1 = [0x22u8; 32];
        let b2 = [0x33u8; 32];

        let mut first = [0u8; 64];
        first[..32].copy_from_slice(&h);
        first[32..].copy_from_slice(&b1);
        let level1 = double_sha256(&first);

        let mut second = [0u8; 64];
        second[..32].copy_from_slice(&level1);
        second[32..].copy_from_slice(&b2);
        let expected = double_sha256(&second);

        assert_eq!(compute_root(&h, &[b1, b2]), expected);
    }

    #[test]
    fn test_sibling_order_matters() {
        let h = [0x11u8; 32];
        let b1 = [0x22u8; 32];
        let b2 = [0x33u8; 32];
        assert_ne!(compute_root(&h, &[b1, b2]), compute_root(&h, &[b2, b1]));
    }

    #[test]
    fn test_pool_branch() {
        let coinbase = hex::decode(
            "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff2503777d07062f503253482f0405b8c75208f800880e000000000b2f436f696e48756e74722f0000000001603f352a010000001976a914c633315d376c20a973a758f7422d67f7bfed9c5888ac00000000",
        )
        .unwrap();
        let siblings = [
            hash32("f0dbca1ee1a9f6388d07d97c1ab0de0e41acdf2edac4b95780ba0a1ec14103b3"),
            hash32("8e43fd2988ac40c5d97702b7e5ccdf5b06d58f0e0d323f74dd5082232c1aedf7"),
            hash32("1177601320ac928b8c145d771dae78a3901a089fa4aca8def01cbff747355818"),
            hash32("9f64f3b0d9edddb14be6f71c3ac2e80455916e207ffc003316c6a515452aa7b4"),
            hash32("2d0b54af60fad4ae59ec02031f661d026f2bb95e2eeb1e6657a35036c017c595"),
        ];

        let root = compute_root(&double_sha256(&coinbase), &siblings);
        assert_eq!(
            hex::encode(root),
            "5cc58f5e84aafc740d521b92a7bf72f4e56c4cc3ad1c2159f1d094f97ac34eee"
        );
    }

    proptest! {
        #[test]
        fn swapping_distinct_siblings_changes_root(
            h in any::<[u8; 32]>(),
            b1 in any::<[u8; 32]>(),
            b2 in any::<[u8; 32]>(),
        ) {
            prop_assume!(b1 != b2);
            prop_assert_ne!(compute_root(&h, &[b1, b2]), compute_root(&h, &[b2, b1]));
        }
    }
}
