//! Block header assembly from a Stratum job.
//!
//! Every field arrives big-endian on the wire and is laid out little-endian
//! in the header, except the previous-block hash, which only has its 32-bit
//! words swapped. The layout table below records the transform per field.

use crate::endian::FieldTransform;
use crate::error::{Error, Result};
use crate::hash::double_sha256;
use crate::job::StratumJob;
use crate::merkle::compute_root;

/// Serialized header length.
pub const HEADER_LEN: usize = 80;

/// Bytes covered by the midstate.
pub const HEAD_LEN: usize = 64;

/// Where one field lives in the header and how its wire value is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField {
    pub name: &'static str,
    pub offset: usize,
    pub len: usize,
    pub transform: FieldTransform,
}

impl HeaderField {
    const fn new(name: &'static str, offset: usize, len: usize, transform: FieldTransform) -> Self {
        HeaderField {
            name,
            offset,
            len,
            transform,
        }
    }

    /// Encode `wire` and write it at this field's position.
    pub fn write(&self, header: &mut [u8; HEADER_LEN], wire: &[u8]) -> Result<()> {
        let encoded = self.transform.apply(wire)?;
        if encoded.len() != self.len {
            return Err(Error::assembly(self.name, self.len, encoded.len()));
        }
        header[self.offset..self.offset + self.len].copy_from_slice(&encoded);
        Ok(())
    }

    /// Header bytes of this field, as laid out.
    pub fn slice<'a>(&self, header: &'a [u8; HEADER_LEN]) -> &'a [u8] {
        &header[self.offset..self.offset + self.len]
    }

    /// Recover the wire value. Both transforms are their own inverse.
    pub fn read(&self, header: &[u8; HEADER_LEN]) -> Result<Vec<u8>> {
        self.transform.apply(self.slice(header))
    }
}

pub const VERSION: HeaderField = HeaderField::new("version", 0, 4, FieldTransform::ByteReversed);
pub const PREV_HASH: HeaderField =
    HeaderField::new("prev_hash", 4, 32, FieldTransform::WordSwapped(4));
pub const MERKLE_ROOT: HeaderField =
    HeaderField::new("merkle_root", 36, 32, FieldTransform::ByteReversed);
pub const TIME: HeaderField = HeaderField::new("time", 68, 4, FieldTransform::ByteReversed);
pub const BITS: HeaderField = HeaderField::new("bits", 72, 4, FieldTransform::ByteReversed);
pub const NONCE: HeaderField = HeaderField::new("nonce", 76, 4, FieldTransform::ByteReversed);

/// Header fields in serialization order.
pub const HEADER_LAYOUT: [HeaderField; 6] = [VERSION, PREV_HASH, MERKLE_ROOT, TIME, BITS, NONCE];

/// A serialized 80-byte block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHeader([u8; HEADER_LEN]);

impl BlockHeader {
    /// Wrap already-serialized header bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        <[u8; HEADER_LEN]>::try_from(bytes)
            .map(BlockHeader)
            .map_err(|_| Error::assembly("header", HEADER_LEN, bytes.len()))
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.0
    }

    /// The 64 bytes the midstate compresses.
    pub fn head(&self) -> &[u8] {
        &self.0[..HEAD_LEN]
    }

    /// Merkle root tail, time, bits and nonce: the bytes after the midstate.
    pub fn tail(&self) -> [u8; HEADER_LEN - HEAD_LEN] {
        let mut tail = [0u8; HEADER_LEN - HEAD_LEN];
        tail.copy_from_slice(&self.0[HEAD_LEN..]);
        tail
    }

    pub fn version(&self) -> u32 {
        self.read_u32(&VERSION)
    }

    pub fn time(&self) -> u32 {
        self.read_u32(&TIME)
    }

    pub fn bits(&self) -> u32 {
        self.read_u32(&BITS)
    }

    pub fn nonce(&self) -> u32 {
        self.read_u32(&NONCE)
    }

    /// Same header with another nonce.
    pub fn with_nonce(&self, nonce: u32) -> Self {
        self.with_u32(&NONCE, nonce)
    }

    /// Same header with another version. Changes the midstate.
    pub fn with_version(&self, version: u32) -> Self {
        self.with_u32(&VERSION, version)
    }

    /// Same header with another time. Rolls the midstate tail only.
    pub fn with_time(&self, time: u32) -> Self {
        self.with_u32(&TIME, time)
    }

    /// Double SHA256 of the header, internal byte order.
    pub fn hash(&self) -> [u8; 32] {
        double_sha256(&self.0)
    }

    fn read_u32(&self, field: &HeaderField) -> u32 {
        let mut le = [0u8; 4];
        le.copy_from_slice(field.slice(&self.0));
        u32::from_le_bytes(le)
    }

    fn with_u32(&self, field: &HeaderField, value: u32) -> Self {
        let mut bytes = self.0;
        bytes[field.offset..field.offset + 4].copy_from_slice(&value.to_le_bytes());
        BlockHeader(bytes)
    }
}

impl TryFrom<&[u8]> for BlockHeader {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        BlockHeader::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for BlockHeader {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Next version inside `mask`: the masked bits count up as one integer,
/// bits outside the mask are kept. Wraps to zero masked bits.
pub fn roll_version(version: u32, mask: u32) -> u32 {
    if mask == 0 {
        return version;
    }
    let rolled = (version | !mask).wrapping_add(1) & mask;
    (version & !mask) | rolled
}

/// `count` versions starting at `version`, each rolled once from the last.
pub fn rolled_versions(version: u32, mask: u32, count: usize) -> Vec<u32> {
    std::iter::successors(Some(version), |v| Some(roll_version(*v, mask)))
        .take(count)
        .collect()
}

/// Lay out the header for `job` with the given coinbase hash and nonce.
///
/// The merkle root is folded from `coinbase_hash` and the job's branch; each
/// value then goes through its field's transform.
pub fn assemble(job: &StratumJob, coinbase_hash: &[u8], nonce: u32) -> Result<BlockHeader> {
    let coinbase_hash = <[u8; 32]>::try_from(coinbase_hash)
        .map_err(|_| Error::assembly("coinbase_hash", 32, coinbase_hash.len()))?;
    let merkle_root = compute_root(&coinbase_hash, &job.merkle_branches);

    let version = job.version.to_be_bytes();
    let time = job.time.to_be_bytes();
    let bits = job.bits.to_be_bytes();
    let nonce = nonce.to_be_bytes();
    let wire: [&[u8]; 6] = [&version, &job.prev_hash, &merkle_root, &time, &bits, &nonce];

    let mut bytes = [0u8; HEADER_LEN];
    for (field, value) in HEADER_LAYOUT.iter().zip(wire) {
        field.write(&mut bytes, value)?;
    }

    Ok(BlockHeader(bytes))
}
