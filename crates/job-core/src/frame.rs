//! Binary job frames for BM1397-family hashing chips, and the nonce
//! responses they send back.
//!
//! Frame layout:
//!
//! ```text
//! preamble(2) command(1) length(1)
//! job_id(1) midstate_count(1) starting_nonce(4) nbits(4) ntime(4) merkle4(4)
//! midstate slots (32 each)
//! crc16(2, big-endian)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::header::{BlockHeader, BITS, MERKLE_ROOT, TIME};
use crate::midstate::{Midstate, WordOrder};

/// Chip job ids live in 0..128 and step by 4; the low two bits of a returned
/// id carry the midstate index.
pub const CHIP_JOB_ID_STEP: u8 = 4;
pub const CHIP_JOB_ID_LIMIT: u8 = 128;

/// Midstate slots the chip's job packet has room for.
pub const MAX_MIDSTATE_SLOTS: usize = 4;

const MIDSTATE_LEN: usize = 32;
/// job_id, midstate_count, starting_nonce, nbits, ntime, merkle4.
const FIXED_PAYLOAD_LEN: usize = 18;

const RESPONSE_LEN: usize = 9;
const RESPONSE_PREAMBLE: [u8; 2] = [0xAA, 0x55];

/// Frame layout parameters. Defaults match the BM1397.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub preamble: [u8; 2],
    /// Job write command byte.
    pub command: u8,
    /// Midstate slots in every frame; unused slots are zero.
    pub midstate_slots: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            preamble: [0x55, 0xAA],
            command: 0x21,
            midstate_slots: MAX_MIDSTATE_SLOTS,
        }
    }
}

impl FrameConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_MIDSTATE_SLOTS).contains(&self.midstate_slots) {
            return Err(Error::Config(format!(
                "midstate_slots must be between 1 and {}, got {}",
                MAX_MIDSTATE_SLOTS, self.midstate_slots
            )));
        }
        Ok(())
    }

    /// Bytes between the length field and the CRC.
    pub fn payload_len(&self) -> usize {
        FIXED_PAYLOAD_LEN + MIDSTATE_LEN * self.midstate_slots
    }

    /// Total frame size on the wire.
    pub fn frame_len(&self) -> usize {
        self.payload_len() + 6
    }
}

/// Encode one job frame.
///
/// `midstates` holds one midstate per rolled version, first the job's own;
/// the count byte reports how many are live.
pub fn encode(
    config: &FrameConfig,
    chip_job_id: u8,
    header: &BlockHeader,
    midstates: &[Midstate],
) -> Result<Vec<u8>> {
    config.validate()?;
    if midstates.is_empty() || midstates.len() > config.midstate_slots {
        return Err(Error::assembly(
            "midstates",
            config.midstate_slots,
            midstates.len(),
        ));
    }

    let bytes = header.as_bytes();
    let payload_len = config.payload_len();

    let mut buf = Vec::with_capacity(config.frame_len());
    buf.extend_from_slice(&config.preamble);
    buf.push(config.command);
    buf.push((payload_len + 4) as u8);

    buf.push(chip_job_id);
    buf.push(midstates.len() as u8);
    buf.extend_from_slice(&[0u8; 4]);
    buf.extend_from_slice(BITS.slice(bytes));
    buf.extend_from_slice(TIME.slice(bytes));
    buf.extend_from_slice(&MERKLE_ROOT.slice(bytes)[28..]);

    for midstate in midstates {
        let mut wire = midstate.to_bytes(WordOrder::Little);
        wire.reverse();
        buf.extend_from_slice(&wire);
    }
    buf.resize(4 + payload_len, 0);

    let crc = crc16_false(&buf[2..]);
    buf.extend_from_slice(&crc.to_be_bytes());

    Ok(buf)
}

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection.
pub fn crc16_false(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |crc, byte| {
        (0..8).fold(crc ^ (u16::from(*byte) << 8), |crc, _| {
            if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            }
        })
    })
}

/// Chip job id sequence: 4, 8, ... 124, 0, 4, ...
#[derive(Debug, Clone, Default)]
pub struct ChipJobIds {
    last: u8,
}

impl ChipJobIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u8 {
        self.last = (self.last + CHIP_JOB_ID_STEP) % CHIP_JOB_ID_LIMIT;
        self.last
    }
}

/// A nonce reported by a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceResponse {
    pub nonce: u32,
    pub midstate_num: u8,
    /// Id the job was sent under.
    pub chip_job_id: u8,
    /// Which midstate (rolled version) produced the nonce.
    pub midstate_index: u8,
}

impl NonceResponse {
    /// Decode a 9-byte response: `AA 55`, nonce (LE), midstate_num, job_id, crc5.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RESPONSE_LEN {
            return Err(Error::assembly("nonce_response", RESPONSE_LEN, bytes.len()));
        }
        if bytes[..2] != RESPONSE_PREAMBLE {
            return Err(Error::Response("bad preamble"));
        }

        let nonce = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        let job_id = bytes[7];

        Ok(NonceResponse {
            nonce,
            midstate_num: bytes[6],
            chip_job_id: job_id & 0xfc,
            midstate_index: job_id & 0x03,
        })
    }
}
