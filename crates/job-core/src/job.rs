//! Stratum job and share types, in wire form and in typed form.

use serde::{
    de::{self, Deserializer},
    ser::{SerializeSeq, Serializer},
    Deserialize, Serialize,
};

use crate::error::{Error, Result};
use crate::extranonce::ExtraNonce;

/// `mining.notify` params exactly as the pool sends them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notify {
    pub job_id: String,
    pub prevhash: String,
    pub coinb1: String,
    pub coinb2: String,
    pub merkle_branches: Vec<String>,
    pub version: String,
    pub nbits: String,
    pub ntime: String,
    pub clean_jobs: bool,
}

impl Serialize for Notify {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(9))?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.prevhash)?;
        seq.serialize_element(&self.coinb1)?;
        seq.serialize_element(&self.coinb2)?;
        seq.serialize_element(&self.merkle_branches)?;
        seq.serialize_element(&self.version)?;
        seq.serialize_element(&self.nbits)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.clean_jobs)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Notify {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (job_id, prevhash, coinb1, coinb2, merkle_branches, version, nbits, ntime, clean_jobs) =
            <(
                String,
                String,
                String,
                String,
                Vec<String>,
                String,
                String,
                String,
                bool,
            )>::deserialize(deserializer)?;

        Ok(Notify {
            job_id,
            prevhash,
            coinb1,
            coinb2,
            merkle_branches,
            version,
            nbits,
            ntime,
            clean_jobs,
        })
    }
}

/// A decoded job. Immutable once built; the next job supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratumJob {
    pub job_id: String,
    /// Previous block hash in wire order (big-endian 32-bit words).
    pub prev_hash: [u8; 32],
    pub coinbase_prefix: Vec<u8>,
    pub coinbase_suffix: Vec<u8>,
    /// Merkle siblings in issuer order.
    pub merkle_branches: Vec<[u8; 32]>,
    pub version: u32,
    pub bits: u32,
    pub time: u32,
    /// Discard all earlier work for this connection.
    pub clean_jobs: bool,
}

impl TryFrom<&Notify> for StratumJob {
    type Error = Error;

    fn try_from(notify: &Notify) -> Result<Self> {
        let merkle_branches = notify
            .merkle_branches
            .iter()
            .map(|branch| decode_fixed::<32>("merkle_branch", branch))
            .collect::<Result<Vec<_>>>()?;

        Ok(StratumJob {
            job_id: notify.job_id.clone(),
            prev_hash: decode_fixed("prevhash", &notify.prevhash)?,
            coinbase_prefix: hex::decode(&notify.coinb1).map_err(Error::parse("coinb1"))?,
            coinbase_suffix: hex::decode(&notify.coinb2).map_err(Error::parse("coinb2"))?,
            merkle_branches,
            version: decode_u32("version", &notify.version)?,
            bits: decode_u32("nbits", &notify.nbits)?,
            time: decode_u32("ntime", &notify.ntime)?,
            clean_jobs: notify.clean_jobs,
        })
    }
}

impl TryFrom<Notify> for StratumJob {
    type Error = Error;

    fn try_from(notify: Notify) -> Result<Self> {
        StratumJob::try_from(&notify)
    }
}

impl From<&StratumJob> for Notify {
    fn from(job: &StratumJob) -> Self {
        Notify {
            job_id: job.job_id.clone(),
            prevhash: hex::encode(job.prev_hash),
            coinb1: hex::encode(&job.coinbase_prefix),
            coinb2: hex::encode(&job.coinbase_suffix),
            merkle_branches: job.merkle_branches.iter().map(hex::encode).collect(),
            version: format!("{:08x}", job.version),
            nbits: format!("{:08x}", job.bits),
            ntime: format!("{:08x}", job.time),
            clean_jobs: job.clean_jobs,
        }
    }
}

/// Decode hex into exactly `N` bytes.
pub(crate) fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(value).map_err(Error::parse(field))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| Error::assembly(field, N, bytes.len()))
}

/// Decode an 8-character big-endian hex integer.
pub(crate) fn decode_u32(field: &'static str, value: &str) -> Result<u32> {
    decode_fixed::<4>(field, value).map(u32::from_be_bytes)
}

/// One candidate solution found by a lane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Share {
    pub job_id: String,
    pub extranonce2: u64,
    pub ntime: u32,
    pub nonce: u32,
    /// Rolled version XOR the job version, when version rolling is on.
    pub version_bits: Option<u32>,
}

impl Share {
    /// Recover a share from submitted params.
    pub fn from_submit(submit: &Submit, extranonce: &ExtraNonce) -> Result<Self> {
        Ok(Share {
            job_id: submit.job_id.clone(),
            extranonce2: extranonce.parse_extranonce2(&submit.extranonce2)?,
            ntime: decode_u32("ntime", &submit.ntime)?,
            nonce: decode_u32("nonce", &submit.nonce)?,
            version_bits: submit
                .version_bits
                .as_deref()
                .map(|bits| decode_u32("version_bits", bits))
                .transpose()?,
        })
    }

    /// Header version this share was found under.
    pub fn version(&self, job_version: u32) -> u32 {
        job_version ^ self.version_bits.unwrap_or(0)
    }
}

/// `mining.submit` params: `[worker, job_id, extranonce2, ntime, nonce]`,
/// plus `version_bits` when version rolling is negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub worker: String,
    pub job_id: String,
    pub extranonce2: String,
    pub ntime: String,
    pub nonce: String,
    pub version_bits: Option<String>,
}

impl Submit {
    pub fn new(worker: &str, share: &Share, extranonce: &ExtraNonce) -> Result<Self> {
        Ok(Submit {
            worker: worker.to_string(),
            job_id: share.job_id.clone(),
            extranonce2: extranonce.extranonce2_hex(share.extranonce2)?,
            ntime: format!("{:08x}", share.ntime),
            nonce: format!("{:08x}", share.nonce),
            version_bits: share.version_bits.map(|bits| format!("{:08x}", bits)),
        })
    }
}

impl Serialize for Submit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = 5 + usize::from(self.version_bits.is_some());
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.worker)?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.extranonce2)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.nonce)?;
        if let Some(version_bits) = &self.version_bits {
            seq.serialize_element(version_bits)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Submit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut params = Vec::<String>::deserialize(deserializer)?;
        let version_bits = match params.len() {
            5 => None,
            6 => params.pop(),
            len => {
                return Err(<D::Error as de::Error>::invalid_length(
                    len,
                    &"5 or 6 submit params",
                ))
            }
        };
        let [worker, job_id, extranonce2, ntime, nonce]: [String; 5] = params
            .try_into()
            .map_err(|params: Vec<String>| {
                <D::Error as de::Error>::invalid_length(params.len(), &"5 submit params")
            })?;

        Ok(Submit {
            worker,
            job_id,
            extranonce2,
            ntime,
            nonce,
            version_bits,
        })
    }
}
