//! Error types shared by every stage of the pipeline.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong between a job notification and a share check.
///
/// None of these are fatal: the caller recovers by requesting a new job,
/// issuing a new extranonce2 or dropping stale work.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed hex on the wire (odd length or non-hex characters).
    #[error("invalid hex in {field}: {source}")]
    Parse {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    /// Word swap input is not a whole number of words.
    #[error("length {len} is not a multiple of the {word_size}-byte word size")]
    Alignment { len: usize, word_size: usize },

    /// A header input does not have the length its type requires.
    #[error("{field} must be {expected} bytes, got {actual}")]
    Assembly {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The extranonce2 counter does not fit the configured width.
    #[error("extranonce2 {value:#x} does not fit in {size} bytes")]
    Overflow { value: u64, size: usize },

    /// Compact difficulty bits that decode to a negative or oversized target.
    #[error("invalid compact target encoding {bits:#010x}")]
    InvalidEncoding { bits: u32 },

    /// Pool difficulty that cannot be turned into a target.
    #[error("invalid pool difficulty {0}")]
    InvalidDifficulty(u64),

    /// Share references a superseded job or predates a clean-work signal.
    #[error("stale work for job {job_id}")]
    StaleWork { job_id: String },

    /// A chip response frame that cannot be decoded.
    #[error("invalid ASIC response: {0}")]
    Response(&'static str),

    /// A chip reported a nonce it already reported for the same job.
    #[error("duplicate nonce {nonce:#010x} for chip job {chip_job_id}")]
    DuplicateNonce { nonce: u32, chip_job_id: u8 },

    /// Work was requested before any job arrived.
    #[error("no job has been received yet")]
    NoJob,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn parse(field: &'static str) -> impl FnOnce(hex::FromHexError) -> Self {
        move |source| Error::Parse { field, source }
    }

    pub(crate) fn assembly(field: &'static str, expected: usize, actual: usize) -> Self {
        Error::Assembly {
            field,
            expected,
            actual,
        }
    }
}
