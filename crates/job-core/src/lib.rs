//! Stratum job pipeline for ASIC miners.
//!
//! This crate turns pool work into chip work and back:
//! - `mining.notify` decoding into typed jobs
//! - Coinbase, merkle root and 80-byte header assembly
//! - SHA256 midstates and BM1397 job frames
//! - Share validation against compact and pool-difficulty targets
//! - Extranonce2 allocation and stale-work tracking across lanes

pub mod coinbase;
pub mod config;
pub mod difficulty;
pub mod endian;
pub mod error;
pub mod extranonce;
pub mod frame;
pub mod hash;
pub mod header;
pub mod job;
pub mod merkle;
pub mod midstate;
pub mod pipeline;
pub mod search;
pub mod share;

pub use coinbase::{CoinbaseBuilder, CoinbaseTransaction};
pub use config::PipelineConfig;
pub use difficulty::Target;
pub use error::{Error, Result};
pub use extranonce::{ExtraNonce, Extranonce2Allocator, Extranonce2Range};
pub use frame::{ChipJobIds, FrameConfig, NonceResponse};
pub use hash::{double_sha256, HashPrimitive, Sha256};
pub use header::{BlockHeader, HeaderField, HEADER_LAYOUT};
pub use job::{Notify, Share, StratumJob, Submit};
pub use merkle::compute_root;
pub use midstate::{Midstate, WordOrder};
pub use pipeline::{JobPipeline, PreparedWork};
pub use search::{search, NonceRange, SearchResult};
pub use share::{validate, Validation, WorkBoard, WorkTicket};
