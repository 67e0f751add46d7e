//! Statistics and result objects handed to JavaScript.

use serde::{Deserialize, Serialize};
use stratum_job_core::{
    difficulty::format_difficulty, PreparedWork, Share, Submit, Validation, WordOrder,
};
use wasm_bindgen::prelude::*;

/// Mining statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiningStats {
    /// Total hashes computed by software search.
    pub total_hashes: u64,
    /// Current hash rate (hashes per second).
    pub hash_rate: f64,
    pub jobs_received: u32,
    pub shares_accepted: u32,
    /// Shares whose hash missed the share target.
    pub shares_rejected: u32,
    /// Shares dropped because their job was retired.
    pub shares_stale: u64,
    /// Shares that also met the network target.
    pub blocks_found: u32,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
    /// Highest share difficulty seen.
    pub best_difficulty: f64,
    /// Hash of the best share (display format).
    pub best_hash: Option<String>,
}

impl MiningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update hash rate based on elapsed time.
    pub fn update_hash_rate(&mut self) {
        if self.elapsed_ms > 0.0 {
            self.hash_rate = (self.total_hashes as f64) / (self.elapsed_ms / 1000.0);
        }
    }

    /// Count a checked share and track the best one.
    pub fn record(&mut self, validation: &Validation) {
        if !validation.accepted {
            self.shares_rejected += 1;
            return;
        }
        self.shares_accepted += 1;
        if validation.block {
            self.blocks_found += 1;
        }

        let difficulty = validation.difficulty();
        if difficulty > self.best_difficulty {
            self.best_difficulty = difficulty;
            self.best_hash = Some(validation.hash_hex());
        }
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", self.hash_rate / 1_000_000_000.0)
        } else if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }

    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Prepared work for display or for an external search lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkInfo {
    pub job_id: String,
    pub extranonce2: String,
    /// Header template, nonce zero.
    pub header: String,
    /// One per rolled version, little-endian words.
    pub midstates: Vec<String>,
    /// Share target, big-endian.
    pub target: String,
    /// BM1397 job frame, when the work was dispatched.
    pub frame: Option<String>,
}

impl WorkInfo {
    pub fn new(work: &PreparedWork, extranonce2: String, frame: Option<&[u8]>) -> Self {
        WorkInfo {
            job_id: work.ticket.job_id.clone(),
            extranonce2,
            header: hex::encode(work.header.as_bytes()),
            midstates: work
                .midstates
                .iter()
                .map(|m| hex::encode(m.to_bytes(WordOrder::Little)))
                .collect(),
            target: work.target.to_string(),
            frame: frame.map(hex::encode),
        }
    }

    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// A share found by search or reported by a chip, with its check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareInfo {
    pub job_id: String,
    pub nonce: u32,
    pub accepted: bool,
    /// Meets the network target: a block candidate.
    pub block: bool,
    pub hash: String,
    pub difficulty: f64,
    pub difficulty_display: String,
    /// `mining.submit` params as JSON, for accepted shares.
    pub submit: Option<String>,
}

impl ShareInfo {
    pub fn new(share: &Share, validation: &Validation, submit: Option<&Submit>) -> Self {
        let difficulty = validation.difficulty();
        ShareInfo {
            job_id: share.job_id.clone(),
            nonce: share.nonce,
            accepted: validation.accepted,
            block: validation.block,
            hash: validation.hash_hex(),
            difficulty,
            difficulty_display: format_difficulty(difficulty),
            submit: submit.and_then(|submit| serde_json::to_string(submit).ok()),
        }
    }

    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Result of one software search batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchInfo {
    pub hashes_computed: u64,
    /// Nonces left in the current work.
    pub remaining: u64,
    pub share: Option<ShareInfo>,
}

impl BatchInfo {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
}
