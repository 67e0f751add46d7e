//! Browser-side miner driving the job pipeline.
//!
//! The page owns the pool connection and feeds `mining.notify` and
//! `mining.set_difficulty` here; this side prepares work, searches nonces in
//! software or encodes frames for an attached chip, and renders submissions.

use stratum_job_core::{
    search::{search, NonceRange},
    Error, JobPipeline, Notify, PipelineConfig, PreparedWork, Share,
};
use wasm_bindgen::prelude::*;

use crate::state::{BatchInfo, MiningStats, ShareInfo, WorkInfo};

/// The main mining controller.
#[wasm_bindgen]
pub struct Miner {
    /// Worker name used in `mining.submit`.
    worker: String,
    pipeline: JobPipeline,
    /// Work being searched in software, with the nonces still to try.
    work: Option<(PreparedWork, NonceRange)>,
    stats: MiningStats,
    /// Start time of mining.
    start_time: f64,
    is_mining: bool,
}

#[wasm_bindgen]
impl Miner {
    /// Create a miner for one pool connection.
    ///
    /// # Arguments
    /// * `worker` - Worker name for share submission
    /// * `extranonce1` - Hex `extranonce1` from `mining.subscribe`
    /// * `config` - Optional `PipelineConfig` object; missing fields use defaults
    #[wasm_bindgen(constructor)]
    pub fn new(worker: &str, extranonce1: &str, config: JsValue) -> Result<Miner, JsValue> {
        let config: PipelineConfig = if config.is_undefined() || config.is_null() {
            PipelineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };

        let extranonce1 =
            hex::decode(extranonce1).map_err(|_| JsValue::from_str("Invalid extranonce1 hex"))?;
        let pipeline = JobPipeline::new(config, extranonce1).map_err(js_error)?;

        Ok(Miner {
            worker: worker.to_string(),
            pipeline,
            work: None,
            stats: MiningStats::new(),
            start_time: 0.0,
            is_mining: false,
        })
    }

    /// Accept `mining.notify` params as a JSON array.
    #[wasm_bindgen]
    pub fn on_notify(&mut self, params: &str) -> Result<(), JsValue> {
        let notify: Notify = serde_json::from_str(params)
            .map_err(|e| JsValue::from_str(&format!("Invalid notify params: {}", e)))?;

        self.pipeline.on_notify(&notify).map_err(js_error)?;
        self.stats.jobs_received += 1;
        if notify.clean_jobs {
            self.work = None;
        }
        Ok(())
    }

    /// `mining.set_difficulty`.
    #[wasm_bindgen]
    pub fn set_difficulty(&mut self, difficulty: f64) -> Result<(), JsValue> {
        let difficulty = pool_difficulty(difficulty).map_err(JsValue::from_str)?;
        self.pipeline.set_difficulty(difficulty).map_err(js_error)
    }

    /// `mining.set_version_mask`, as a hex string.
    #[wasm_bindgen]
    pub fn set_version_mask(&mut self, mask: &str) -> Result<(), JsValue> {
        let mask = u32::from_str_radix(mask, 16)
            .map_err(|_| JsValue::from_str("Invalid version mask hex"))?;
        self.pipeline.set_version_mask(mask);
        Ok(())
    }

    /// Prepare fresh work for software search and describe it.
    #[wasm_bindgen]
    pub fn prepare_work(&mut self) -> Result<JsValue, JsValue> {
        let work = self.pipeline.prepare().map_err(js_error)?;
        let info = self.work_info(&work, None)?;
        self.work = Some((work, NonceRange::full()));
        info.to_js()
    }

    /// Prepare work and encode it as a chip job frame.
    #[wasm_bindgen]
    pub fn dispatch_work(&mut self) -> Result<JsValue, JsValue> {
        let work = self.pipeline.prepare().map_err(js_error)?;
        let frame = self.pipeline.dispatch(work.clone()).map_err(js_error)?;
        self.work_info(&work, Some(&frame))?.to_js()
    }

    /// Decode a chip nonce response (hex) and check the share it carries.
    #[wasm_bindgen]
    pub fn on_nonce(&mut self, response: &str) -> Result<JsValue, JsValue> {
        let response =
            hex::decode(response).map_err(|_| JsValue::from_str("Invalid response hex"))?;
        let share = self.pipeline.on_nonce(&response).map_err(|e| self.stale(e))?;
        self.check(&share)?.to_js()
    }

    /// Search a batch of nonces on the current work.
    ///
    /// # Arguments
    /// * `batch_size` - Number of nonces to try in this batch
    #[wasm_bindgen]
    pub fn mine_batch(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        if self.work.as_ref().map_or(true, |(_, range)| range.is_empty()) {
            let work = self.pipeline.prepare().map_err(js_error)?;
            self.work = Some((work, NonceRange::full()));
        }
        let (work, range) = self
            .work
            .as_mut()
            .ok_or_else(|| JsValue::from_str("No work prepared"))?;

        let batch = range.take_batch(u64::from(batch_size));
        let result = search(work, batch);
        if let Some(found) = &result.found {
            range.resume_after(found.nonce);
        }
        let remaining = range.len();
        let share = match result.found {
            Some(found) => Some(work.share(found.nonce, 0).map_err(js_error)?),
            None => None,
        };

        self.stats.total_hashes += result.hashes_computed;
        if self.start_time > 0.0 {
            self.stats.elapsed_ms = js_sys::Date::now() - self.start_time;
            self.stats.update_hash_rate();
        }

        let share = match share {
            Some(share) => Some(self.check(&share)?),
            None => None,
        };

        BatchInfo {
            hashes_computed: result.hashes_computed,
            remaining,
            share,
        }
        .to_js()
    }

    /// Start mining.
    #[wasm_bindgen]
    pub fn start_mining(&mut self) {
        self.is_mining = true;
        self.start_time = js_sys::Date::now();
    }

    /// Stop mining.
    #[wasm_bindgen]
    pub fn stop_mining(&mut self) {
        self.is_mining = false;
    }

    #[wasm_bindgen(getter)]
    pub fn is_mining(&self) -> bool {
        self.is_mining
    }

    #[wasm_bindgen]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.stats.to_js()
    }

    #[wasm_bindgen]
    pub fn get_hash_rate_display(&self) -> String {
        self.stats.format_hash_rate()
    }

    /// Current share target as big-endian hex.
    #[wasm_bindgen(getter)]
    pub fn target(&self) -> String {
        self.pipeline.target().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn worker(&self) -> String {
        self.worker.clone()
    }

    /// Drop current work and statistics.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.work = None;
        self.stats = MiningStats::new();
        self.start_time = 0.0;
        self.is_mining = false;
    }
}

impl Miner {
    fn work_info(&self, work: &PreparedWork, frame: Option<&[u8]>) -> Result<WorkInfo, JsValue> {
        let extranonce2 = self
            .pipeline
            .extranonce()
            .extranonce2_hex(work.extranonce2)
            .map_err(js_error)?;
        Ok(WorkInfo::new(work, extranonce2, frame))
    }

    /// Validate a share, count it and render its submission.
    fn check(&mut self, share: &Share) -> Result<ShareInfo, JsValue> {
        let validation = self.pipeline.check_share(share).map_err(|e| self.stale(e))?;
        self.stats.record(&validation);

        let submit = if validation.accepted {
            let submit = self
                .pipeline
                .submission(&self.worker, share)
                .map_err(js_error)?;
            if validation.block {
                console_log(&format!("block found, nonce {:08x}", share.nonce));
            } else {
                console_log(&format!("share accepted, nonce {:08x}", share.nonce));
            }
            Some(submit)
        } else {
            None
        };

        Ok(ShareInfo::new(share, &validation, submit.as_ref()))
    }

    fn stale(&mut self, error: Error) -> JsValue {
        if matches!(error, Error::StaleWork { .. }) {
            self.stats.shares_stale = self.pipeline.board().stale_count();
        }
        js_error(error)
    }
}

/// Whole pool difficulty from a JS number. Fractions are refused rather than
/// rounded down to an easier target.
fn pool_difficulty(difficulty: f64) -> Result<u64, &'static str> {
    if !difficulty.is_finite() || difficulty < 1.0 {
        return Err("Difficulty must be at least 1");
    }
    if difficulty.fract() != 0.0 {
        return Err("Difficulty must be a whole number");
    }
    if difficulty >= u64::MAX as f64 {
        return Err("Difficulty is too large");
    }
    Ok(difficulty as u64)
}

fn js_error(error: Error) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Log to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}
