//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::FrameConfig;

/// Widest extranonce2 the pool may assign.
pub const MAX_EXTRANONCE2_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `extranonce2_size` from `mining.subscribe`.
    pub extranonce2_size: usize,
    /// Initial share difficulty until the pool sends `mining.set_difficulty`.
    pub pool_difficulty: u64,
    /// Version bits the miner may roll (`mining.set_version_mask`); zero
    /// disables rolling.
    pub version_mask: u32,
    pub frame: FrameConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            extranonce2_size: 4,
            pool_difficulty: 1,
            version_mask: 0,
            frame: FrameConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.extranonce2_size == 0 || self.extranonce2_size > MAX_EXTRANONCE2_SIZE {
            return Err(Error::Config(format!(
                "extranonce2_size must be between 1 and {}, got {}",
                MAX_EXTRANONCE2_SIZE, self.extranonce2_size
            )));
        }
        if self.pool_difficulty == 0 {
            return Err(Error::Config("pool_difficulty must be positive".into()));
        }
        self.frame.validate()
    }
}
