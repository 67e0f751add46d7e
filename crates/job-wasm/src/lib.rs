//! WebAssembly bindings for the Stratum job pipeline.
//!
//! JavaScript holds the pool connection and forwards:
//! - `mining.notify`, `mining.set_difficulty` and `mining.set_version_mask`
//! - chip nonce responses read from the serial link
//!
//! and gets back prepared work, BM1397 job frames and `mining.submit` params.

use wasm_bindgen::prelude::*;

pub mod miner;
pub mod state;

pub use miner::Miner;

/// Initialize the WASM module with better panic messages.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
