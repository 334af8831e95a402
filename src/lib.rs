//! deferlab - Linux deferred-work mechanisms, simulated
//!
//! Softirqs, tasklets, and workqueues side by side: raise work, watch it
//! queue, run on a CPU or worker, and land in the completed history.
//!
//! Targets:
//! - Browser (wasm32-unknown-unknown): requestAnimationFrame loop, JSON snapshots
//! - Native: `deferlab` terminal REPL over the same kernel

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod kernel;

#[cfg(target_arch = "wasm32")]
pub mod logging;

#[cfg(target_arch = "wasm32")]
pub mod runtime;

#[cfg(target_arch = "wasm32")]
pub mod bindings;

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WASM entry point
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    init_panic_hook();
    logging::init(log::LevelFilter::Info);
    log::info!("deferlab ready");
}
