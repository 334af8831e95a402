//! `wasm-bindgen` exports for the simulator.
//!
//! Wraps a [`Runtime`] with JS-friendly types: string ids in, JSON out,
//! errors as thrown strings. Only compiled on `wasm32` targets.

use crate::kernel::{SimConfig, SimError, TickDriver, Variant, WorkOverrides};
use crate::runtime::Runtime;
use wasm_bindgen::prelude::*;

fn to_js(e: SimError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Seed for runs without a configured one
fn host_seed() -> u64 {
    (js_sys::Math::random() * (1u64 << 53) as f64) as u64
}

/// One softirq, tasklet, or workqueue simulation
#[wasm_bindgen]
pub struct DeferredSimulator {
    runtime: Runtime,
    variant: Variant,
}

#[wasm_bindgen]
impl DeferredSimulator {
    /// `variant` is "softirq", "tasklet", or "workqueue"
    #[wasm_bindgen(constructor)]
    pub fn new(variant: &str) -> Result<DeferredSimulator, JsValue> {
        let variant: Variant = variant.parse().map_err(to_js)?;
        Self::build(&SimConfig::for_variant(variant))
    }

    /// Build from a JSON config; omitted fields take variant defaults
    #[wasm_bindgen(js_name = fromConfig)]
    pub fn from_config(json: &str) -> Result<DeferredSimulator, JsValue> {
        let config = SimConfig::from_json(json).map_err(to_js)?;
        Self::build(&config)
    }

    fn build(config: &SimConfig) -> Result<DeferredSimulator, JsValue> {
        let driver = TickDriver::with_config(config, host_seed()).map_err(to_js)?;
        Ok(Self {
            runtime: Runtime::new(driver),
            variant: config.variant,
        })
    }

    pub fn variant(&self) -> String {
        self.variant.id().to_string()
    }

    /// Called with the snapshot JSON after every frame
    #[wasm_bindgen(js_name = onFrame)]
    pub fn on_frame(&self, callback: Option<js_sys::Function>) {
        self.runtime.set_on_frame(callback);
    }

    pub fn start(&self) {
        self.runtime.start();
    }

    pub fn pause(&self) {
        self.runtime.pause();
    }

    pub fn reset(&self) {
        self.runtime.reset();
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.runtime.is_running()
    }

    /// Raise one item now. Returns its id.
    pub fn inject(&self, category: Option<String>, priority: Option<String>) -> Result<f64, JsValue> {
        let overrides =
            WorkOverrides::from_hints(self.variant, category.as_deref(), priority.as_deref())
                .map_err(to_js)?;
        let id = self.runtime.inject(overrides).map_err(to_js)?;
        Ok(id.0 as f64)
    }

    /// Resize the worker pool (workqueue only)
    #[wasm_bindgen(js_name = setConcurrency)]
    pub fn set_concurrency(&self, n: u32) -> Result<(), JsValue> {
        self.runtime.set_concurrency(n as usize).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setSpeed)]
    pub fn set_speed(&self, speed: f64) -> Result<(), JsValue> {
        self.runtime.set_speed(speed).map_err(to_js)
    }

    /// Drive one frame by hand. Returns `false` when paused.
    pub fn frame(&self, timestamp: f64) -> bool {
        self.runtime.frame(timestamp)
    }

    pub fn snapshot(&self) -> Result<String, JsValue> {
        self.runtime
            .with_driver(TickDriver::snapshot)
            .to_json()
            .map_err(to_js)
    }

    /// ASCII rendering, for debugging from the console
    #[wasm_bindgen(js_name = renderAscii)]
    pub fn render_ascii(&self) -> String {
        self.runtime.with_driver(TickDriver::snapshot).render_ascii()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_unknown_variant_rejected() {
        assert!(DeferredSimulator::new("bottom-half").is_err());
    }

    #[wasm_bindgen_test]
    fn test_inject_and_snapshot() {
        let sim = DeferredSimulator::from_config(r#"{"variant":"tasklet","spawn_probability":0}"#)
            .unwrap();
        let id = sim.inject(Some("usb".into()), Some("high".into())).unwrap();
        assert_eq!(id, 1.0);
        let json = sim.snapshot().unwrap();
        assert!(json.contains("\"pending_total\":1"));
        assert!(sim.inject(Some("kswapd".into()), None).is_err());
    }

    #[wasm_bindgen_test]
    fn test_pause_stops_manual_frames() {
        let sim = DeferredSimulator::new("softirq").unwrap();
        assert!(!sim.frame(16.0));
        sim.start();
        sim.pause();
        assert!(!sim.is_running());
        assert!(!sim.frame(32.0));
    }

    #[wasm_bindgen_test]
    fn test_fixed_variants_reject_resize() {
        let sim = DeferredSimulator::new("softirq").unwrap();
        assert!(sim.set_concurrency(8).is_err());
        let sim = DeferredSimulator::new("workqueue").unwrap();
        assert!(sim.set_concurrency(8).is_ok());
    }
}
