//! Browser runtime integration
//!
//! Bridges a tick driver to the browser's event loop:
//! - requestAnimationFrame drives the tick loop
//! - Each frame hands a JSON snapshot to the host's render callback
//!
//! Every simulator owns its own loop. Pausing cancels the outstanding
//! frame request before returning, so no tick runs after `pause`.

use crate::kernel::{Clock, SimResult, TickDriver, WorkId, WorkOverrides};
use log::{debug, error, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// `performance.now()` as a clock
pub struct PerformanceClock {
    performance: Option<web_sys::Performance>,
}

impl PerformanceClock {
    pub fn new() -> Self {
        Self {
            performance: web_sys::window().and_then(|w| w.performance()),
        }
    }
}

impl Default for PerformanceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        self.performance.as_ref().map_or(0.0, |p| p.now())
    }
}

/// State shared with the frame closure
struct LoopState {
    driver: TickDriver,
    /// Callback for requestAnimationFrame (stored to prevent GC)
    frame_closure: Option<Closure<dyn FnMut(f64)>>,
    /// Outstanding requestAnimationFrame handle
    frame_handle: Option<i32>,
    /// Host render callback, called with the snapshot JSON
    on_frame: Option<js_sys::Function>,
}

pub struct Runtime {
    state: Rc<RefCell<LoopState>>,
    clock: PerformanceClock,
}

impl Runtime {
    pub fn new(driver: TickDriver) -> Self {
        let state = Rc::new(RefCell::new(LoopState {
            driver,
            frame_closure: None,
            frame_handle: None,
            on_frame: None,
        }));

        let weak = Rc::downgrade(&state);
        let closure = Closure::wrap(Box::new(move |timestamp: f64| {
            frame_tick(&weak, timestamp);
        }) as Box<dyn FnMut(f64)>);
        state.borrow_mut().frame_closure = Some(closure);

        Self {
            state,
            clock: PerformanceClock::new(),
        }
    }

    pub fn set_on_frame(&self, callback: Option<js_sys::Function>) {
        self.state.borrow_mut().on_frame = callback;
    }

    /// Start the frame loop
    pub fn start(&self) {
        let mut state = self.state.borrow_mut();
        if state.driver.is_running() {
            debug!("already running");
            return;
        }
        state.driver.start(self.clock.now_ms());
        request_animation_frame(&mut state);
    }

    /// Stop the frame loop and cancel the pending frame
    pub fn pause(&self) {
        let mut state = self.state.borrow_mut();
        state.driver.pause();
        cancel_animation_frame(&mut state);
    }

    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.driver.reset();
        cancel_animation_frame(&mut state);
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().driver.is_running()
    }

    pub fn inject(&self, overrides: WorkOverrides) -> SimResult<WorkId> {
        self.state.borrow_mut().driver.inject(overrides)
    }

    pub fn set_concurrency(&self, n: usize) -> SimResult<()> {
        self.state.borrow_mut().driver.set_concurrency(n)
    }

    pub fn set_speed(&self, speed: f64) -> SimResult<()> {
        self.state.borrow_mut().driver.set_speed(speed)
    }

    /// Run one frame by hand, outside the loop
    pub fn frame(&self, timestamp: f64) -> bool {
        self.state.borrow_mut().driver.frame(timestamp).is_some()
    }

    /// Borrow the driver for reading
    pub fn with_driver<T>(&self, f: impl FnOnce(&TickDriver) -> T) -> T {
        f(&self.state.borrow().driver)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            cancel_animation_frame(&mut state);
            state.frame_closure = None;
        }
    }
}

/// Request the next animation frame
fn request_animation_frame(state: &mut LoopState) {
    let Some(window) = web_sys::window() else {
        warn!("no window object");
        return;
    };
    let Some(closure) = state.frame_closure.as_ref() else {
        return;
    };
    match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
        Ok(handle) => state.frame_handle = Some(handle),
        Err(e) => error!("requestAnimationFrame failed: {:?}", e),
    }
}

fn cancel_animation_frame(state: &mut LoopState) {
    if let (Some(handle), Some(window)) = (state.frame_handle.take(), web_sys::window()) {
        let _ = window.cancel_animation_frame(handle);
    }
}

/// Called every frame by requestAnimationFrame
fn frame_tick(weak: &Weak<RefCell<LoopState>>, timestamp: f64) {
    let Some(state) = weak.upgrade() else {
        return;
    };

    let render = {
        let mut state = state.borrow_mut();
        state.frame_handle = None;
        if state.driver.frame(timestamp).is_none() {
            return;
        }
        let json = match state.driver.snapshot().to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                error!("snapshot failed: {}", e);
                None
            }
        };
        state.on_frame.clone().zip(json)
    };

    // The callback may pause or reset, so no borrow is held across it
    if let Some((callback, json)) = render {
        if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
            error!("render callback threw: {:?}", e);
        }
    }

    let mut state = state.borrow_mut();
    if state.driver.is_running() && state.frame_handle.is_none() {
        request_animation_frame(&mut state);
    }
}
