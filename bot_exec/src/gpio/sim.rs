//! # Simulated GPIO driver
//!
//! Records all pin activity behind a mutex so tests (and bench runs on
//! non-Pi hosts) can inspect exactly what the control core commanded, and
//! lets tests inject receiver edges by hand.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::{EdgeCallback, GpioDriver, GpioError, Level};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The recorded state of a single simulated pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimPinState {
    /// Last digital level written, if any.
    pub level: Level,

    /// Last PWM duty written, 0 if the pin was last driven digitally.
    pub duty: u8,
}

/// Simulated GPIO driver.
#[derive(Default)]
pub struct SimDriver {
    pins: Mutex<HashMap<u8, SimPinState>>,

    /// Pulse trains emitted per pin, as (carrier_period_us, duration_us).
    pulse_trains: Mutex<HashMap<u8, Vec<(u64, u64)>>>,

    callbacks: Mutex<HashMap<u8, EdgeCallback>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the last recorded state of a pin, or `None` if never written.
    pub fn pin_state(&self, pin: u8) -> Option<SimPinState> {
        self.pins.lock().unwrap().get(&pin).copied()
    }

    /// Get all pulse trains emitted on a pin so far.
    pub fn emitted_pulse_trains(&self, pin: u8) -> Vec<(u64, u64)> {
        self.pulse_trains
            .lock()
            .unwrap()
            .get(&pin)
            .cloned()
            .unwrap_or_default()
    }

    /// Deliver an edge to the callback registered on a pin, as the hardware
    /// interrupt would.
    pub fn inject_edge(&self, pin: u8, level: Level, timestamp_us: u64) {
        if let Some(cb) = self.callbacks.lock().unwrap().get_mut(&pin) {
            cb(level, timestamp_us);
        }
    }
}

impl GpioDriver for SimDriver {
    fn set_output(&self, pin: u8, level: Level) -> Result<(), GpioError> {
        self.pins
            .lock()
            .unwrap()
            .insert(pin, SimPinState { level, duty: 0 });
        Ok(())
    }

    fn set_pwm_duty(&self, pin: u8, duty: u8) -> Result<(), GpioError> {
        let level = if duty > 0 { Level::High } else { Level::Low };
        self.pins
            .lock()
            .unwrap()
            .insert(pin, SimPinState { level, duty });
        Ok(())
    }

    fn emit_pulse_train(
        &self,
        pin: u8,
        carrier_period_us: u64,
        duration_us: u64,
    ) -> Result<(), GpioError> {
        self.pulse_trains
            .lock()
            .unwrap()
            .entry(pin)
            .or_insert_with(Vec::new)
            .push((carrier_period_us, duration_us));

        // Keep the blocking contract of the hardware driver so concurrency
        // behaviour (the fire lock in particular) is exercised faithfully
        thread::sleep(Duration::from_micros(duration_us));

        Ok(())
    }

    fn register_edge_callback(&self, pin: u8, cb: EdgeCallback) -> Result<(), GpioError> {
        self.callbacks.lock().unwrap().insert(pin, cb);
        Ok(())
    }
}
