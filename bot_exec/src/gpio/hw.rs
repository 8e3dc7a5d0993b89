//! # Hardware GPIO driver
//!
//! [`GpioDriver`] implementation for the Raspberry Pi header, built on
//! `rppal`. Only compiled for the Pi target.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};

// Internal
use super::{EdgeCallback, GpioDriver, GpioError, Level};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// GPIO driver for the Raspberry Pi.
///
/// Pins are claimed lazily on first use. Each output pin sits behind its own
/// mutex so that a long blocking pulse train on the IR emitter pin cannot
/// stall motor pin writes from the control loop.
pub struct HwDriver {
    gpio: Gpio,

    /// Software PWM frequency applied to duty-cycle outputs.
    pwm_freq_hz: f64,

    /// Epoch for edge-callback timestamps.
    epoch: Instant,

    outputs: Mutex<HashMap<u8, Arc<Mutex<OutputPin>>>>,

    /// Input pins are held here to keep their async interrupts alive.
    inputs: Mutex<HashMap<u8, InputPin>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HwDriver {
    /// Connect to the GPIO peripheral.
    ///
    /// Failure here is fatal at startup - without the peripheral the robot
    /// cannot actuate and must not enter the control loop.
    pub fn new(pwm_freq_hz: f64) -> Result<Self, GpioError> {
        let gpio = Gpio::new().map_err(|e| GpioError::NotConnected(e.to_string()))?;

        Ok(Self {
            gpio,
            pwm_freq_hz,
            epoch: Instant::now(),
            outputs: Mutex::new(HashMap::new()),
            inputs: Mutex::new(HashMap::new()),
        })
    }

    /// Get the handle for an output pin, claiming it if needed.
    fn output_pin(&self, pin: u8) -> Result<Arc<Mutex<OutputPin>>, GpioError> {
        let mut outputs = self.outputs.lock().unwrap();

        if let Some(p) = outputs.get(&pin) {
            return Ok(p.clone());
        }

        let out = self
            .gpio
            .get(pin)
            .map_err(|e| GpioError::PinClaimError(pin, e.to_string()))?
            .into_output();

        let out = Arc::new(Mutex::new(out));
        outputs.insert(pin, out.clone());
        Ok(out)
    }
}

impl GpioDriver for HwDriver {
    fn set_output(&self, pin: u8, level: Level) -> Result<(), GpioError> {
        let handle = self.output_pin(pin)?;
        let mut out = handle.lock().unwrap();

        // Stop any software PWM running on this pin before writing a level
        out.clear_pwm()
            .map_err(|e| GpioError::HardwareError(pin, e.to_string()))?;

        match level {
            Level::High => out.set_high(),
            Level::Low => out.set_low(),
        }

        Ok(())
    }

    fn set_pwm_duty(&self, pin: u8, duty: u8) -> Result<(), GpioError> {
        let handle = self.output_pin(pin)?;
        let mut out = handle.lock().unwrap();

        if duty == 0 {
            out.clear_pwm()
                .map_err(|e| GpioError::HardwareError(pin, e.to_string()))?;
            out.set_low();
            return Ok(());
        }

        out.set_pwm_frequency(self.pwm_freq_hz, duty as f64 / 255.0)
            .map_err(|e| GpioError::HardwareError(pin, e.to_string()))
    }

    fn emit_pulse_train(
        &self,
        pin: u8,
        carrier_period_us: u64,
        duration_us: u64,
    ) -> Result<(), GpioError> {
        let handle = self.output_pin(pin)?;
        let mut out = handle.lock().unwrap();

        let on_us = carrier_period_us / 2;
        let off_us = carrier_period_us - on_us;

        let start = Instant::now();

        // Bit-banged carrier. The timing budget (~26 us period) is too tight
        // for thread::sleep so the carrier is generated with busy waits.
        while (start.elapsed().as_micros() as u64) < duration_us {
            out.set_high();
            busy_wait_us(on_us);
            out.set_low();
            busy_wait_us(off_us);
        }

        out.set_low();

        Ok(())
    }

    fn register_edge_callback(&self, pin: u8, mut cb: EdgeCallback) -> Result<(), GpioError> {
        let mut inputs = self.inputs.lock().unwrap();

        let mut input = self
            .gpio
            .get(pin)
            .map_err(|e| GpioError::PinClaimError(pin, e.to_string()))?
            .into_input_pullup();

        let epoch = self.epoch;

        input
            .set_async_interrupt(Trigger::Both, move |level| {
                let timestamp_us = epoch.elapsed().as_micros() as u64;
                let level = match level {
                    rppal::gpio::Level::High => Level::High,
                    rppal::gpio::Level::Low => Level::Low,
                };
                cb(level, timestamp_us);
            })
            .map_err(|e| GpioError::HardwareError(pin, e.to_string()))?;

        // Keep the pin alive, dropping it would cancel the interrupt
        inputs.insert(pin, input);

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Spin until the given number of microseconds has elapsed.
fn busy_wait_us(us: u64) {
    let start = Instant::now();
    while (start.elapsed().as_micros() as u64) < us {
        std::hint::spin_loop();
    }
}
