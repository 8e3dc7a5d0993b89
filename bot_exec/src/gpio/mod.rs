//! # GPIO and Timing Driver
//!
//! This module draws the boundary between the control core and the physical
//! IO of the robot: digital pin levels, PWM duty cycles, carrier-modulated
//! pulse trains for the IR emitter, and edge interrupts from the IR
//! receivers.
//!
//! Two implementations exist:
//! - [`hw::HwDriver`] drives the Raspberry Pi's GPIO header through `rppal`.
//!   Only compiled for the Pi target.
//! - [`sim::SimDriver`] records all pin activity for inspection and lets
//!   tests inject edges by hand. Used on non-Pi hosts and by all tests.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

#[cfg(target_arch = "arm")]
pub mod hw;
pub mod sim;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A digital pin level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Possible errors raised by a GPIO driver.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("Could not connect to the GPIO peripheral: {0}")]
    NotConnected(String),

    #[error("Could not claim GPIO pin {0}: {1}")]
    PinClaimError(u8, String),

    #[error("Hardware access error on pin {0}: {1}")]
    HardwareError(u8, String),
}

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Callback invoked on a pin edge, receiving the new level and a monotonic
/// microsecond timestamp.
pub type EdgeCallback = Box<dyn FnMut(Level, u64) + Send>;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Unified interface to the robot's GPIO and precision timing hardware.
///
/// Implementations claim pins lazily on first use, so modules only need the
/// driver handle and their own pin numbers.
pub trait GpioDriver: Send + Sync {
    /// Set a digital output pin to the given level.
    ///
    /// If the pin previously had a PWM duty applied the PWM is stopped first.
    fn set_output(&self, pin: u8, level: Level) -> Result<(), GpioError>;

    /// Set the PWM duty cycle on a pin, 0 (off) to 255 (fully on).
    fn set_pwm_duty(&self, pin: u8, duty: u8) -> Result<(), GpioError>;

    /// Emit a carrier-modulated pulse train on a pin.
    ///
    /// The pin is toggled at ~50% duty of `carrier_period_us` for a total of
    /// `duration_us`, ending low. This call blocks for the full duration and
    /// must therefore never be made from the control-loop tick.
    fn emit_pulse_train(
        &self,
        pin: u8,
        carrier_period_us: u64,
        duration_us: u64,
    ) -> Result<(), GpioError>;

    /// Register a callback to be invoked on every edge of an input pin.
    ///
    /// The pin is configured as an input with its pull-up enabled, matching
    /// the active-low output of the IR demodulator modules.
    fn register_edge_callback(&self, pin: u8, cb: EdgeCallback) -> Result<(), GpioError>;
}
