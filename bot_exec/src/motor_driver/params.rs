//! Parameters structure for the motor driver

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use thiserror::Error;

use crate::drive_ctrl::NUM_WHEELS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the motor driver.
#[derive(Debug, Default, Deserialize)]
pub struct Params {
    /// Per-wheel channel wiring, in wheel order FL, FR, RL, RR.
    pub channels: Vec<ChannelParams>,

    /// BCM pins of the motor driver STBY lines. Driving these low
    /// de-energises the driver stage entirely.
    pub stby_pins: Vec<u8>,

    /// Demands at or above this percentage bypass PWM and drive the enable
    /// pin fully on, minimising switching losses.
    pub pure_dc_threshold_pct: u8,

    /// Minimum duty percentage applied to any non-zero demand, to overcome
    /// static friction.
    pub min_duty_floor_pct: u8,
}

/// Wiring of one motor channel.
#[derive(Debug, Deserialize)]
pub struct ChannelParams {
    /// Human readable corner name ("FL" etc), used in logs only.
    pub corner: String,

    /// H-bridge enable (PWM) pin.
    pub en_pin: u8,

    /// First direction pin.
    pub in1_pin: u8,

    /// Second direction pin.
    pub in2_pin: u8,

    /// Static direction sign correcting for reversed motor wiring, +1 or -1.
    pub dir_sign: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by invalid motor driver parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Expected {NUM_WHEELS} motor channels, found {0}")]
    WrongChannelCount(usize),

    #[error("Channel {0}: dir_sign must be +1 or -1, found {1}")]
    InvalidDirSign(String, f64),

    #[error("Duty percentages must be <= 100 (floor {0}, threshold {1})")]
    InvalidDutyPct(u8, u8),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the loaded parameters describe a drivable robot.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if self.channels.len() != NUM_WHEELS {
            return Err(ParamsError::WrongChannelCount(self.channels.len()));
        }

        for ch in &self.channels {
            if ch.dir_sign != 1.0 && ch.dir_sign != -1.0 {
                return Err(ParamsError::InvalidDirSign(ch.corner.clone(), ch.dir_sign));
            }
        }

        if self.min_duty_floor_pct > 100 || self.pure_dc_threshold_pct > 100 {
            return Err(ParamsError::InvalidDutyPct(
                self.min_duty_floor_pct,
                self.pure_dc_threshold_pct,
            ));
        }

        Ok(())
    }
}
