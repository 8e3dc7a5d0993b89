//! Parameters structure for the mode manager

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the mode manager.
#[derive(Debug, Deserialize)]
pub struct Params {
    /// How long the robot stays disabled after a verified hit.
    ///
    /// Units: seconds
    pub hit_disable_time_s: f64,

    /// Maximum age of the newest drive command before the motors are forced
    /// to a stop.
    ///
    /// Units: seconds
    pub command_timeout_s: f64,

    /// Idle time on all axes after which the robot drops into power-save
    /// standby.
    ///
    /// Units: seconds
    pub power_save_timeout_s: f64,

    /// Axis magnitude above which a command counts as meaningful operator
    /// input (wakes the robot from standby, resets the power-save timer).
    pub input_deadband: f64,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            hit_disable_time_s: 10.0,
            command_timeout_s: 0.8,
            power_save_timeout_s: 10.0,
            input_deadband: 0.05,
        }
    }
}
