//! # Motor driver module
//!
//! Converts the normalised wheel demands from `drive_ctrl` into H-bridge pin
//! states: direction pin pairs, PWM duty on the enable pins, and the STBY
//! lines which de-energise the whole driver stage in power-save standby.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;
