//! Drive control module
//!
//! Maps a 3-DOF normalised velocity command (forward, strafe, rotate) onto
//! the four wheels of the mecanum drive.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_mecanum;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use calc_mecanum::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of wheels on the robot.
pub const NUM_WHEELS: usize = 4;

/// Wheel ordering used by all per-wheel arrays in the software.
pub const WHEEL_FL: usize = 0;
pub const WHEEL_FR: usize = 1;
pub const WHEEL_RL: usize = 2;
pub const WHEEL_RR: usize = 3;
