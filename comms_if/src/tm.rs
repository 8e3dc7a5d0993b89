//! # Laser tag telemetry
//!
//! A [`LaserTagTm`] is sent back to the operator station's address in reply
//! to every drive-command datagram received.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Laser tag status telemetry.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LaserTagTm {
    /// The team this robot currently fires as.
    pub team_id: u8,

    /// True while the robot is serving a hit-disable lockout.
    pub is_hit: bool,

    /// The team whose shot caused the current lockout, 0 if not hit.
    pub hit_by_team: u8,

    /// Seconds remaining until the robot re-enables, 0 if not hit.
    pub time_remaining: f64,

    /// True if the current lockout was caused by the robot's own shot.
    pub is_self_hit: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LaserTagTm {
    /// Serialise the telemetry into a JSON datagram body.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
