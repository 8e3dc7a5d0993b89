//! # Drive command messages
//!
//! The operator station sends one [`CmdMsg`] per control update. Every field
//! is optional on the wire: numeric fields which are absent leave the
//! previously commanded value untouched, while the boolean fields (`estop`,
//! `fire`) default to false so that neither can latch on across datagrams.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single drive-command datagram as it appears on the wire.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct CmdMsg {
    /// Normalised forward velocity demand, [-1, +1].
    pub vx: Option<f64>,

    /// Normalised strafe velocity demand, [-1, +1].
    pub vy: Option<f64>,

    /// Normalised rotation rate demand, [-1, +1].
    pub omega: Option<f64>,

    /// Overall speed scale, [0, 1].
    pub speed: Option<f64>,

    /// Emergency stop. Defaults to false when absent.
    #[serde(default)]
    pub estop: bool,

    /// Fire the IR emitter. Defaults to false when absent.
    #[serde(default)]
    pub fire: bool,

    /// The team this robot fires as.
    pub team_id: Option<u8>,

    /// Station-side timestamp of the last meaningful operator input, in
    /// seconds. Optional - if never supplied the robot derives input activity
    /// from the commanded axes instead.
    pub last_input_time: Option<f64>,
}

/// The most recent complete drive command, built by merging [`CmdMsg`]s as
/// they arrive. Last write wins - there is no queueing of commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DriveCommand {
    /// Normalised forward velocity demand, [-1, +1].
    pub vx: f64,

    /// Normalised strafe velocity demand, [-1, +1].
    pub vy: f64,

    /// Normalised rotation rate demand, [-1, +1].
    pub omega: f64,

    /// Overall speed scale, [0, 1].
    pub speed: f64,

    /// Emergency stop.
    pub estop: bool,

    /// Fire the IR emitter.
    pub fire: bool,

    /// The team this robot fires as.
    pub team_id: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while parsing a command datagram.
#[derive(Debug, thiserror::Error)]
pub enum CmdParseError {
    #[error("Datagram is not valid UTF-8")]
    NotUtf8,

    #[error("Could not parse the command message: {0}")]
    JsonError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdMsg {
    /// Parse a raw datagram into a command message.
    pub fn from_json(data: &[u8]) -> Result<Self, CmdParseError> {
        let text = std::str::from_utf8(data).map_err(|_| CmdParseError::NotUtf8)?;
        serde_json::from_str(text).map_err(CmdParseError::JsonError)
    }
}

impl Default for DriveCommand {
    fn default() -> Self {
        DriveCommand {
            vx: 0.0,
            vy: 0.0,
            omega: 0.0,
            speed: 1.0,
            estop: false,
            fire: false,
            team_id: 1,
        }
    }
}

impl DriveCommand {
    /// Merge a newly received message into this command.
    ///
    /// Absent numeric fields keep their previous value, the booleans always
    /// take the message's value, and the speed scale is clamped to [0, 1].
    pub fn merge(&mut self, msg: &CmdMsg) {
        if let Some(vx) = msg.vx {
            self.vx = vx;
        }
        if let Some(vy) = msg.vy {
            self.vy = vy;
        }
        if let Some(omega) = msg.omega {
            self.omega = omega;
        }
        if let Some(speed) = msg.speed {
            self.speed = speed.max(0.0).min(1.0);
        }
        self.estop = msg.estop;
        self.fire = msg.fire;
        if let Some(team_id) = msg.team_id {
            self.team_id = team_id;
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_merge_retains_missing_fields() {
        let mut cmd = DriveCommand::default();

        cmd.merge(&CmdMsg::from_json(br#"{"vx": 0.5, "team_id": 3}"#).unwrap());
        assert_eq!(cmd.vx, 0.5);
        assert_eq!(cmd.team_id, 3);

        // A message without vx must not disturb the previous demand
        cmd.merge(&CmdMsg::from_json(br#"{"vy": -0.25}"#).unwrap());
        assert_eq!(cmd.vx, 0.5);
        assert_eq!(cmd.vy, -0.25);
        assert_eq!(cmd.team_id, 3);
    }

    #[test]
    fn test_merge_booleans_default_false() {
        let mut cmd = DriveCommand::default();

        cmd.merge(&CmdMsg::from_json(br#"{"estop": true, "fire": true}"#).unwrap());
        assert!(cmd.estop);
        assert!(cmd.fire);

        // Booleans are not sticky - an empty message clears them
        cmd.merge(&CmdMsg::from_json(br#"{}"#).unwrap());
        assert!(!cmd.estop);
        assert!(!cmd.fire);
    }

    #[test]
    fn test_merge_clamps_speed() {
        let mut cmd = DriveCommand::default();

        cmd.merge(&CmdMsg::from_json(br#"{"speed": 1.8}"#).unwrap());
        assert_eq!(cmd.speed, 1.0);

        cmd.merge(&CmdMsg::from_json(br#"{"speed": -0.2}"#).unwrap());
        assert_eq!(cmd.speed, 0.0);
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(CmdMsg::from_json(b"{not json").is_err());
        assert!(CmdMsg::from_json(&[0xff, 0xfe]).is_err());
    }
}
