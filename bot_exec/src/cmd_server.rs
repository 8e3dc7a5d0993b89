//! # Command server
//!
//! Listens for operator drive-command datagrams (JSON over UDP), merges them
//! into the shared [`CmdCell`], and replies to each with the latest laser tag
//! telemetry.
//!
//! The server runs on its own thread so the control loop never blocks on the
//! network. Last write wins: the cell always holds the newest complete
//! command and the timestamps the mode manager needs to judge staleness.
//! Malformed datagrams are dropped without disturbing the current command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

// Internal
use comms_if::{
    cmd::{CmdMsg, DriveCommand},
    tm::LaserTagTm,
};
use util::session;

use std::net::UdpSocket;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Axis magnitude above which a datagram counts as operator input for the
/// power-save timer. Matches the mode manager's default deadband.
const INPUT_DEADBAND: f64 = 0.05;

/// Receive buffer size. Command datagrams are tiny, anything bigger than
/// this is not ours.
const RECV_BUF_SIZE: usize = 1024;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Network parameters for the command server.
#[derive(Debug, Deserialize)]
pub struct Params {
    /// Address to bind the UDP socket to.
    pub bind_address: String,

    /// UDP port to listen for command datagrams on.
    pub udp_port: u16,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            bind_address: String::from("0.0.0.0"),
            udp_port: 5005,
        }
    }
}

/// Shared slot holding the newest merged drive command.
///
/// Written by the command server thread, read (snapshotted) once per control
/// cycle. All timestamps are session-elapsed seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmdCell {
    /// The newest complete drive command.
    pub cmd: DriveCommand,

    /// When the newest datagram arrived.
    pub last_cmd_time_s: f64,

    /// When meaningful operator input was last seen.
    pub last_input_time_s: f64,

    /// The newest station-side input timestamp seen, used only to detect
    /// change. Station clocks are not ours, their absolute value means
    /// nothing here.
    station_input_time: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while starting the command server.
#[derive(Debug, Error)]
pub enum CmdServerError {
    #[error("Could not bind the command socket: {0}")]
    BindError(std::io::Error),

    #[error("Could not spawn the server thread: {0}")]
    SpawnError(std::io::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Start the command server on its own thread.
///
/// Binding the socket happens here so that a port clash is a startup error,
/// not a silent dead robot.
pub fn spawn(
    params: Params,
    cmd_cell: Arc<Mutex<CmdCell>>,
    tm_cell: Arc<Mutex<LaserTagTm>>,
) -> Result<thread::JoinHandle<()>, CmdServerError> {
    let socket = UdpSocket::bind((params.bind_address.as_str(), params.udp_port))
        .map_err(CmdServerError::BindError)?;

    info!(
        "Command server listening on {}:{}",
        params.bind_address, params.udp_port
    );

    thread::Builder::new()
        .name(String::from("cmd_server"))
        .spawn(move || serve(socket, cmd_cell, tm_cell))
        .map_err(CmdServerError::SpawnError)
}

/// Merge a parsed command message into the cell.
///
/// `now_s` is the arrival time in session-elapsed seconds.
pub fn apply_msg(cell: &mut CmdCell, msg: &CmdMsg, now_s: f64) {
    cell.cmd.merge(msg);
    cell.last_cmd_time_s = now_s;

    // Locally derived input activity: meaningful axis demand, or the
    // operator leaning on the buttons
    let active = cell.cmd.vx.abs() > INPUT_DEADBAND
        || cell.cmd.vy.abs() > INPUT_DEADBAND
        || cell.cmd.omega.abs() > INPUT_DEADBAND
        || cell.cmd.estop
        || cell.cmd.fire;

    if active {
        cell.last_input_time_s = now_s;
    }

    // Station supplied input activity: a changed timestamp means the station
    // saw fresh input, regardless of what the axes look like by now
    if let Some(t) = msg.last_input_time {
        if cell.station_input_time != Some(t) {
            cell.station_input_time = Some(t);
            cell.last_input_time_s = now_s;
        }
    }
}

/// Lock a shared cell. A poisoned lock still holds usable data, the control
/// loop must keep running after a panicked writer.
pub fn lock_cell<T>(cell: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    match cell.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Server thread main loop, runs until the process exits.
fn serve(socket: UdpSocket, cmd_cell: Arc<Mutex<CmdCell>>, tm_cell: Arc<Mutex<LaserTagTm>>) {
    let mut buf = [0u8; RECV_BUF_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) => {
                warn!("Command socket recieve error: {}", e);
                continue;
            }
        };

        let msg = match CmdMsg::from_json(&buf[..len]) {
            Ok(m) => m,
            Err(e) => {
                debug!("Dropping malformed datagram from {}: {}", src, e);
                continue;
            }
        };

        let now_s = session::get_elapsed_seconds();
        apply_msg(&mut lock_cell(&cmd_cell), &msg, now_s);

        // Reply with the latest telemetry snapshot
        let tm = *lock_cell(&tm_cell);
        match tm.to_json() {
            Ok(reply) => {
                if let Err(e) = socket.send_to(&reply, src) {
                    debug!("Could not send telemetry to {}: {}", src, e);
                }
            }
            Err(e) => warn!("Could not serialise telemetry: {}", e),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_apply_updates_cmd_and_timestamp() {
        let mut cell = CmdCell::default();

        let msg = CmdMsg::from_json(br#"{"vx": 0.5}"#).unwrap();
        apply_msg(&mut cell, &msg, 3.0);

        assert_eq!(cell.cmd.vx, 0.5);
        assert_eq!(cell.last_cmd_time_s, 3.0);
        assert_eq!(cell.last_input_time_s, 3.0);
    }

    #[test]
    fn test_idle_datagrams_keep_link_fresh_but_not_input() {
        let mut cell = CmdCell::default();

        let msg = CmdMsg::from_json(br#"{"vx": 0.8}"#).unwrap();
        apply_msg(&mut cell, &msg, 1.0);

        // Sticks released: axes back to zero
        let msg = CmdMsg::from_json(br#"{"vx": 0.0}"#).unwrap();
        apply_msg(&mut cell, &msg, 2.0);
        apply_msg(&mut cell, &msg, 3.0);

        assert_eq!(cell.last_cmd_time_s, 3.0);
        assert_eq!(cell.last_input_time_s, 1.0);
    }

    #[test]
    fn test_estop_counts_as_input() {
        let mut cell = CmdCell::default();

        let msg = CmdMsg::from_json(br#"{"estop": true}"#).unwrap();
        apply_msg(&mut cell, &msg, 4.0);

        assert_eq!(cell.last_input_time_s, 4.0);
    }

    #[test]
    fn test_station_input_time_change_detection() {
        let mut cell = CmdCell::default();

        let msg = CmdMsg::from_json(br#"{"last_input_time": 100.0}"#).unwrap();
        apply_msg(&mut cell, &msg, 1.0);
        assert_eq!(cell.last_input_time_s, 1.0);

        // Same station timestamp repeated is not new input
        apply_msg(&mut cell, &msg, 2.0);
        assert_eq!(cell.last_input_time_s, 1.0);

        let msg = CmdMsg::from_json(br#"{"last_input_time": 101.5}"#).unwrap();
        apply_msg(&mut cell, &msg, 3.0);
        assert_eq!(cell.last_input_time_s, 3.0);
    }
}
