//! # Data Store
//!
//! Global state for the `bot_exec` executable. Owns the cyclic modules and
//! the input/output slots shuttled between them each control cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::{drive_ctrl, ir_codec::HitEvent, mode_mgr, motor_driver};
use comms_if::tm::LaserTagTm;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session elapsed time at the start of this cycle
    pub cycle_start_time_s: f64,

    // Hit events drained from the IR receivers this cycle
    pub hit_events: Vec<HitEvent>,

    // ModeMgr
    pub mode_mgr: mode_mgr::ModeMgr,
    pub mode_mgr_input: mode_mgr::InputData,
    pub mode_mgr_output: mode_mgr::OutputData,
    pub mode_mgr_status_rpt: mode_mgr::StatusReport,

    // DriveCtrl
    pub drive_ctrl: drive_ctrl::DriveCtrl,
    pub drive_ctrl_input: drive_ctrl::InputData,
    pub drive_ctrl_output: drive_ctrl::OutputData,
    pub drive_ctrl_status_rpt: drive_ctrl::StatusReport,

    // MotorDriver
    pub motor_driver: motor_driver::MotorDriver,
    pub motor_driver_input: motor_driver::InputData,
    pub motor_driver_status_rpt: motor_driver::StatusReport,

    // Telemetry published to the command server this cycle
    pub tm: LaserTagTm,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        if self.num_cycles % (cycle_frequency_hz as u128) == 0 {
            self.is_1_hz_cycle = true;
        } else {
            self.is_1_hz_cycle = false;
        }

        self.hit_events.clear();

        self.mode_mgr_input = mode_mgr::InputData::default();
        self.mode_mgr_output = mode_mgr::OutputData::default();
        self.mode_mgr_status_rpt = mode_mgr::StatusReport::default();

        self.drive_ctrl_input = drive_ctrl::InputData::default();
        self.drive_ctrl_output = drive_ctrl::OutputData::default();
        self.drive_ctrl_status_rpt = drive_ctrl::StatusReport::default();

        self.motor_driver_input = motor_driver::InputData::default();
        self.motor_driver_status_rpt = motor_driver::StatusReport::default();

        self.cycle_start_time_s = util::session::get_elapsed_seconds();
    }
}
