//! Implementations for the ModeMgr state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

// Internal
use super::Params;
use crate::ir_codec::HitEvent;
use comms_if::{cmd::DriveCommand, tm::LaserTagTm};
use util::{module::State, params, session::Session};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The robot's session mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RobotMode {
    /// Normal operation, commands are executed.
    Driving,

    /// Power-save standby after a period without meaningful operator input.
    /// Motors are de-energised, the first above-deadband command wakes the
    /// robot.
    Standby,

    /// Locked out after taking a hit. Counts down to zero then respawns
    /// into [`RobotMode::Driving`].
    HitDisabled {
        /// Lockout time left, seconds.
        remaining_s: f64,
    },
}

impl Default for RobotMode {
    fn default() -> Self {
        RobotMode::Driving
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Mode manager module state.
#[derive(Default)]
pub struct ModeMgr {
    params: Params,

    report: StatusReport,

    mode: RobotMode,

    /// The hit currently locking the robot out, kept for telemetry until the
    /// lockout expires.
    hit: Option<HitEvent>,

    /// Timestamp of the previous `proc` call, used to derive the lockout dt.
    last_tick_s: Option<f64>,
}

/// Input data to the mode manager.
#[derive(Default)]
pub struct InputData {
    /// Monotonic session time of this tick, seconds.
    pub now_s: f64,

    /// The current merged drive command.
    pub cmd: DriveCommand,

    /// Session time at which the newest command datagram arrived.
    pub last_cmd_time_s: f64,

    /// Session time of the newest meaningful operator input.
    pub last_input_time_s: f64,

    /// Hits decoded since the previous tick, oldest first.
    pub hit_events: Vec<HitEvent>,
}

/// Output decisions for the rest of the control cycle.
#[derive(Clone, Copy, Serialize, Debug)]
pub struct OutputData {
    /// Mode after this tick's transitions.
    pub mode: RobotMode,

    /// True if the motor driver may execute the wheel demands.
    pub actuate: bool,

    /// True if the motor driver stage shall be energised.
    pub energise: bool,

    /// True if an IR fire request may be dispatched this tick.
    pub fire_allowed: bool,

    /// Telemetry snapshot for the command station.
    pub tm: LaserTagTm,
}

impl Default for OutputData {
    fn default() -> Self {
        OutputData {
            mode: RobotMode::default(),
            actuate: false,
            energise: true,
            fire_allowed: true,
            tm: LaserTagTm::default(),
        }
    }
}

/// Status report for ModeMgr processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// True if the motors were stopped by estop or command staleness.
    pub safety_stop: bool,

    /// True if a new hit locked the robot out this tick.
    pub hit_registered: bool,

    /// Hits discarded because the robot was already locked out.
    pub hits_ignored: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModeMgr {
    /// Build a mode manager directly from parameters, bypassing the loading
    /// in `init`. For use in tests.
    #[cfg(test)]
    pub fn with_params(params: Params) -> Self {
        ModeMgr {
            params,
            ..Default::default()
        }
    }

    /// The mode as of the last `proc` call.
    pub fn mode(&self) -> RobotMode {
        self.mode
    }

    /// Advance the hit lockout countdown and respawn when it expires.
    fn update_lockout(&mut self, dt_s: f64) {
        if let RobotMode::HitDisabled { remaining_s } = self.mode {
            let remaining_s = remaining_s - dt_s;

            if remaining_s <= 0.0 {
                info!("Hit lockout expired, respawning");
                self.mode = RobotMode::Driving;
                self.hit = None;
            } else {
                self.mode = RobotMode::HitDisabled { remaining_s };
            }
        }
    }

    /// Register decoded hits. The first hit in any non-disabled mode locks
    /// the robot out, hits taken while already disabled are discarded and do
    /// not extend the lockout.
    fn register_hits(&mut self, hit_events: &[HitEvent]) {
        for event in hit_events {
            match self.mode {
                RobotMode::HitDisabled { .. } => {
                    self.report.hits_ignored += 1;
                }
                _ => {
                    if event.is_self_hit {
                        warn!("Self hit registered, robot disabled");
                    } else {
                        warn!(
                            "Hit by team {} registered, robot disabled",
                            event.attacking_team
                        );
                    }

                    self.mode = RobotMode::HitDisabled {
                        remaining_s: self.params.hit_disable_time_s,
                    };
                    self.hit = Some(*event);
                    self.report.hit_registered = true;
                }
            }
        }
    }

    /// True if the command carries a meaningful axis demand.
    fn cmd_active(&self, cmd: &DriveCommand) -> bool {
        cmd.vx.abs() > self.params.input_deadband
            || cmd.vy.abs() > self.params.input_deadband
            || cmd.omega.abs() > self.params.input_deadband
    }
}

impl State for ModeMgr {
    type InitData = &'static str;
    type InitError = InitError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = ();

    /// Initialise the mode manager by loading its parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        self.params = params::load(init_data).map_err(InitError::ParamLoadError)?;

        info!(
            "Hit disable {} s, command timeout {} s, power save {} s, deadband {}",
            self.params.hit_disable_time_s,
            self.params.command_timeout_s,
            self.params.power_save_timeout_s,
            self.params.input_deadband
        );

        Ok(())
    }

    /// Perform cyclic processing of the mode manager.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.report = StatusReport::default();

        let dt_s = match self.last_tick_s {
            Some(prev_s) => (input_data.now_s - prev_s).max(0.0),
            None => 0.0,
        };
        self.last_tick_s = Some(input_data.now_s);

        self.update_lockout(dt_s);
        self.register_hits(&input_data.hit_events);

        let cmd = &input_data.cmd;
        let cmd_active = self.cmd_active(cmd);

        let mut output = OutputData::default();

        match self.mode {
            RobotMode::HitDisabled { remaining_s } => {
                output.actuate = false;
                output.energise = false;
                output.fire_allowed = false;

                output.tm = LaserTagTm {
                    team_id: cmd.team_id,
                    is_hit: true,
                    hit_by_team: self.hit.map(|h| h.attacking_team).unwrap_or(0),
                    time_remaining: remaining_s,
                    is_self_hit: self.hit.map(|h| h.is_self_hit).unwrap_or(false),
                };
            }
            _ => {
                let cmd_stale =
                    input_data.now_s - input_data.last_cmd_time_s > self.params.command_timeout_s;
                self.report.safety_stop = cmd.estop || cmd_stale;

                // Estop must wake the robot so a later estop release leaves
                // it commandable, hence it counts as input here
                if self.mode == RobotMode::Standby && (cmd_active || cmd.estop) {
                    info!("Operator input recieved, leaving standby");
                    self.mode = RobotMode::Driving;
                } else if self.mode == RobotMode::Driving
                    && !self.report.safety_stop
                    && input_data.now_s - input_data.last_input_time_s
                        > self.params.power_save_timeout_s
                {
                    info!(
                        "No operator input for {} s, entering standby",
                        self.params.power_save_timeout_s
                    );
                    self.mode = RobotMode::Standby;
                }

                output.actuate = self.mode == RobotMode::Driving && !self.report.safety_stop;
                output.energise = self.mode == RobotMode::Driving;
                output.fire_allowed = true;

                output.tm = LaserTagTm {
                    team_id: cmd.team_id,
                    ..Default::default()
                };
            }
        }

        output.mode = self.mode;

        Ok((output, self.report))
    }
}

// ---------------------------------------------------------------------------
// ERRORS
// ---------------------------------------------------------------------------

/// Errors which can occur during mode manager initialisation.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Could not load the mode manager parameters: {0}")]
    ParamLoadError(params::LoadError),
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn mgr() -> ModeMgr {
        ModeMgr::with_params(Params::default())
    }

    fn input(now_s: f64) -> InputData {
        InputData {
            now_s,
            cmd: DriveCommand::default(),
            last_cmd_time_s: now_s,
            last_input_time_s: now_s,
            hit_events: vec![],
        }
    }

    fn hit(now_s: f64, team: u8) -> HitEvent {
        HitEvent {
            attacking_team: team,
            received_at_s: now_s,
            is_self_hit: false,
        }
    }

    #[test]
    fn test_driving_by_default() {
        let mut m = mgr();

        let mut inp = input(0.0);
        inp.cmd.vx = 0.5;

        let (out, _) = m.proc(&inp).unwrap();

        assert_eq!(out.mode, RobotMode::Driving);
        assert!(out.actuate);
        assert!(out.energise);
        assert!(out.fire_allowed);
        assert!(!out.tm.is_hit);
    }

    #[test]
    fn test_hit_disables_and_respawns() {
        let mut m = mgr();

        m.proc(&input(0.0)).unwrap();

        let mut inp = input(1.0);
        inp.hit_events.push(hit(1.0, 3));
        let (out, report) = m.proc(&inp).unwrap();

        assert!(report.hit_registered);
        assert!(!out.actuate);
        assert!(!out.energise);
        assert!(!out.fire_allowed);
        assert!(out.tm.is_hit);
        assert_eq!(out.tm.hit_by_team, 3);
        assert_eq!(
            out.mode,
            RobotMode::HitDisabled {
                remaining_s: Params::default().hit_disable_time_s
            }
        );

        // Still locked out just before the disable time elapses
        let (out, _) = m.proc(&input(10.9)).unwrap();
        assert!(matches!(out.mode, RobotMode::HitDisabled { .. }));

        // Back in action once it has
        let (out, _) = m.proc(&input(11.1)).unwrap();
        assert_eq!(out.mode, RobotMode::Driving);
        assert!(out.fire_allowed);
        assert!(!out.tm.is_hit);
    }

    #[test]
    fn test_hit_while_disabled_does_not_extend() {
        let mut m = mgr();

        let mut inp = input(0.0);
        inp.hit_events.push(hit(0.0, 2));
        m.proc(&inp).unwrap();

        let mut inp = input(5.0);
        inp.hit_events.push(hit(5.0, 4));
        let (out, report) = m.proc(&inp).unwrap();

        assert_eq!(report.hits_ignored, 1);
        assert!(!report.hit_registered);

        // Lockout still counts down from the first hit, and telemetry keeps
        // blaming the first attacker
        match out.mode {
            RobotMode::HitDisabled { remaining_s } => {
                assert!((remaining_s - 5.0).abs() < 1e-9)
            }
            _ => panic!("expected lockout"),
        }
        assert_eq!(out.tm.hit_by_team, 2);
    }

    #[test]
    fn test_self_hit_reported_in_tm() {
        let mut m = mgr();

        let mut inp = input(0.0);
        inp.hit_events.push(HitEvent {
            attacking_team: 1,
            received_at_s: 0.0,
            is_self_hit: true,
        });
        let (out, _) = m.proc(&inp).unwrap();

        assert!(out.tm.is_hit);
        assert!(out.tm.is_self_hit);
    }

    #[test]
    fn test_command_timeout_stops_motors() {
        let mut m = mgr();

        let mut inp = input(5.0);
        inp.cmd.vx = 0.8;
        inp.last_cmd_time_s = 4.0;
        inp.last_input_time_s = 4.0;

        let (out, report) = m.proc(&inp).unwrap();

        assert!(report.safety_stop);
        assert!(!out.actuate);
        // A stale link is not a hit and not standby
        assert_eq!(out.mode, RobotMode::Driving);
        assert!(out.energise);
    }

    #[test]
    fn test_estop_stops_motors() {
        let mut m = mgr();

        let mut inp = input(0.0);
        inp.cmd.vx = 1.0;
        inp.cmd.estop = true;

        let (out, report) = m.proc(&inp).unwrap();

        assert!(report.safety_stop);
        assert!(!out.actuate);
    }

    #[test]
    fn test_standby_entry_and_single_exit() {
        let mut m = mgr();

        m.proc(&input(0.0)).unwrap();

        // Datagrams keep arriving but the sticks have sat idle too long
        let mut inp = input(11.0);
        inp.last_input_time_s = 0.0;
        let (out, _) = m.proc(&inp).unwrap();

        assert_eq!(out.mode, RobotMode::Standby);
        assert!(!out.actuate);
        assert!(!out.energise);

        // Idle commands keep it in standby
        let mut inp = input(12.0);
        inp.last_input_time_s = 0.0;
        let (out, _) = m.proc(&inp).unwrap();
        assert_eq!(out.mode, RobotMode::Standby);

        // The first meaningful command wakes it
        let mut inp = input(13.0);
        inp.cmd.vy = 0.5;
        let (out, _) = m.proc(&inp).unwrap();
        assert_eq!(out.mode, RobotMode::Driving);
        assert!(out.actuate);

        // And it stays awake on the next one, no repeated transition
        let mut inp = input(13.02);
        inp.cmd.vy = 0.5;
        let (out, _) = m.proc(&inp).unwrap();
        assert_eq!(out.mode, RobotMode::Driving);
    }

    #[test]
    fn test_below_deadband_does_not_wake() {
        let mut m = mgr();

        m.proc(&input(0.0)).unwrap();

        let mut inp = input(11.0);
        inp.last_input_time_s = 0.0;
        m.proc(&inp).unwrap();

        // Stick noise under the deadband is not operator input
        let mut inp = input(12.0);
        inp.last_input_time_s = 0.0;
        inp.cmd.vx = 0.02;
        let (out, _) = m.proc(&inp).unwrap();
        assert_eq!(out.mode, RobotMode::Standby);
    }

    #[test]
    fn test_estop_wakes_from_standby() {
        let mut m = mgr();

        m.proc(&input(0.0)).unwrap();

        let mut inp = input(11.0);
        inp.last_input_time_s = 0.0;
        m.proc(&inp).unwrap();
        assert_eq!(m.mode(), RobotMode::Standby);

        let mut inp = input(12.0);
        inp.cmd.estop = true;
        let (out, _) = m.proc(&inp).unwrap();

        // Awake but still stopped by the estop itself
        assert_eq!(out.mode, RobotMode::Driving);
        assert!(!out.actuate);
        assert!(out.energise);
    }

    #[test]
    fn test_hit_wins_over_everything() {
        let mut m = mgr();

        // Standby first
        m.proc(&input(0.0)).unwrap();
        let mut inp = input(11.0);
        inp.last_input_time_s = 0.0;
        m.proc(&inp).unwrap();

        // A hit while in standby still locks the robot out
        let mut inp = input(12.0);
        inp.cmd.vx = 1.0;
        inp.hit_events.push(hit(12.0, 7));
        let (out, _) = m.proc(&inp).unwrap();

        assert!(matches!(out.mode, RobotMode::HitDisabled { .. }));
        assert!(!out.actuate);
        assert!(!out.fire_allowed);
    }
}
