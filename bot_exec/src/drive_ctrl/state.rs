//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use super::{calc_mecanum, NUM_WHEELS};
use comms_if::cmd::DriveCommand;
use util::{maths, module::State, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state.
///
/// The kinematics themselves are stateless, the struct exists to fit the
/// cyclic module pattern and to keep the last output for inspection.
#[derive(Default)]
pub struct DriveCtrl {
    report: StatusReport,

    output: Option<OutputData>,
}

/// Input data to drive control.
#[derive(Default)]
pub struct InputData {
    /// The most recent drive command.
    pub cmd: DriveCommand,
}

/// Output wheel demands the motor driver must execute.
#[derive(Clone, Copy, Serialize, Debug, PartialEq)]
pub struct OutputData {
    /// Normalised wheel demands in [-1, +1], order FL, FR, RL, RR.
    pub wheel_norm: [f64; NUM_WHEELS],
}

impl Default for OutputData {
    fn default() -> Self {
        OutputData {
            wheel_norm: [0.0; NUM_WHEELS],
        }
    }
}

/// Status report for DriveCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// True if the raw kinematic sums exceeded unit magnitude and were
    /// normalised down on this cycle.
    pub saturated: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for DriveCtrl {
    type InitData = ();
    type InitError = ();

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = ();

    /// Initialise the DriveCtrl module. The kinematics carry no parameters.
    fn init(&mut self, _init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        Ok(())
    }

    /// Perform cyclic processing of drive control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.report = StatusReport::default();

        let cmd = &input_data.cmd;

        // Clamp the axes to their normalised range before the kinematics,
        // an out of range station command must not over-drive a wheel
        let vx = maths::clamp(&cmd.vx, &-1.0, &1.0);
        let vy = maths::clamp(&cmd.vy, &-1.0, &1.0);
        let omega = maths::clamp(&cmd.omega, &-1.0, &1.0);

        let raw_max = (vy + vx + omega)
            .abs()
            .max((-vy + vx - omega).abs())
            .max((-vy + vx + omega).abs())
            .max((vy + vx - omega).abs());
        self.report.saturated = raw_max > 1.0;

        let output = OutputData {
            wheel_norm: calc_mecanum(vx, vy, omega, cmd.speed),
        };

        trace!("DriveCtrl output: {:?}", output.wheel_norm);

        self.output = Some(output);

        Ok((output, self.report))
    }
}
