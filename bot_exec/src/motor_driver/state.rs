//! # Motor driver module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use thiserror::Error;

// Internal
use super::{Params, ParamsError};
use crate::drive_ctrl::NUM_WHEELS;
use crate::gpio::{GpioDriver, Level};
use util::{maths, module::State, params, session::Session};

use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Demands smaller than this stop the channel entirely.
const STOP_EPSILON: f64 = 1e-3;

/// Settling time after re-energising the driver stage before demands are
/// applied.
const ENERGISE_SETTLE_MS: u64 = 10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motor driver module state.
#[derive(Default)]
pub struct MotorDriver {
    params: Params,
    report: StatusReport,

    driver: Option<Arc<dyn GpioDriver>>,

    /// True while the STBY lines hold the driver stage energised.
    energised: bool,
}

/// Input data to the motor driver.
#[derive(Default, Clone, Copy)]
pub struct InputData {
    /// If false all channels are stopped regardless of the wheel demands
    /// (safety stop: estop, command timeout, hit-disable).
    pub actuate: bool,

    /// If false the driver stage is de-energised via the STBY lines
    /// (standby and hit-disable, distinct from merely zeroing PWM).
    pub energise: bool,

    /// Normalised wheel demands in [-1, +1], order FL, FR, RL, RR.
    pub wheel_norm: [f64; NUM_WHEELS],
}

/// Status report for motor driver processing.
#[derive(Default, Copy, Clone)]
pub struct StatusReport {
    /// Number of GPIO writes that failed this cycle. Failed writes are
    /// logged and skipped, they never abort the cycle.
    pub num_write_errors: u32,
}

// ---------------------------------------------------------------------------
// ENUEMRATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Loaded parameters are invalid: {0}")]
    ParamsInvalid(ParamsError),
}

#[derive(Debug, Error)]
pub enum ProcError {
    #[error("The motor driver has not been initialised")]
    NotInitialised,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MotorDriver {
    type InitData = (&'static str, Arc<dyn GpioDriver>);
    type InitError = InitError;

    type InputData = InputData;
    type OutputData = ();
    type StatusReport = StatusReport;
    type ProcError = ProcError;

    /// Initialise the motor driver.
    ///
    /// Expected init data is the path to the module parameters file and the
    /// GPIO driver handle. All motor pins are put into a known (stopped)
    /// state and the driver stage is energised.
    fn init(
        &mut self,
        (param_path, driver): Self::InitData,
        _session: &Session,
    ) -> Result<(), Self::InitError> {
        self.params = params::load(param_path).map_err(InitError::ParamLoadError)?;
        self.params.are_valid().map_err(InitError::ParamsInvalid)?;

        self.driver = Some(driver);

        self.energise();
        self.stop_all();

        Ok(())
    }

    /// Cyclic processing for the motor driver.
    ///
    /// Applies the wheel demands from DriveCtrl to the H-bridges, honouring
    /// the safety stop and standby flags. Transient hardware write failures
    /// are logged and treated as no-ops for this cycle - the tick itself
    /// never fails once initialised.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        if self.driver.is_none() {
            return Err(ProcError::NotInitialised);
        }

        self.report = StatusReport::default();

        // Handle standby edge transitions first
        if input_data.energise && !self.energised {
            self.energise();
        } else if !input_data.energise && self.energised {
            self.stop_all();
            self.de_energise();
        }

        if !input_data.actuate || !self.energised {
            self.stop_all();
        } else {
            for i in 0..NUM_WHEELS {
                self.apply_channel(i, input_data.wheel_norm[i]);
            }

            trace!("Motor demands out: {:?}", input_data.wheel_norm);
        }

        Ok(((), self.report))
    }
}

impl MotorDriver {
    /// Build a motor driver from already-loaded parameters, bypassing the
    /// parameter file machinery.
    pub fn with_params(params: Params, driver: Arc<dyn GpioDriver>) -> Self {
        let mut md = MotorDriver {
            params,
            report: StatusReport::default(),
            driver: Some(driver),
            energised: false,
        };

        md.energise();
        md.stop_all();

        md
    }

    /// Apply one wheel's normalised demand to its H-bridge channel.
    ///
    /// The sign selects the direction pins, the magnitude the duty: below
    /// the pure-DC threshold the duty is floored and PWM'd, at or above it
    /// the enable pin is driven fully on.
    fn apply_channel(&mut self, idx: usize, norm: f64) {
        let ch = &self.params.channels[idx];
        let en_pin = ch.en_pin;
        let in1_pin = ch.in1_pin;
        let in2_pin = ch.in2_pin;

        let norm = maths::clamp(&norm, &-1.0, &1.0) * ch.dir_sign;

        if norm.abs() < STOP_EPSILON {
            self.write_pwm(en_pin, 0);
            self.write_level(in1_pin, Level::Low);
            self.write_level(in2_pin, Level::Low);
            return;
        }

        let forward = norm > 0.0;
        self.write_level(in1_pin, if forward { Level::High } else { Level::Low });
        self.write_level(in2_pin, if forward { Level::Low } else { Level::High });

        let pct = (norm.abs() * 100.0) as u32;
        if pct >= self.params.pure_dc_threshold_pct as u32 {
            // Fully on, bypass PWM to avoid switching losses
            self.write_level(en_pin, Level::High);
        } else {
            let pct = pct.max(self.params.min_duty_floor_pct as u32);
            self.write_pwm(en_pin, (pct * 255 / 100) as u8);
        }
    }

    /// Stop every motor channel: zero duty, both direction pins low.
    pub fn stop_all(&mut self) {
        for i in 0..self.params.channels.len() {
            let (en, in1, in2) = {
                let ch = &self.params.channels[i];
                (ch.en_pin, ch.in1_pin, ch.in2_pin)
            };
            self.write_pwm(en, 0);
            self.write_level(in1, Level::Low);
            self.write_level(in2, Level::Low);
        }
    }

    /// Energise the motor driver stage via the STBY lines.
    pub fn energise(&mut self) {
        if self.energised {
            return;
        }

        info!("Energising motor driver stage");

        let stby_pins = self.params.stby_pins.clone();
        for pin in stby_pins {
            self.write_level(pin, Level::High);
        }
        self.energised = true;

        // Give the driver stage time to come up before demands hit it
        thread::sleep(Duration::from_millis(ENERGISE_SETTLE_MS));
    }

    /// De-energise the motor driver stage entirely.
    pub fn de_energise(&mut self) {
        if !self.energised {
            return;
        }

        info!("De-energising motor driver stage");

        let stby_pins = self.params.stby_pins.clone();
        for pin in stby_pins {
            self.write_level(pin, Level::Low);
        }
        self.energised = false;
    }

    /// Deterministically stop and de-energise everything. Called on process
    /// shutdown regardless of the current mode.
    pub fn safe_shutdown(&mut self) {
        self.stop_all();
        self.de_energise();
    }

    /// True while the STBY lines hold the driver stage energised.
    pub fn is_energised(&self) -> bool {
        self.energised
    }

    fn write_level(&mut self, pin: u8, level: Level) {
        if let Some(ref driver) = self.driver {
            if let Err(e) = driver.set_output(pin, level) {
                warn!("Motor pin write failed: {}", e);
                self.report.num_write_errors += 1;
            }
        }
    }

    fn write_pwm(&mut self, pin: u8, duty: u8) {
        if let Some(ref driver) = self.driver {
            if let Err(e) = driver.set_pwm_duty(pin, duty) {
                warn!("Motor PWM write failed: {}", e);
                self.report.num_write_errors += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_ctrl::{WHEEL_FL, WHEEL_FR};
    use crate::gpio::sim::SimDriver;
    use crate::motor_driver::ChannelParams;

    fn test_params() -> Params {
        let corners = ["FL", "FR", "RL", "RR"];
        Params {
            channels: (0..4)
                .map(|i| ChannelParams {
                    corner: corners[i].into(),
                    en_pin: 10 + i as u8,
                    in1_pin: 20 + i as u8,
                    in2_pin: 30 + i as u8,
                    dir_sign: 1.0,
                })
                .collect(),
            stby_pins: vec![9, 11],
            pure_dc_threshold_pct: 80,
            min_duty_floor_pct: 30,
        }
    }

    fn driver_pair() -> (Arc<SimDriver>, MotorDriver) {
        let sim = Arc::new(SimDriver::new());
        let md = MotorDriver::with_params(test_params(), sim.clone());
        (sim, md)
    }

    fn input(actuate: bool, energise: bool, wheel_norm: [f64; NUM_WHEELS]) -> InputData {
        InputData {
            actuate,
            energise,
            wheel_norm,
        }
    }

    #[test]
    fn test_init_energises_and_stops() {
        let (sim, md) = driver_pair();

        assert!(md.is_energised());
        assert_eq!(sim.pin_state(9).unwrap().level, Level::High);
        assert_eq!(sim.pin_state(11).unwrap().level, Level::High);

        // FL channel stopped
        assert_eq!(sim.pin_state(10).unwrap().duty, 0);
        assert_eq!(sim.pin_state(20).unwrap().level, Level::Low);
        assert_eq!(sim.pin_state(30).unwrap().level, Level::Low);
    }

    #[test]
    fn test_pwm_regime_with_floor() {
        let (sim, mut md) = driver_pair();

        // 50% demand is under the pure-DC threshold: PWM at 50% of 255
        let mut wheels = [0.0; NUM_WHEELS];
        wheels[WHEEL_FL] = 0.5;
        md.proc(&input(true, true, wheels)).unwrap();
        assert_eq!(sim.pin_state(10).unwrap().duty, 127);
        assert_eq!(sim.pin_state(20).unwrap().level, Level::High);
        assert_eq!(sim.pin_state(30).unwrap().level, Level::Low);

        // 10% demand is floored up to the 30% minimum duty
        wheels[WHEEL_FL] = 0.1;
        md.proc(&input(true, true, wheels)).unwrap();
        assert_eq!(sim.pin_state(10).unwrap().duty, 76);
    }

    #[test]
    fn test_pure_dc_regime() {
        let (sim, mut md) = driver_pair();

        let mut wheels = [0.0; NUM_WHEELS];
        wheels[WHEEL_FL] = 0.9;
        md.proc(&input(true, true, wheels)).unwrap();

        // Enable pin driven as a plain digital high, no PWM
        let en = sim.pin_state(10).unwrap();
        assert_eq!(en.level, Level::High);
        assert_eq!(en.duty, 0);
    }

    #[test]
    fn test_reverse_selects_direction_pins() {
        let (sim, mut md) = driver_pair();

        let mut wheels = [0.0; NUM_WHEELS];
        wheels[WHEEL_FR] = -0.5;
        md.proc(&input(true, true, wheels)).unwrap();

        assert_eq!(sim.pin_state(21).unwrap().level, Level::Low);
        assert_eq!(sim.pin_state(31).unwrap().level, Level::High);
    }

    #[test]
    fn test_dir_sign_flips_direction() {
        let sim = Arc::new(SimDriver::new());
        let mut params = test_params();
        params.channels[WHEEL_FL].dir_sign = -1.0;
        let mut md = MotorDriver::with_params(params, sim.clone());

        let mut wheels = [0.0; NUM_WHEELS];
        wheels[WHEEL_FL] = 0.5;
        md.proc(&input(true, true, wheels)).unwrap();

        // A positive demand on a reversed channel drives it backwards
        assert_eq!(sim.pin_state(20).unwrap().level, Level::Low);
        assert_eq!(sim.pin_state(30).unwrap().level, Level::High);
    }

    #[test]
    fn test_near_zero_demand_stops_channel() {
        let (sim, mut md) = driver_pair();

        let mut wheels = [0.0; NUM_WHEELS];
        wheels[WHEEL_FL] = 5e-4;
        md.proc(&input(true, true, wheels)).unwrap();

        assert_eq!(sim.pin_state(10).unwrap().duty, 0);
        assert_eq!(sim.pin_state(20).unwrap().level, Level::Low);
        assert_eq!(sim.pin_state(30).unwrap().level, Level::Low);
    }

    #[test]
    fn test_safety_stop_overrides_demands() {
        let (sim, mut md) = driver_pair();

        let wheels = [0.7; NUM_WHEELS];
        md.proc(&input(true, true, wheels)).unwrap();
        assert_eq!(sim.pin_state(20).unwrap().level, Level::High);

        // actuate false stops everything even with a nonzero cached demand
        md.proc(&input(false, true, wheels)).unwrap();
        for i in 0..4u8 {
            assert_eq!(sim.pin_state(10 + i).unwrap().duty, 0);
            assert_eq!(sim.pin_state(20 + i).unwrap().level, Level::Low);
        }
    }

    #[test]
    fn test_standby_de_energises_stage() {
        let (sim, mut md) = driver_pair();

        md.proc(&input(false, false, [0.0; NUM_WHEELS])).unwrap();
        assert!(!md.is_energised());
        assert_eq!(sim.pin_state(9).unwrap().level, Level::Low);
        assert_eq!(sim.pin_state(11).unwrap().level, Level::Low);

        // Waking re-energises before driving
        md.proc(&input(true, true, [0.0; NUM_WHEELS])).unwrap();
        assert!(md.is_energised());
        assert_eq!(sim.pin_state(9).unwrap().level, Level::High);
    }

    #[test]
    fn test_safe_shutdown() {
        let (sim, mut md) = driver_pair();

        md.proc(&input(true, true, [0.5; NUM_WHEELS])).unwrap();
        md.safe_shutdown();

        assert!(!md.is_energised());
        for i in 0..4u8 {
            assert_eq!(sim.pin_state(10 + i).unwrap().duty, 0);
        }
        assert_eq!(sim.pin_state(9).unwrap().level, Level::Low);
    }
}
