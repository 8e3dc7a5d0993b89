//! Robot-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop (50 Hz):
//!         - Drain decoded IR hit events
//!         - Snapshot the latest drive command
//!         - Mode manager processing (hit lockout, standby, safety stops)
//!         - Drive control processing (mecanum kinematics)
//!         - Motor driver execution
//!         - IR fire dispatch
//!         - Telemetry publication
//!
//! Everything event-driven (UDP commands, IR edges, IR transmission, video)
//! runs on its own thread and meets the loop only through shared cells and
//! channels, so the tick itself never blocks.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use bot_lib::{
    cmd_server::{self, CmdCell},
    data_store::DataStore,
    drive_ctrl, gpio,
    ir_codec::{self, HitEvent, IrTransmitter},
    mode_mgr, motor_driver, video_stream,
};
use comms_if::tm::LaserTagTm;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};

// Internal
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.02;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

/// Frequency of the H-bridge enable pin PWM.
#[cfg_attr(not(target_arch = "arm"), allow(dead_code))]
const MOTOR_PWM_FREQ_HZ: f64 = 10_000.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("bot_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Laser Tag Robot Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let net_params: cmd_server::Params =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    let ir_params: ir_codec::IrParams =
        util::params::load("ir_codec.toml").wrap_err("Could not load IR codec params")?;

    let video_params: video_stream::Params =
        util::params::load("video_stream.toml").wrap_err("Could not load video stream params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE GPIO DRIVER ----

    #[cfg(target_arch = "arm")]
    let gpio_driver: Arc<dyn gpio::GpioDriver> = Arc::new(
        gpio::hw::HwDriver::new(MOTOR_PWM_FREQ_HZ)
            .wrap_err("Failed to connect to the GPIO peripheral")?,
    );

    #[cfg(not(target_arch = "arm"))]
    let gpio_driver: Arc<dyn gpio::GpioDriver> = {
        info!("Not running on the robot, using the simulated GPIO driver");
        Arc::new(gpio::sim::SimDriver::new())
    };

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    ds.mode_mgr
        .init("mode_mgr.toml", &session)
        .wrap_err("Failed to initialise ModeMgr")?;
    info!("ModeMgr init complete");

    ds.drive_ctrl
        .init((), &session)
        .map_err(|_| color_eyre::eyre::eyre!("Failed to initialise DriveCtrl"))?;
    info!("DriveCtrl init complete");

    ds.motor_driver
        .init(("motor_driver.toml", gpio_driver.clone()), &session)
        .wrap_err("Failed to initialise MotorDriver")?;
    info!("MotorDriver init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE IR CODEC ----

    // The receive-side decoders need to know our own team id to tell self
    // hits from enemy hits, and the id can change with any command, so it
    // lives in a shared atomic the loop keeps up to date.
    let own_team = Arc::new(AtomicU8::new(comms_if::cmd::DriveCommand::default().team_id));

    let ir_tx = IrTransmitter::new(gpio_driver.clone(), ir_params.tx_pin);

    let (hit_tx, hit_rx) = mpsc::channel::<HitEvent>();

    for pin in &ir_params.rx_pins {
        ir_codec::attach_receiver(
            &gpio_driver,
            *pin,
            own_team.clone(),
            ir_params.accept_self_hits,
            hit_tx.clone(),
        )
        .wrap_err_with(|| format!("Failed to attach the IR receiver on pin {}", pin))?;
        info!("IR receiver attached on pin {}", pin);
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let cmd_cell = Arc::new(Mutex::new(CmdCell::default()));
    let tm_cell = Arc::new(Mutex::new(LaserTagTm::default()));

    cmd_server::spawn(net_params, cmd_cell.clone(), tm_cell.clone())
        .wrap_err("Failed to start the command server")?;

    info!("Network initialisation complete");

    // ---- START VIDEO ----

    let mut video = video_stream::VideoStream::new(video_params);

    // Video is best effort, the robot drives fine without it
    if let Err(e) = video.start() {
        warn!("Video stream unavailable: {}", e);
    }

    // ---- SIGNAL HANDLING ----

    let run = Arc::new(AtomicBool::new(true));
    {
        let run = run.clone();
        ctrlc::set_handler(move || {
            run.store(false, Ordering::SeqCst);
        })
        .wrap_err("Failed to install the shutdown handler")?;
    }

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    while run.load(Ordering::SeqCst) {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(CYCLE_FREQUENCY_HZ);

        // ---- DATA INPUT ----

        // Drain all hits decoded since the last tick
        while let Ok(event) = hit_rx.try_recv() {
            ds.hit_events.push(event);
        }

        // Snapshot the latest merged command
        let cmd_snapshot = *cmd_server::lock_cell(&cmd_cell);

        // Keep the decoders' view of our team id current
        own_team.store(cmd_snapshot.cmd.team_id, Ordering::SeqCst);

        // ---- CONTROL ALGORITHM PROCESSING ----

        // ModeMgr processing
        ds.mode_mgr_input = mode_mgr::InputData {
            now_s: ds.cycle_start_time_s,
            cmd: cmd_snapshot.cmd,
            last_cmd_time_s: cmd_snapshot.last_cmd_time_s,
            last_input_time_s: cmd_snapshot.last_input_time_s,
            hit_events: ds.hit_events.clone(),
        };

        if let Ok((o, r)) = ds.mode_mgr.proc(&ds.mode_mgr_input) {
            ds.mode_mgr_output = o;
            ds.mode_mgr_status_rpt = r;
        }

        // DriveCtrl processing
        ds.drive_ctrl_input = drive_ctrl::InputData {
            cmd: cmd_snapshot.cmd,
        };

        if let Ok((o, r)) = ds.drive_ctrl.proc(&ds.drive_ctrl_input) {
            ds.drive_ctrl_output = o;
            ds.drive_ctrl_status_rpt = r;
        }

        // MotorDriver execution
        ds.motor_driver_input = motor_driver::InputData {
            actuate: ds.mode_mgr_output.actuate,
            energise: ds.mode_mgr_output.energise,
            wheel_norm: ds.drive_ctrl_output.wheel_norm,
        };

        match ds.motor_driver.proc(&ds.motor_driver_input) {
            Ok((_, r)) => ds.motor_driver_status_rpt = r,
            Err(e) => warn!("Error during MotorDriver processing: {}", e),
        }

        // ---- IR FIRE DISPATCH ----

        if cmd_snapshot.cmd.fire && ds.mode_mgr_output.fire_allowed {
            // Dropped requests (transmission already in flight) are fine,
            // the operator is just holding the trigger
            ir_tx.fire(cmd_snapshot.cmd.team_id);
        }

        // ---- TELEMETRY ----

        ds.tm = ds.mode_mgr_output.tm;
        *cmd_server::lock_cell(&tm_cell) = ds.tm;

        if ds.is_1_hz_cycle {
            debug!(
                "Mode: {:?}, cmd age: {:.02} s, overruns: {}",
                ds.mode_mgr_output.mode,
                ds.cycle_start_time_s - cmd_snapshot.last_cmd_time_s,
                ds.num_consec_cycle_overruns
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("Shutdown requested");

    // Stop and de-energise the motors before anything else
    ds.motor_driver.safe_shutdown();

    video.stop();

    info!("End of execution");

    Ok(())
}
