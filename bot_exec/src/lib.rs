//! # Laser Tag Robot Library
//!
//! Control-core library for the robot-side executable. See the crate's
//! `main.rs` for the composition root and cyclic architecture description.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Shared data store for the executable.
pub mod data_store;

/// Mecanum drive kinematics module.
pub mod drive_ctrl;

/// GPIO and precision timing driver boundary.
pub mod gpio;

/// Infrared hit-signal codec (transmit and receive).
pub mod ir_codec;

/// Robot session mode state machine.
pub mod mode_mgr;

/// Motor H-bridge driver module.
pub mod motor_driver;

/// UDP drive-command server.
pub mod cmd_server;

/// Opaque video streaming subprocess wrapper.
pub mod video_stream;
