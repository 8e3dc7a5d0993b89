//! # Communications Interface
//!
//! This crate defines the wire formats exchanged between the robot and the
//! operator station. All messages are JSON objects carried in single UDP
//! datagrams: one drive-command message per control update in, one telemetry
//! response out.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod cmd;
pub mod tm;
