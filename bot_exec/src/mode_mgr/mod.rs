//! Robot session mode manager
//!
//! Owns the authoritative session state (driving / power-save standby /
//! hit-disabled) and the timers driving transitions between them. Evaluated
//! exactly once per control tick - the tick is the single writer of the
//! mode, all other threads only produce the inputs.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;
