//! Host platform (linux for example) utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::PathBuf;
use uname;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the root directory of the laser tag software installation.
///
/// The root is pointed to by the `LTAG_SW_ROOT` environment variable, and is
/// the base for both the `params` and `sessions` directories.
pub fn get_ltag_sw_root() -> Result<PathBuf, std::env::VarError> {
    let root = std::env::var("LTAG_SW_ROOT")?;
    Ok(PathBuf::from(root))
}
