//! Parameters structure for the IR codec

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the IR codec.
#[derive(Debug, Deserialize)]
pub struct IrParams {
    /// BCM pin driving the IR emitter.
    pub tx_pin: u8,

    /// BCM pins of the IR demodulator modules. Each pin gets its own
    /// independent decoder.
    pub rx_pins: Vec<u8>,

    /// If true hits decoding to this robot's own team id are accepted as
    /// full hit events (useful on the bench, a robot can shoot itself to
    /// exercise the whole chain). If false self-hits are discarded.
    pub accept_self_hits: bool,
}

impl Default for IrParams {
    fn default() -> Self {
        IrParams {
            tx_pin: 17,
            rx_pins: vec![4, 27, 12],
            accept_self_hits: true,
        }
    }
}
