//! # Infrared Hit-Signal Codec
//!
//! The laser tag "shot" is an 8-bit team identifier carried as a framed
//! sequence of timed infrared bursts. Each burst is a 38 kHz
//! carrier-modulated interval whose duration encodes one protocol symbol:
//!
//! | Symbol      | Burst duration |
//! |-------------|----------------|
//! | `StartEnd`  | 2400 us        |
//! | `Bit1`      | 1600 us        |
//! | `Bit0`      | 800 us         |
//!
//! A frame is exactly 10 bursts: START, bit7..bit0 (MSB first), END, with an
//! ~800 us quiet gap between bursts so the receiver's demodulator can
//! settle. Received bursts classify by nearest match within +/-200 us; any
//! miss invalidates the whole frame.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod decode;
mod encode;
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

pub use decode::*;
pub use encode::*;
pub use params::*;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// IR carrier frequency.
pub const CARRIER_FREQ_HZ: u64 = 38_000;

/// Period of one carrier cycle.
pub const CARRIER_PERIOD_US: u64 = 1_000_000 / CARRIER_FREQ_HZ;

/// Burst duration of the frame start/end marker.
pub const START_END_BURST_US: u32 = 2400;

/// Burst duration of a one bit.
pub const BIT_1_BURST_US: u32 = 1600;

/// Burst duration of a zero bit.
pub const BIT_0_BURST_US: u32 = 800;

/// Maximum deviation from the nominal burst duration which still classifies.
pub const SYMBOL_TOLERANCE_US: u32 = 200;

/// Quiet gap inserted between transmitted bursts.
pub const SYMBOL_GAP_US: u64 = 800;

/// Number of bursts in a complete frame.
pub const FRAME_LEN: usize = 10;

/// A silence longer than this between received bursts marks the start of a
/// new transmission attempt; any partially buffered bursts are stale.
pub const FRAME_GAP_US: u64 = 100_000;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The three protocol symbols a burst duration can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrSymbol {
    StartEnd,
    Bit1,
    Bit0,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A fully decoded hit received from an opponent (or from this robot itself,
/// see [`IrParams::accept_self_hits`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitEvent {
    /// The team id decoded from the frame.
    pub attacking_team: u8,

    /// Monotonic receive timestamp in seconds.
    pub received_at_s: f64,

    /// True if `attacking_team` matches this robot's own team id.
    pub is_self_hit: bool,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Classify a measured burst duration into a protocol symbol.
///
/// Returns `None` if the duration is outside tolerance of every symbol,
/// which invalidates the frame it belongs to.
pub fn classify(burst_us: u32) -> Option<IrSymbol> {
    let within = |nominal: u32| -> bool {
        let delta = if burst_us > nominal {
            burst_us - nominal
        } else {
            nominal - burst_us
        };
        delta <= SYMBOL_TOLERANCE_US
    };

    if within(START_END_BURST_US) {
        Some(IrSymbol::StartEnd)
    } else if within(BIT_1_BURST_US) {
        Some(IrSymbol::Bit1)
    } else if within(BIT_0_BURST_US) {
        Some(IrSymbol::Bit0)
    } else {
        None
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify_nominal() {
        assert_eq!(classify(START_END_BURST_US), Some(IrSymbol::StartEnd));
        assert_eq!(classify(BIT_1_BURST_US), Some(IrSymbol::Bit1));
        assert_eq!(classify(BIT_0_BURST_US), Some(IrSymbol::Bit0));
    }

    #[test]
    fn test_classify_tolerance_boundary() {
        // Exactly on the tolerance edge still classifies
        assert_eq!(classify(BIT_0_BURST_US + SYMBOL_TOLERANCE_US), Some(IrSymbol::Bit0));
        assert_eq!(classify(BIT_0_BURST_US - SYMBOL_TOLERANCE_US), Some(IrSymbol::Bit0));

        // One microsecond past it classifies as nothing at all
        assert_eq!(classify(BIT_0_BURST_US + SYMBOL_TOLERANCE_US + 1), None);
        assert_eq!(classify(BIT_1_BURST_US - SYMBOL_TOLERANCE_US - 1), None);
    }

    #[test]
    fn test_classify_garbage() {
        assert_eq!(classify(0), None);
        assert_eq!(classify(400), None);
        assert_eq!(classify(3200), None);
    }
}
