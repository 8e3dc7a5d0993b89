//! IR burst decoding
//!
//! One [`BurstDecoder`] runs per physical receiver pin. The decoder itself
//! is a pure state machine fed with edge timestamps, so the whole receive
//! chain is testable without any hardware callback mechanism;
//! [`attach_receiver`] binds a decoder to a driver interrupt and publishes
//! the resulting [`HitEvent`]s onto a channel for the control loop.
//!
//! Multiple receivers operate independently and each independently raises
//! hit events - simultaneous decodes of the same physical shot are NOT
//! deduplicated across receivers.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use super::{classify, HitEvent, IrSymbol, FRAME_GAP_US, FRAME_LEN};
use crate::gpio::{GpioDriver, GpioError, Level};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Burst-buffering decoder state machine for one receiver pin.
pub struct BurstDecoder {
    /// This robot's own team id, shared with the control loop which updates
    /// it as commands change it.
    own_team: Arc<AtomicU8>,

    /// If false, frames decoding to our own team id are discarded.
    accept_self_hits: bool,

    /// Measured burst durations of the current transmission attempt.
    bursts: Vec<u32>,

    /// Timestamp of the falling edge that started the burst in progress.
    burst_start_us: Option<u64>,

    /// Timestamp at which the previous burst completed.
    last_burst_end_us: Option<u64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BurstDecoder {
    pub fn new(own_team: Arc<AtomicU8>, accept_self_hits: bool) -> Self {
        Self {
            own_team,
            accept_self_hits,
            bursts: Vec::with_capacity(FRAME_LEN),
            burst_start_us: None,
            last_burst_end_us: None,
        }
    }

    /// Feed one edge into the decoder.
    ///
    /// The receiver output is active low: a falling edge starts a burst, the
    /// following rising edge completes it and yields its measured width.
    /// Returns a [`HitEvent`] the instant the 10th burst of a valid frame
    /// completes, `None` otherwise. Invalid frames are discarded silently.
    pub fn feed_edge(&mut self, level: Level, timestamp_us: u64) -> Option<HitEvent> {
        match level {
            Level::Low => {
                self.burst_start_us = Some(timestamp_us);
                None
            }
            Level::High => {
                let start_us = self.burst_start_us.take()?;
                let width_us = timestamp_us.saturating_sub(start_us) as u32;

                // Gap rule: a long silence means whatever was buffered
                // belongs to an already-failed transmission
                if let Some(prev_end_us) = self.last_burst_end_us {
                    if timestamp_us.saturating_sub(prev_end_us) > FRAME_GAP_US
                        && !self.bursts.is_empty()
                    {
                        debug!(
                            "Discarding {} stale burst(s) after transmission gap",
                            self.bursts.len()
                        );
                        self.bursts.clear();
                    }
                }

                self.bursts.push(width_us);
                self.last_burst_end_us = Some(timestamp_us);

                // Completion rule: at exactly FRAME_LEN bursts decode
                // immediately, clearing the buffer whatever the outcome
                if self.bursts.len() == FRAME_LEN {
                    let decoded = decode_frame(&self.bursts);
                    self.bursts.clear();
                    decoded.and_then(|team| self.build_event(team, timestamp_us))
                } else {
                    None
                }
            }
        }
    }

    /// Turn a decoded team id into a hit event, applying the self-hit policy.
    fn build_event(&self, attacking_team: u8, timestamp_us: u64) -> Option<HitEvent> {
        let is_self_hit = attacking_team == self.own_team.load(Ordering::Relaxed);

        if is_self_hit && !self.accept_self_hits {
            debug!("Discarding self-hit from team {}", attacking_team);
            return None;
        }

        Some(HitEvent {
            attacking_team,
            received_at_s: timestamp_us as f64 / 1e6,
            is_self_hit,
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Decode a complete buffer of burst widths into a team id.
///
/// Both endpoint bursts must classify as start/end markers and all eight
/// interior bursts as bit symbols; any classification miss aborts the
/// decode. Bits arrive MSB first.
pub fn decode_frame(bursts: &[u32]) -> Option<u8> {
    if bursts.len() != FRAME_LEN {
        return None;
    }

    match (classify(bursts[0]), classify(bursts[FRAME_LEN - 1])) {
        (Some(IrSymbol::StartEnd), Some(IrSymbol::StartEnd)) => (),
        _ => return None,
    }

    let mut team_id = 0u8;
    for i in 1..=8 {
        let bit_pos = 7 - (i - 1);
        match classify(bursts[i]) {
            Some(IrSymbol::Bit1) => team_id |= 1 << bit_pos,
            Some(IrSymbol::Bit0) => (),
            _ => return None,
        }
    }

    Some(team_id)
}

/// Bind a decoder to a receiver pin's edge interrupt.
///
/// Decoded hits are published into `hit_tx`; the channel is the only point
/// of contact between the interrupt context and the control loop.
pub fn attach_receiver(
    driver: &Arc<dyn GpioDriver>,
    pin: u8,
    own_team: Arc<AtomicU8>,
    accept_self_hits: bool,
    hit_tx: Sender<HitEvent>,
) -> Result<(), GpioError> {
    let mut decoder = BurstDecoder::new(own_team, accept_self_hits);

    driver.register_edge_callback(
        pin,
        Box::new(move |level, timestamp_us| {
            if let Some(event) = decoder.feed_edge(level, timestamp_us) {
                // The receive side can only fail if the control loop is gone,
                // in which case there is nobody left to disable
                hit_tx.send(event).ok();
            }
        }),
    )
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir_codec::{encode_frame, BIT_0_BURST_US, SYMBOL_GAP_US, SYMBOL_TOLERANCE_US};

    /// Feed a sequence of burst widths into the decoder as zero-jitter
    /// edges, starting at `start_us`, returning the last event produced and
    /// the timestamp after the final burst.
    fn feed_bursts(
        decoder: &mut BurstDecoder,
        bursts: &[u32],
        start_us: u64,
    ) -> (Option<HitEvent>, u64) {
        let mut t = start_us;
        let mut event = None;

        for &burst in bursts {
            assert!(decoder.feed_edge(Level::Low, t).is_none());
            t += burst as u64;
            if let Some(e) = decoder.feed_edge(Level::High, t) {
                event = Some(e);
            }
            t += SYMBOL_GAP_US;
        }

        (event, t)
    }

    fn decoder_with_team(own_team: u8) -> BurstDecoder {
        BurstDecoder::new(Arc::new(AtomicU8::new(own_team)), true)
    }

    #[test]
    fn test_round_trip_all_team_ids() {
        for team_id in 0..=255u8 {
            let mut decoder = decoder_with_team(7);
            let (event, _) = feed_bursts(&mut decoder, &encode_frame(team_id), 1000);

            let event = event.expect("valid frame must decode");
            assert_eq!(event.attacking_team, team_id);
            assert_eq!(event.is_self_hit, team_id == 7);
        }
    }

    #[test]
    fn test_tolerance_boundary() {
        // A bit-0 burst stretched exactly to the tolerance edge still decodes
        let mut frame = encode_frame(0);
        frame[1] = BIT_0_BURST_US + SYMBOL_TOLERANCE_US;

        let mut decoder = decoder_with_team(1);
        let (event, _) = feed_bursts(&mut decoder, &frame, 1000);
        assert_eq!(event.unwrap().attacking_team, 0);

        // One microsecond further and the whole frame is invalid
        frame[1] = BIT_0_BURST_US + SYMBOL_TOLERANCE_US + 1;
        let mut decoder = decoder_with_team(1);
        let (event, _) = feed_bursts(&mut decoder, &frame, 1000);
        assert!(event.is_none());
    }

    #[test]
    fn test_corruption_at_any_position_invalidates_frame() {
        for pos in 0..FRAME_LEN {
            let mut frame = encode_frame(0b0101_1010);
            frame[pos] = 400; // classifies as nothing

            let mut decoder = decoder_with_team(1);
            let (event, _) = feed_bursts(&mut decoder, &frame, 1000);
            assert!(event.is_none(), "corrupt position {} must not decode", pos);
        }
    }

    #[test]
    fn test_buffer_cleared_after_failed_decode() {
        let mut corrupt = encode_frame(9);
        corrupt[5] = 400;

        let mut decoder = decoder_with_team(1);
        let (event, t) = feed_bursts(&mut decoder, &corrupt, 1000);
        assert!(event.is_none());

        // The very next frame must decode cleanly, no residue from the
        // failed one
        let (event, _) = feed_bursts(&mut decoder, &encode_frame(9), t + 200_000);
        assert_eq!(event.unwrap().attacking_team, 9);
    }

    #[test]
    fn test_gap_rule_discards_partial_transmission() {
        let mut decoder = decoder_with_team(1);

        // Half a frame arrives, then the shooter's transmission dies
        let partial = &encode_frame(0xAB)[0..5];
        let (event, t) = feed_bursts(&mut decoder, partial, 1000);
        assert!(event.is_none());

        // More than 100 ms later a complete frame arrives and must decode on
        // its own - the stale bursts cannot pollute it
        let (event, _) = feed_bursts(&mut decoder, &encode_frame(0xAB), t + FRAME_GAP_US + 1);
        assert_eq!(event.unwrap().attacking_team, 0xAB);
    }

    #[test]
    fn test_self_hit_rejected_when_not_accepted() {
        let mut decoder = BurstDecoder::new(Arc::new(AtomicU8::new(5)), false);

        let (event, t) = feed_bursts(&mut decoder, &encode_frame(5), 1000);
        assert!(event.is_none());

        // Opponent hits still pass
        let (event, _) = feed_bursts(&mut decoder, &encode_frame(6), t + 200_000);
        let event = event.unwrap();
        assert_eq!(event.attacking_team, 6);
        assert!(!event.is_self_hit);
    }

    #[test]
    fn test_decode_frame_wrong_length() {
        assert!(decode_frame(&encode_frame(3)[0..9]).is_none());
        assert!(decode_frame(&[]).is_none());
    }
}
