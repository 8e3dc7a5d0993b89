//! IR frame encoding and background transmission

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use super::{
    BIT_0_BURST_US, BIT_1_BURST_US, CARRIER_PERIOD_US, FRAME_LEN, START_END_BURST_US,
    SYMBOL_GAP_US,
};
use crate::gpio::GpioDriver;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Transmit half of the IR codec.
///
/// Firing occupies real time (a full frame is roughly 25 ms of bursts and
/// gaps) so each shot runs on its own background thread. A busy flag makes
/// shots mutually exclusive: a fire request while a transmission is in
/// flight is dropped, not queued, so waveforms can never interleave on the
/// emitter pin.
pub struct IrTransmitter {
    driver: Arc<dyn GpioDriver>,
    tx_pin: u8,
    busy: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Encode a team id into the 10 burst durations of a frame.
///
/// Layout: START, bit7..bit0 (MSB first), END.
pub fn encode_frame(team_id: u8) -> [u32; FRAME_LEN] {
    let mut frame = [0u32; FRAME_LEN];

    frame[0] = START_END_BURST_US;
    for i in 0..8 {
        frame[1 + i] = match (team_id >> (7 - i)) & 1 {
            1 => BIT_1_BURST_US,
            _ => BIT_0_BURST_US,
        };
    }
    frame[FRAME_LEN - 1] = START_END_BURST_US;

    frame
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl IrTransmitter {
    pub fn new(driver: Arc<dyn GpioDriver>, tx_pin: u8) -> Self {
        Self {
            driver,
            tx_pin,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fire the robot's team id as an IR frame.
    ///
    /// The transmission runs on a background thread and this function
    /// returns immediately. Returns true if the shot was dispatched, false
    /// if it was dropped because a transmission is already in flight.
    ///
    /// The caller is responsible for the hit-disable gate - a disabled robot
    /// must not reach this function.
    pub fn fire(&self, team_id: u8) -> bool {
        // Claim the emitter, dropping the request if it's already taken
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Fire request dropped, transmission already in flight");
            return false;
        }

        let driver = self.driver.clone();
        let busy = self.busy.clone();
        let pin = self.tx_pin;

        thread::spawn(move || {
            let frame = encode_frame(team_id);

            for (i, burst_us) in frame.iter().enumerate() {
                if let Err(e) = driver.emit_pulse_train(pin, CARRIER_PERIOD_US, *burst_us as u64) {
                    warn!("IR transmission aborted: {}", e);
                    break;
                }

                // Quiet gap between bursts, none needed after the END marker
                if i + 1 < FRAME_LEN {
                    thread::sleep(Duration::from_micros(SYMBOL_GAP_US));
                }
            }

            busy.store(false, Ordering::SeqCst);
        });

        true
    }

    /// True while a transmission is in flight.
    pub fn in_flight(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::gpio::sim::SimDriver;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(0b1010_0001);

        assert_eq!(frame[0], START_END_BURST_US);
        assert_eq!(frame[9], START_END_BURST_US);
        assert_eq!(frame[1], BIT_1_BURST_US); // bit 7
        assert_eq!(frame[2], BIT_0_BURST_US); // bit 6
        assert_eq!(frame[3], BIT_1_BURST_US); // bit 5
        assert_eq!(frame[8], BIT_1_BURST_US); // bit 0
    }

    #[test]
    fn test_encode_frame_extremes() {
        let zeros = encode_frame(0);
        assert!(zeros[1..9].iter().all(|&b| b == BIT_0_BURST_US));

        let ones = encode_frame(255);
        assert!(ones[1..9].iter().all(|&b| b == BIT_1_BURST_US));
    }

    #[test]
    fn test_fire_lock_drops_overlapping_requests() {
        let driver = Arc::new(SimDriver::new());
        let tx = IrTransmitter::new(driver.clone(), 17);

        // First shot claims the emitter synchronously
        assert!(tx.fire(42));

        // A second request while the frame is still going out is dropped
        assert!(!tx.fire(42));

        // Wait out the transmission (a frame is ~25 ms), then the emitter is
        // free again and exactly one frame of bursts was emitted
        thread::sleep(Duration::from_millis(100));
        assert!(!tx.in_flight());
        assert_eq!(driver.emitted_pulse_trains(17).len(), FRAME_LEN);

        assert!(tx.fire(42));
    }
}
