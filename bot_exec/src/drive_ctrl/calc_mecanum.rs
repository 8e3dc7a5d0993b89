//! Mecanum inverse kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::{NUM_WHEELS, WHEEL_FL, WHEEL_FR, WHEEL_RL, WHEEL_RR};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a normalised velocity command onto the four mecanum wheels.
///
/// Inputs are in [-1, +1] (`speed_scale` in [0, 1]). The raw per-wheel sums
/// are normalised by the largest magnitude so that no wheel ever exceeds
/// unit demand, then scaled. Outputs are in wheel order FL, FR, RL, RR.
pub fn calc_mecanum(vx: f64, vy: f64, omega: f64, speed_scale: f64) -> [f64; NUM_WHEELS] {
    let mut wheels = [0f64; NUM_WHEELS];

    wheels[WHEEL_FL] = vy + vx + omega;
    wheels[WHEEL_FR] = -vy + vx - omega;
    wheels[WHEEL_RL] = -vy + vx + omega;
    wheels[WHEEL_RR] = vy + vx - omega;

    let max_mag = wheels.iter().fold(1f64, |acc, w| acc.max(w.abs()));

    for w in wheels.iter_mut() {
        *w = *w / max_mag * speed_scale;
    }

    wheels
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pure_forward() {
        let wheels = calc_mecanum(1.0, 0.0, 0.0, 1.0);

        // All four wheels equal and positive
        assert!(wheels.iter().all(|&w| w == wheels[WHEEL_FL]));
        assert!(wheels[WHEEL_FL] > 0.0);
    }

    #[test]
    fn test_pure_rotation() {
        let wheels = calc_mecanum(0.0, 0.0, 1.0, 1.0);

        // Left side forwards, right side backwards
        assert_eq!(wheels[WHEEL_FL], wheels[WHEEL_RL]);
        assert!(wheels[WHEEL_FL] > 0.0);
        assert_eq!(wheels[WHEEL_FR], wheels[WHEEL_RR]);
        assert!(wheels[WHEEL_FR] < 0.0);
    }

    #[test]
    fn test_zero_command_is_zero_for_any_scale() {
        for &scale in &[0.0, 0.3, 1.0] {
            let wheels = calc_mecanum(0.0, 0.0, 0.0, scale);
            assert_eq!(wheels, [0.0; NUM_WHEELS]);
        }
    }

    #[test]
    fn test_combined_command_never_exceeds_unit() {
        let wheels = calc_mecanum(1.0, 1.0, 1.0, 1.0);

        for w in wheels.iter() {
            assert!(w.abs() <= 1.0);
        }

        // The largest raw sum (vy + vx + omega = 3) must be saturated to
        // exactly unit demand
        assert_eq!(wheels[WHEEL_FL], 1.0);
    }

    #[test]
    fn test_speed_scale() {
        let full = calc_mecanum(1.0, 0.0, 0.0, 1.0);
        let half = calc_mecanum(1.0, 0.0, 0.0, 0.5);

        for i in 0..NUM_WHEELS {
            assert!((half[i] - full[i] * 0.5).abs() < 1e-12);
        }
    }
}
