//! Telemetry → observation vector.
//!
//! Layout, shared by both modes (the decision process is trained against it):
//!
//! | index  | field                                   |
//! |--------|-----------------------------------------|
//! | 0      | angle to track axis                     |
//! | 1      | track position, clamped to [-1, 1]      |
//! | 2..=4  | speed x / y / z                         |
//! | 5      | ln(rpm + 1)                             |
//! | 6      | gear / 8                                |
//! | 7      | ln(current lap time + 1)                |
//! | 8      | ln(damage + 1)                          |
//! | 9      | ln(distance + 1)                        |
//! | 10     | ln(fuel + 1)                            |
//! | 11..16 | focus rangefinders                      |
//! | 16..35 | track-edge rangefinders                 |
//! | 35..71 | opponent rangefinders                   |
//! | 71..75 | wheel spin velocity                     |

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{
    TelemetrySnapshot, FOCUS_SENSORS, OPPONENT_SENSORS, RANGEFINDER_MAX_M, TRACK_SENSORS, WHEELS,
};

const SCALAR_FIELDS: usize = 11;

pub const OBSERVATION_LEN: usize =
    SCALAR_FIELDS + FOCUS_SENSORS + TRACK_SENSORS + OPPONENT_SENSORS + WHEELS;

const ANGLE_HALF_RANGE: f64 = PI;
const GEAR_SCALE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationEncoder {
    /// Raw angle/position/speeds, log-compressed magnitudes, rangefinders / 200.
    RawScaled,
    /// Angle mapped to [0, 1], rangefinders as `1 - v/200`, log of the best
    /// distance instead of the live one.
    #[default]
    Bounded,
}

impl ObservationEncoder {
    pub fn dim(&self) -> usize {
        OBSERVATION_LEN
    }

    pub fn encode(&self, snapshot: &TelemetrySnapshot, best_distance: f64) -> Vec<f64> {
        let mut obs = Vec::with_capacity(OBSERVATION_LEN);

        let angle = finite_or_zero("angle", snapshot.angle);
        obs.push(match self {
            Self::RawScaled => angle,
            Self::Bounded => (angle + ANGLE_HALF_RANGE) / (2.0 * ANGLE_HALF_RANGE),
        });
        obs.push(clamp_track_pos(snapshot.track_pos));
        obs.push(finite_or_zero("speed_x", snapshot.speed_x));
        obs.push(finite_or_zero("speed_y", snapshot.speed_y));
        obs.push(finite_or_zero("speed_z", snapshot.speed_z));
        obs.push(ln1p_checked("rpm", snapshot.rpm));
        obs.push(f64::from(snapshot.gear) / GEAR_SCALE);
        obs.push(ln1p_checked("cur_lap_time", snapshot.cur_lap_time));
        obs.push(ln1p_checked("damage", snapshot.damage));
        let distance = match self {
            Self::RawScaled => snapshot.distance_raced,
            Self::Bounded => best_distance,
        };
        obs.push(ln1p_checked("distance", distance));
        obs.push(ln1p_checked("fuel", snapshot.fuel));

        for (name, values, width) in [
            ("focus", &snapshot.focus, FOCUS_SENSORS),
            ("track", &snapshot.track, TRACK_SENSORS),
            ("opponents", &snapshot.opponents, OPPONENT_SENSORS),
        ] {
            for v in fixed_width(name, values, width, RANGEFINDER_MAX_M) {
                let v = finite_or(name, v, RANGEFINDER_MAX_M);
                obs.push(match self {
                    Self::RawScaled => v / RANGEFINDER_MAX_M,
                    Self::Bounded => 1.0 - v / RANGEFINDER_MAX_M,
                });
            }
        }
        for v in fixed_width("wheel_spin_vel", &snapshot.wheel_spin_vel, WHEELS, 0.0) {
            obs.push(finite_or_zero("wheel_spin_vel", v));
        }

        debug_assert_eq!(obs.len(), OBSERVATION_LEN);
        obs
    }
}

/// The simulator reports +-inf once the car leaves the track.
pub fn clamp_track_pos(pos: f64) -> f64 {
    if pos.is_nan() {
        warn!("track_pos is NaN, substituting 0");
        return 0.0;
    }
    pos.clamp(-1.0, 1.0)
}

/// `ln(x + 1)`, or 0 with a warning when `x` is outside its domain.
pub fn ln1p_checked(field: &str, x: f64) -> f64 {
    if !x.is_finite() || x <= -1.0 {
        warn!("{}={} outside ln(x+1) domain, substituting 0", field, x);
        return 0.0;
    }
    x.ln_1p()
}

fn finite_or_zero(field: &str, x: f64) -> f64 {
    finite_or(field, x, 0.0)
}

fn finite_or(field: &str, x: f64, sentinel: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        warn!("{}={} is not finite, substituting {}", field, x, sentinel);
        sentinel
    }
}

fn fixed_width<'a>(
    field: &'a str,
    values: &'a [f64],
    width: usize,
    pad: f64,
) -> impl Iterator<Item = f64> + 'a {
    if values.len() != width {
        warn!(
            "{} has {} readings, expected {}; padding/truncating",
            field,
            values.len(),
            width
        );
    }
    values
        .iter()
        .copied()
        .chain(std::iter::repeat(pad))
        .take(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            angle: 0.0,
            speed_x: 50.0,
            rpm: 4000.0,
            gear: 2,
            track_pos: 0.25,
            fuel: 94.0,
            cur_lap_time: 3.0,
            distance_raced: 120.0,
            focus: vec![200.0; FOCUS_SENSORS],
            track: vec![100.0; TRACK_SENSORS],
            opponents: vec![200.0; OPPONENT_SENSORS],
            wheel_spin_vel: vec![30.0; WHEELS],
            ..Default::default()
        }
    }

    #[test]
    fn fixed_length_in_both_modes() {
        let s = snapshot();
        assert_eq!(ObservationEncoder::RawScaled.encode(&s, 0.0).len(), 75);
        assert_eq!(ObservationEncoder::Bounded.encode(&s, 0.0).len(), 75);
    }

    #[test]
    fn raw_scaled_fields() {
        let obs = ObservationEncoder::RawScaled.encode(&snapshot(), 999.0);
        assert_eq!(obs[0], 0.0);
        assert_eq!(obs[1], 0.25);
        assert_eq!(obs[2], 50.0);
        assert!((obs[5] - 4001f64.ln()).abs() < 1e-12);
        assert_eq!(obs[6], 0.25);
        // live distance, not best
        assert!((obs[9] - 121f64.ln()).abs() < 1e-12);
        assert_eq!(obs[11], 1.0);
        assert_eq!(obs[16], 0.5);
        assert_eq!(obs[71], 30.0);
    }

    #[test]
    fn bounded_fields() {
        let mut s = snapshot();
        s.angle = -PI;
        let obs = ObservationEncoder::Bounded.encode(&s, 999.0);
        assert_eq!(obs[0], 0.0);
        assert!((obs[9] - 1000f64.ln()).abs() < 1e-12);
        assert_eq!(obs[11], 0.0);
        assert_eq!(obs[16], 0.5);

        s.angle = PI;
        assert_eq!(ObservationEncoder::Bounded.encode(&s, 0.0)[0], 1.0);
    }

    #[test]
    fn infinite_track_position_is_clamped() {
        let mut s = snapshot();
        s.track_pos = f64::INFINITY;
        assert_eq!(ObservationEncoder::Bounded.encode(&s, 0.0)[1], 1.0);
        s.track_pos = f64::NEG_INFINITY;
        assert_eq!(ObservationEncoder::Bounded.encode(&s, 0.0)[1], -1.0);
    }

    #[test]
    fn log_domain_violation_is_substituted() {
        let mut s = snapshot();
        s.damage = -3.0;
        s.rpm = f64::NAN;
        let obs = ObservationEncoder::RawScaled.encode(&s, 0.0);
        assert_eq!(obs[5], 0.0);
        assert_eq!(obs[8], 0.0);
        assert!(obs.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn short_arrays_are_padded_as_empty_range() {
        let mut s = snapshot();
        s.opponents.clear();
        let obs = ObservationEncoder::Bounded.encode(&s, 0.0);
        assert!(obs[35..71].iter().all(|v| *v == 0.0));
    }
}
