//! Gear selection: the rule-based RPM shifter and the bucketed decode of a
//! decision-process output in [0, 1].

use serde::{Deserialize, Serialize};

pub const DEFAULT_GEAR_UP: [i32; 6] = [5000, 6000, 6000, 6500, 7000, 0];
pub const DEFAULT_GEAR_DOWN: [i32; 6] = [0, 2500, 3000, 3000, 3500, 3500];

pub const TOP_GEAR: i32 = 6;

/// Shift thresholds indexed by `gear - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearTable {
    pub up: [i32; 6],
    pub down: [i32; 6],
}

impl Default for GearTable {
    fn default() -> Self {
        Self {
            up: DEFAULT_GEAR_UP,
            down: DEFAULT_GEAR_DOWN,
        }
    }
}

impl GearTable {
    pub fn new(up: [i32; 6], down: [i32; 6]) -> Self {
        Self { up, down }
    }

    /// Next gear for a car in `gear` turning at `rpm`.
    ///
    /// Reverse and neutral always go to first. The result is in 1..=6.
    pub fn shift(&self, gear: i32, rpm: f64) -> i32 {
        if gear < 1 {
            return 1;
        }
        let gear = gear.min(TOP_GEAR);
        let idx = (gear - 1) as usize;
        if gear < TOP_GEAR && rpm >= f64::from(self.up[idx]) {
            gear + 1
        } else if gear > 1 && rpm <= f64::from(self.down[idx]) {
            gear - 1
        } else {
            gear
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearInterval {
    pub lower: f64,
    pub upper: f64,
}

impl GearInterval {
    fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }
}

/// Contiguous buckets over [0, 1]; bucket `i` decodes to gear `i - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretizationTable {
    intervals: Vec<GearInterval>,
}

impl Default for DiscretizationTable {
    fn default() -> Self {
        Self::new(8)
    }
}

impl DiscretizationTable {
    pub fn new(buckets: usize) -> Self {
        let width = 1.0 / buckets as f64;
        let intervals = (0..buckets)
            .map(|i| GearInterval {
                lower: width * i as f64,
                upper: width * (i + 1) as f64,
            })
            .collect();
        Self { intervals }
    }

    pub fn intervals(&self) -> &[GearInterval] {
        &self.intervals
    }

    /// First bucket containing `v` wins, so a shared boundary resolves to
    /// the lower bucket. Values outside [0, 1] (or NaN) give neutral.
    pub fn decode(&self, v: f64) -> i32 {
        self.intervals
            .iter()
            .position(|interval| interval.contains(v))
            .map(|i| i as i32 - 1)
            .unwrap_or(0)
    }
}
