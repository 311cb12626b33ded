use serde::{Deserialize, Serialize};

pub const FOCUS_SENSORS: usize = 5;
pub const TRACK_SENSORS: usize = 19;
pub const OPPONENT_SENSORS: usize = 36;
pub const WHEELS: usize = 4;

/// Rangefinder reading meaning "nothing within range" (meters).
pub const RANGEFINDER_MAX_M: f64 = 200.0;

/// One tick of simulator telemetry, as sent by the simulator adapter.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetrySnapshot {
    pub angle: f64,              // to track axis, radians in [-pi, pi]
    pub speed_x: f64,            // km/h
    pub speed_y: f64,
    pub speed_z: f64,
    pub rpm: f64,
    pub gear: i32,               // -1 = R, 0 = N
    pub track_pos: f64,          // 0 = axis, +-1 = edges, may be +-inf
    pub race_pos: i32,
    pub damage: f64,
    pub fuel: f64,
    pub cur_lap_time: f64,       // seconds
    pub distance_raced: f64,     // meters since race start
    pub dist_from_start: f64,    // meters along the current lap
    pub z: f64,
    pub focus: Vec<f64>,         // FOCUS_SENSORS rangefinders
    pub opponents: Vec<f64>,     // OPPONENT_SENSORS rangefinders
    pub track: Vec<f64>,         // TRACK_SENSORS rangefinders
    pub wheel_spin_vel: Vec<f64>, // rad/s per wheel
}

impl TelemetrySnapshot {
    /// Longitudinal speed, the one the reward and scoring look at.
    pub fn speed(&self) -> f64 {
        self.speed_x
    }
}

/// Command handed back to the simulator for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub accelerate: f64,
    pub brake: f64,
    pub steering: f64, // [-1, 1]
    pub gear: i32,     // -1..=6
    pub clutch: f64,
    pub focus: i32, // degrees, [-90, 90]
    pub restart_race: bool,
}

impl ControlCommand {
    /// Coast in `gear` with the wheel centred.
    pub fn fallback(gear: i32) -> Self {
        Self {
            accelerate: 0.0,
            brake: 0.0,
            steering: 0.0,
            gear: gear.max(1),
            clutch: 0.0,
            focus: 0,
            restart_race: false,
        }
    }
}
