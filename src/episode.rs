use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::TelemetrySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePolicy {
    /// Distance raced once the lap clock runs.
    #[default]
    FreezeOnDamage,
    /// Distance per second of lap time, plain distance during the first
    /// second.
    DistancePerLapTime,
}

impl ScorePolicy {
    fn score(&self, distance: f64, lap_time: f64) -> f64 {
        if lap_time <= 0.0 {
            return 0.0;
        }
        match self {
            Self::FreezeOnDamage => distance,
            Self::DistancePerLapTime if lap_time < 1.0 => distance,
            Self::DistancePerLapTime => distance / lap_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSignals {
    pub reward: f64,
    pub score: f64,
    pub best_distance: f64,
}

/// Forward progress minus drift and off-centre penalties.
pub fn reward(speed: f64, angle: f64, track_pos: f64) -> f64 {
    speed * angle.cos() - speed * angle.sin() - speed * track_pos.abs()
}

/// Cross-tick episode bookkeeping.
///
/// Under either score policy the score stops refreshing on the first tick
/// that reports damage and keeps its last damage-free value.
#[derive(Debug, Clone)]
pub struct EpisodeTracker {
    policy: ScorePolicy,
    best_distance: f64,
    score: f64,
    reward: f64,
    damaged: bool,
    last_snapshot: Option<TelemetrySnapshot>,
    ticks: u64,
}

impl EpisodeTracker {
    pub fn new(policy: ScorePolicy) -> Self {
        Self {
            policy,
            best_distance: 0.0,
            score: 0.0,
            reward: 0.0,
            damaged: false,
            last_snapshot: None,
            ticks: 0,
        }
    }

    pub fn observe(&mut self, snapshot: &TelemetrySnapshot) -> EpisodeSignals {
        let raced = snapshot.distance_raced;
        if raced.is_finite() {
            self.best_distance = self.best_distance.max(raced);
        }

        let r = reward(
            snapshot.speed(),
            snapshot.angle,
            snapshot.track_pos.clamp(-1.0, 1.0),
        );
        self.reward = if r.is_finite() { r } else { 0.0 };

        if !self.damaged && snapshot.damage == 0.0 {
            if raced.is_finite() {
                self.score = self.policy.score(raced, snapshot.cur_lap_time);
            }
        } else if !self.damaged {
            self.damaged = true;
            info!(
                "damage {} first seen at tick {}, score frozen at {:.1}",
                snapshot.damage, self.ticks, self.score
            );
        }

        self.last_snapshot = Some(snapshot.clone());
        self.ticks += 1;
        debug!(
            "tick={} reward={:.3} score={:.1} best={:.1}",
            self.ticks, self.reward, self.score, self.best_distance
        );
        self.signals()
    }

    pub fn signals(&self) -> EpisodeSignals {
        EpisodeSignals {
            reward: self.reward,
            score: self.score,
            best_distance: self.best_distance,
        }
    }

    pub fn best_distance(&self) -> f64 {
        self.best_distance
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn last_snapshot(&self) -> Option<&TelemetrySnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Fires once every `interval` of wall-clock time, anchored on first poll.
#[derive(Debug, Clone)]
pub struct RestartTimer {
    interval: Duration,
    anchor: Option<Instant>,
}

impl RestartTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            anchor: None,
        }
    }

    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> bool {
        match self.anchor {
            None => {
                self.anchor = Some(now);
                false
            }
            Some(anchor) if now.saturating_duration_since(anchor) >= self.interval => {
                self.anchor = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}
