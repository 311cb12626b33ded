//! Response vector → control command.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::gear::{DiscretizationTable, GearTable};
use crate::types::{ControlCommand, TelemetrySnapshot};

pub const THREE_VALUE_ARITY: usize = 3;
pub const SIX_VALUE_ARITY: usize = 6;

/// Which response layout the decision process speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionProtocol {
    /// Pick per response from the number of values.
    #[default]
    Auto,
    /// accelerate, brake, steering. Gear from the RPM shifter.
    ThreeValue,
    /// accelerate, brake, clutch, focus, gear, steering. Gear discretized.
    SixValue,
}

impl ActionProtocol {
    fn resolve(&self, arity: usize) -> Result<ActionProtocol, ProtocolError> {
        let resolved = match (self, arity) {
            (Self::Auto, THREE_VALUE_ARITY) | (Self::ThreeValue, THREE_VALUE_ARITY) => {
                Self::ThreeValue
            }
            (Self::Auto, SIX_VALUE_ARITY) | (Self::SixValue, SIX_VALUE_ARITY) => Self::SixValue,
            (expected, got) => {
                return Err(ProtocolError::Arity {
                    expected: expected.arity_label().to_string(),
                    got,
                })
            }
        };
        Ok(resolved)
    }

    fn arity_label(&self) -> &'static str {
        match self {
            Self::Auto => "3 or 6",
            Self::ThreeValue => "3",
            Self::SixValue => "6",
        }
    }
}

/// Map a raw [0, 1] output onto [-1, 1] steering.
pub fn steer_from_raw(raw: f64) -> f64 {
    (2.0 * raw - 1.0).clamp(-1.0, 1.0)
}

/// Map a raw [0, 1] output onto whole degrees in [-90, 90].
pub fn focus_from_raw(raw: f64) -> i32 {
    (raw * 180.0 - 90.0).round().clamp(-90.0, 90.0) as i32
}

fn unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct ActionTranslator {
    protocol: ActionProtocol,
    gears: GearTable,
    buckets: DiscretizationTable,
}

impl ActionTranslator {
    pub fn new(protocol: ActionProtocol, gears: GearTable) -> Self {
        Self {
            protocol,
            gears,
            buckets: DiscretizationTable::default(),
        }
    }

    pub fn protocol(&self) -> ActionProtocol {
        self.protocol
    }

    pub fn gears(&self) -> &GearTable {
        &self.gears
    }

    /// Build the tick's command. `snapshot` feeds the RPM shifter when the
    /// decision process does not pick the gear itself.
    pub fn decode(
        &self,
        values: &[f64],
        snapshot: &TelemetrySnapshot,
    ) -> Result<ControlCommand, ProtocolError> {
        let command = match self.protocol.resolve(values.len())? {
            ActionProtocol::SixValue => ControlCommand {
                accelerate: unit(values[0]),
                brake: unit(values[1]),
                clutch: unit(values[2]),
                focus: focus_from_raw(values[3]),
                gear: self.buckets.decode(values[4]),
                steering: steer_from_raw(values[5]),
                restart_race: false,
            },
            _ => ControlCommand {
                accelerate: unit(values[0]),
                brake: unit(values[1]),
                steering: steer_from_raw(values[2]),
                gear: self.gears.shift(snapshot.gear, snapshot.rpm),
                clutch: 0.0,
                focus: 0,
                restart_race: false,
            },
        };
        Ok(command)
    }
}
