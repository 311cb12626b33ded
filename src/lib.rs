//! Bridge between a per-tick racing controller and an external decision
//! process speaking a line protocol over a byte channel.
//!
//! Each tick: telemetry → [`EpisodeTracker`] → [`ObservationEncoder`] →
//! [`MessageCodec`] → channel → response → [`ActionTranslator`] → command.

pub mod action;
pub mod channel;
pub mod codec;
pub mod config;
pub mod cycle;
pub mod episode;
pub mod error;
pub mod gear;
pub mod observation;
pub mod types;

pub use action::{ActionProtocol, ActionTranslator};
pub use channel::{DecisionChannel, LineChannel, ProcessChannel};
pub use codec::{MessageCodec, WireFormat};
pub use config::BridgeConfig;
pub use cycle::{ControlCycle, EpisodeSummary};
pub use episode::{EpisodeTracker, RestartTimer, ScorePolicy};
pub use error::{BridgeError, ChannelError, ProtocolError};
pub use gear::{DiscretizationTable, GearTable};
pub use observation::ObservationEncoder;
pub use types::{ControlCommand, TelemetrySnapshot};
