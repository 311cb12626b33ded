use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::action::ActionProtocol;
use crate::codec::WireFormat;
use crate::episode::ScorePolicy;
use crate::gear::{GearTable, DEFAULT_GEAR_DOWN, DEFAULT_GEAR_UP};
use crate::observation::ObservationEncoder;

pub const CONFIG_ENV: &str = "BRIDGE_CONFIG";
pub const BIND_ENV: &str = "BIND_ADDR";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BridgeConfig {
    pub observation: ObservationEncoder,
    pub wire: WireFormat,
    pub action: ActionProtocol,
    pub score_policy: ScorePolicy,
    pub restart_interval_ms: Option<u64>,
    pub response_timeout_ms: Option<u64>,
    pub gear_up: [i32; 6],
    pub gear_down: [i32; 6],
    pub decision_command: Vec<String>,
    pub bind_addr: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            observation: ObservationEncoder::default(),
            wire: WireFormat::default(),
            action: ActionProtocol::default(),
            score_policy: ScorePolicy::default(),
            restart_interval_ms: None,
            response_timeout_ms: None,
            gear_up: DEFAULT_GEAR_UP,
            gear_down: DEFAULT_GEAR_DOWN,
            decision_command: vec!["python".to_string(), "controller.py".to_string()],
            bind_addr: "0.0.0.0:3001".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let cfg: BridgeConfig = serde_json::from_str(&data)
            .with_context(|| format!("invalid config JSON in {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `BRIDGE_CONFIG`, else the first config file found, else defaults.
    /// `BIND_ADDR` wins over the file's listen address.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => match resolve_config_path() {
                Some(path) => Self::load(&path)?,
                None => {
                    tracing::warn!("no config file found, using defaults");
                    Self::default()
                }
            },
        };
        if let Ok(addr) = std::env::var(BIND_ENV) {
            cfg.bind_addr = addr;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.decision_command.is_empty() {
            bail!("decision_command must name a program");
        }
        if self.restart_interval_ms == Some(0) {
            bail!("restart_interval_ms must be positive");
        }
        if self.response_timeout_ms == Some(0) {
            bail!("response_timeout_ms must be positive");
        }
        Ok(())
    }

    pub fn gear_table(&self) -> GearTable {
        GearTable::new(self.gear_up, self.gear_down)
    }

    pub fn restart_interval(&self) -> Option<Duration> {
        self.restart_interval_ms.map(Duration::from_millis)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("config/bridge.json"),
        PathBuf::from("./bridge.json"),
    ];
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop();
        exe.push("bridge.json");
        candidates.push(exe);
    }
    candidates.into_iter().find(|c| c.exists())
}
