//! Line protocol to the decision process.
//!
//! Request: one JSON object per line, `{"state":[..], ...}`.
//! Response: whitespace-separated decimal numbers on one line.
//! Teardown: the bare `END` sentinel, after which nothing else is sent.

use serde::{Deserialize, Serialize};

use crate::episode::EpisodeSignals;
use crate::error::ProtocolError;

pub const TERMINAL_SENTINEL: &str = "END";

/// The decision process only ever runs a single phase.
pub const CURRENT_PHASE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Only the observation.
    Bare,
    /// Observation plus reward, score, done flag and phase marker.
    #[default]
    Scored,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    state: &'a [f64],
    #[serde(skip_serializing_if = "Option::is_none")]
    current_phase: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    done: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reward: Option<f64>,
    // single-element list, room for multi-objective scores
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<[f64; 1]>,
}

#[derive(Debug, Clone)]
pub struct MessageCodec {
    format: WireFormat,
    terminated: bool,
}

impl MessageCodec {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            terminated: false,
        }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Serialize one request line, newline included.
    pub fn encode(
        &self,
        observation: &[f64],
        signals: &EpisodeSignals,
        done: bool,
    ) -> Result<String, ProtocolError> {
        if self.terminated {
            return Err(ProtocolError::Terminated);
        }
        let request = match self.format {
            WireFormat::Bare => Request {
                state: observation,
                current_phase: None,
                done: None,
                reward: None,
                score: None,
            },
            WireFormat::Scored => Request {
                state: observation,
                current_phase: Some(CURRENT_PHASE),
                done: Some(u8::from(done)),
                reward: Some(signals.reward),
                score: Some([signals.score]),
            },
        };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        Ok(line)
    }

    /// The `END` line. Every later `encode` fails with `Terminated`.
    pub fn encode_terminal(&mut self) -> Result<String, ProtocolError> {
        if self.terminated {
            return Err(ProtocolError::Terminated);
        }
        self.terminated = true;
        Ok(format!("{}\n", TERMINAL_SENTINEL))
    }
}

/// Parse one response line into numbers.
pub fn decode_response(line: &str) -> Result<Vec<f64>, ProtocolError> {
    line.split_whitespace()
        .enumerate()
        .map(|(index, token)| {
            let v: f64 = token.parse().map_err(|source| ProtocolError::BadToken {
                token: token.to_string(),
                source,
            })?;
            if v.is_finite() {
                Ok(v)
            } else {
                Err(ProtocolError::NonFinite { index })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> EpisodeSignals {
        EpisodeSignals {
            reward: 1.5,
            score: 42.0,
            best_distance: 42.0,
        }
    }

    #[test]
    fn scored_request_shape() {
        let codec = MessageCodec::new(WireFormat::Scored);
        let line = codec.encode(&[0.5, 1.0], &signals(), false).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let v: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(v["state"], serde_json::json!([0.5, 1.0]));
        assert_eq!(v["current_phase"], CURRENT_PHASE);
        assert_eq!(v["done"], 0);
        assert_eq!(v["reward"], 1.5);
        assert_eq!(v["score"], serde_json::json!([42.0]));
    }

    #[test]
    fn bare_request_only_carries_state() {
        let codec = MessageCodec::new(WireFormat::Bare);
        let line = codec.encode(&[0.25], &signals(), true).unwrap();
        assert_eq!(line, "{\"state\":[0.25]}\n");
    }

    #[test]
    fn done_flag_is_integer() {
        let codec = MessageCodec::new(WireFormat::Scored);
        let line = codec.encode(&[], &signals(), true).unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["done"], 1);
    }

    #[test]
    fn encode_after_terminal_fails() {
        let mut codec = MessageCodec::new(WireFormat::Scored);
        assert_eq!(codec.encode_terminal().unwrap(), "END\n");
        assert!(matches!(
            codec.encode(&[0.0], &signals(), false),
            Err(ProtocolError::Terminated)
        ));
        assert!(matches!(
            codec.encode_terminal(),
            Err(ProtocolError::Terminated)
        ));
    }

    #[test]
    fn decode_whitespace_separated() {
        assert_eq!(decode_response("0.1 0 0.5\n").unwrap(), vec![0.1, 0.0, 0.5]);
        assert_eq!(decode_response("  1e-3\t2 ").unwrap(), vec![0.001, 2.0]);
        assert!(decode_response("").unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_response("0.1 abc 0.5"),
            Err(ProtocolError::BadToken { ref token, .. }) if token.as_str() == "abc"
        ));
        assert!(matches!(
            decode_response("0.1 NaN 0.5"),
            Err(ProtocolError::NonFinite { index: 1 })
        ));
    }
}
