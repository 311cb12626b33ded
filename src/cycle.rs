//! Per-tick orchestration: telemetry in, command out.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::action::ActionTranslator;
use crate::channel::DecisionChannel;
use crate::codec::{decode_response, MessageCodec, WireFormat};
use crate::config::BridgeConfig;
use crate::episode::{EpisodeTracker, RestartTimer};
use crate::error::{BridgeError, ChannelError};
use crate::observation::ObservationEncoder;
use crate::types::{ControlCommand, TelemetrySnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub best_distance: f64,
    pub score: f64,
    pub ticks: u64,
    pub fallback_ticks: u64,
}

pub struct ControlCycle<C: DecisionChannel> {
    channel: C,
    encoder: ObservationEncoder,
    codec: MessageCodec,
    translator: ActionTranslator,
    tracker: EpisodeTracker,
    restart: Option<RestartTimer>,
    last_command: Option<ControlCommand>,
    peer_gone: bool,
    fallback_ticks: u64,
}

impl<C: DecisionChannel> ControlCycle<C> {
    pub fn new(
        channel: C,
        encoder: ObservationEncoder,
        codec: MessageCodec,
        translator: ActionTranslator,
        tracker: EpisodeTracker,
        restart: Option<RestartTimer>,
    ) -> Self {
        Self {
            channel,
            encoder,
            codec,
            translator,
            tracker,
            restart,
            last_command: None,
            peer_gone: false,
            fallback_ticks: 0,
        }
    }

    pub fn from_config(channel: C, cfg: &BridgeConfig) -> Self {
        Self::new(
            channel,
            cfg.observation,
            MessageCodec::new(cfg.wire),
            ActionTranslator::new(cfg.action, cfg.gear_table()),
            EpisodeTracker::new(cfg.score_policy),
            cfg.restart_interval().map(RestartTimer::new),
        )
    }

    pub fn tracker(&self) -> &EpisodeTracker {
        &self.tracker
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn fallback_ticks(&self) -> u64 {
        self.fallback_ticks
    }

    /// One tick. Never fails: a broken exchange yields a coasting command.
    pub fn tick(&mut self, snapshot: &TelemetrySnapshot) -> ControlCommand {
        let restart = self.begin_tick(snapshot);
        let outcome = self.exchange(snapshot);
        match self.settle(outcome, restart) {
            Ok(command) => command,
            Err(e) => {
                if e.is_protocol() {
                    warn!("protocol error on tick {}: {}", self.tracker.ticks(), e);
                } else {
                    warn!("channel error on tick {}: {}", self.tracker.ticks(), e);
                }
                self.fallback_ticks += 1;
                let gear = self.last_command.map_or(snapshot.gear, |c| c.gear);
                let mut command = ControlCommand::fallback(gear);
                command.restart_race = restart;
                self.last_command = Some(command);
                command
            }
        }
    }

    /// Like `tick`, but hands the failure to the caller instead of falling
    /// back.
    pub fn try_tick(&mut self, snapshot: &TelemetrySnapshot) -> Result<ControlCommand, BridgeError> {
        let restart = self.begin_tick(snapshot);
        let outcome = self.exchange(snapshot);
        self.settle(outcome, restart)
    }

    fn begin_tick(&mut self, snapshot: &TelemetrySnapshot) -> bool {
        self.tracker.observe(snapshot);
        let restart = self.restart.as_mut().map_or(false, |t| t.poll());
        if restart {
            info!("forced restart at tick {}", self.tracker.ticks());
        }
        restart
    }

    /// Bookkeeping shared by `tick` and `try_tick`.
    fn settle(
        &mut self,
        outcome: Result<ControlCommand, BridgeError>,
        restart: bool,
    ) -> Result<ControlCommand, BridgeError> {
        match outcome {
            Ok(mut command) => {
                command.restart_race = restart;
                self.last_command = Some(command);
                Ok(command)
            }
            Err(e) => {
                if e.ends_exchange() && !self.peer_gone {
                    info!("no further exchanges this episode: {}", e);
                    self.peer_gone = true;
                }
                Err(e)
            }
        }
    }

    fn exchange(&mut self, snapshot: &TelemetrySnapshot) -> Result<ControlCommand, BridgeError> {
        if self.peer_gone {
            return Err(ChannelError::Closed.into());
        }
        let signals = self.tracker.signals();
        let observation = self.encoder.encode(snapshot, signals.best_distance);
        let line = self.codec.encode(&observation, &signals, false)?;
        self.channel.send_line(&line)?;
        let response = self.channel.recv_line()?;
        debug!("response {:?}", response);
        let values = decode_response(&response)?;
        Ok(self.translator.decode(&values, snapshot)?)
    }

    /// End the episode: final `done` record (scored format only), the `END`
    /// sentinel, then close the write side.
    ///
    /// The terminal sends are best-effort; only a failed `close` is an error.
    pub fn finish(&mut self) -> Result<EpisodeSummary, BridgeError> {
        if !self.codec.is_terminated() && !self.peer_gone {
            if let Err(e) = self.send_done_record() {
                warn!("final done record not delivered: {}", e);
            }
            if let Err(e) = self.send_sentinel() {
                warn!("END sentinel not delivered: {}", e);
            }
        }
        let closed = self.channel.close();

        let summary = EpisodeSummary {
            best_distance: self.tracker.best_distance(),
            score: self.tracker.score(),
            ticks: self.tracker.ticks(),
            fallback_ticks: self.fallback_ticks,
        };
        info!(
            "episode finished: ticks={} fallbacks={} score={:.1}",
            summary.ticks, summary.fallback_ticks, summary.score
        );
        closed?;
        Ok(summary)
    }

    fn send_done_record(&mut self) -> Result<(), BridgeError> {
        if self.codec.format() != WireFormat::Scored {
            return Ok(());
        }
        let Some(last) = self.tracker.last_snapshot() else {
            return Ok(());
        };
        let observation = self.encoder.encode(last, self.tracker.best_distance());
        let line = self
            .codec
            .encode(&observation, &self.tracker.signals(), true)?;
        self.channel.send_line(&line)?;
        Ok(())
    }

    fn send_sentinel(&mut self) -> Result<(), BridgeError> {
        let end = self.codec.encode_terminal()?;
        self.channel.send_line(&end)?;
        Ok(())
    }
}
