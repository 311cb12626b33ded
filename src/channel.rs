//! Byte channel to the decision process.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{BridgeError, ChannelError};

const EXIT_GRACE: Duration = Duration::from_millis(500);

/// One request line out, one response line back, strictly alternating.
pub trait DecisionChannel {
    /// Write `line` (already newline-terminated) and flush.
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError>;
    /// Block for the next line, without its terminator.
    fn recv_line(&mut self) -> Result<String, ChannelError>;
    /// Shut the write side. Idempotent.
    fn close(&mut self) -> Result<(), ChannelError>;
}

impl<C: DecisionChannel + ?Sized> DecisionChannel for Box<C> {
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        (**self).send_line(line)
    }

    fn recv_line(&mut self) -> Result<String, ChannelError> {
        (**self).recv_line()
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        (**self).close()
    }
}

fn strip_terminator(mut line: String) -> String {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}

/// Channel over any reader/writer pair: pipes, stdio, or in-memory buffers.
#[derive(Debug)]
pub struct LineChannel<R, W> {
    reader: R,
    writer: Option<W>,
}

impl<R: BufRead, W: Write> LineChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Some(writer),
        }
    }

    /// Split back into halves; the writer is `None` after `close`.
    pub fn into_parts(self) -> (R, Option<W>) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> DecisionChannel for LineChannel<R, W> {
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        let writer = self.writer.as_mut().ok_or(ChannelError::Closed)?;
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn recv_line(&mut self) -> Result<String, ChannelError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(ChannelError::Closed);
        }
        Ok(strip_terminator(line))
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Decision process spawned as a child, talking over its stdin/stdout.
///
/// Stdout is drained by a reader thread so reads can time out.
pub struct ProcessChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<std::io::Result<String>>,
    timeout: Option<Duration>,
}

impl ProcessChannel {
    pub fn spawn(command: &[String], timeout: Option<Duration>) -> Result<Self, BridgeError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| BridgeError::Setup("empty decision command".to_string()))?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| BridgeError::Setup(format!("spawn {}: {}", program, e)))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Setup("child stdout not captured".to_string()))?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("decision-reader".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| BridgeError::Setup(format!("reader thread: {}", e)))?;

        info!("spawned decision process {} (pid {})", program, child.id());
        Ok(Self {
            child,
            stdin,
            lines: rx,
            timeout,
        })
    }
}

impl DecisionChannel for ProcessChannel {
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        let stdin = self.stdin.as_mut().ok_or(ChannelError::Closed)?;
        stdin.write_all(line.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    fn recv_line(&mut self) -> Result<String, ChannelError> {
        let received = match self.timeout {
            Some(timeout) => self.lines.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => ChannelError::Timeout(timeout),
                RecvTimeoutError::Disconnected => ChannelError::Closed,
            })?,
            None => self.lines.recv().map_err(|_| ChannelError::Closed)?,
        };
        Ok(strip_terminator(received?))
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        let deadline = Instant::now() + EXIT_GRACE;
        loop {
            if let Some(status) = self.child.try_wait()? {
                debug!("decision process exited with {}", status);
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        warn!(
            "decision process {} still running after {:?}, killing",
            self.child.id(),
            EXIT_GRACE
        );
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            if let Err(e) = self.close() {
                warn!("closing decision process on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn line_channel_round_trip() {
        let mut ch = LineChannel::new(Cursor::new("0.1 0.2 0.3\r\n"), Vec::new());
        ch.send_line("{\"state\":[]}\n").unwrap();
        assert_eq!(ch.recv_line().unwrap(), "0.1 0.2 0.3");
        assert!(matches!(ch.recv_line(), Err(ChannelError::Closed)));
        ch.close().unwrap();
        assert!(matches!(ch.send_line("x\n"), Err(ChannelError::Closed)));
    }

    #[test]
    fn spawn_with_empty_command_is_setup_error() {
        assert!(matches!(
            ProcessChannel::spawn(&[], None),
            Err(BridgeError::Setup(_))
        ));
    }
}
