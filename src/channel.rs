//! Command/response channel to the adapter
//!
//! One [CommandChannel::send] call is one full transaction: append the CR
//! terminator, write, pause per the [TimingPolicy], then drain whatever the
//! adapter produced. The pause is the only synchronization mechanism the
//! protocol offers - the adapter never signals "response complete" - so a
//! response can legitimately arrive truncated or empty if the device was
//! still talking when the pause elapsed. Callers classify, they do not retry.

use std::time::Duration;

use crate::transport::{Transport, TransportError};

/// Command channel result
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, thiserror::Error)]
/// Error produced by the command channel
pub enum ChannelError {
    /// The command was empty after trimming
    #[error("command is empty")]
    EmptyCommand,
    /// The underlying transport is not open
    #[error("channel transport is unavailable")]
    ChannelUnavailable,
    /// Underlying transport error
    #[error("transport error")]
    Transport(
        #[from]
        #[source]
        TransportError,
    ),
}

/// Decides how long to pause between writing a command and draining the
/// response.
///
/// Exactly one duration applies per command. Implementations must be pure so
/// the same command always gets the same wait.
pub trait TimingPolicy: Send {
    /// Returns the pause for the given (already trimmed) command
    fn wait_for(&self, command: &str) -> Duration;
}

/// Prefix of a `ReadDataByIdentifier` diagnostic service request. The vehicle
/// may need several CAN frames to answer these, unlike local `AT` commands
/// which the adapter acknowledges immediately.
const DIAG_SERVICE_PREFIX: &str = "22";

/// Fixed-delay timing: a long wait for diagnostic-service requests, a short
/// wait for everything else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelayTiming {
    /// Pause after an `AT` configuration command
    pub at_delay: Duration,
    /// Pause after a diagnostic-service (`22...`) request
    pub diag_delay: Duration,
}

impl Default for FixedDelayTiming {
    fn default() -> Self {
        Self {
            at_delay: Duration::from_millis(300),
            diag_delay: Duration::from_millis(700),
        }
    }
}

impl FixedDelayTiming {
    /// Zero-delay policy for tests and simulations
    pub fn immediate() -> Self {
        Self {
            at_delay: Duration::ZERO,
            diag_delay: Duration::ZERO,
        }
    }
}

impl TimingPolicy for FixedDelayTiming {
    fn wait_for(&self, command: &str) -> Duration {
        if command.starts_with(DIAG_SERVICE_PREFIX) {
            self.diag_delay
        } else {
            self.at_delay
        }
    }
}

/// Serializes single commands to the transport and returns the raw decoded
/// response
pub struct CommandChannel {
    transport: Box<dyn Transport>,
    timing: Box<dyn TimingPolicy>,
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommandChannel {{ open: {} }}", self.transport.is_open())
    }
}

impl CommandChannel {
    /// Creates a channel over the given transport with the default
    /// fixed-delay timing
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_timing(transport, Box::new(FixedDelayTiming::default()))
    }

    /// Creates a channel with an explicit timing policy
    pub fn with_timing(transport: Box<dyn Transport>, timing: Box<dyn TimingPolicy>) -> Self {
        Self { transport, timing }
    }

    /// Sends one command and returns the adapter's raw response.
    ///
    /// The command is trimmed and terminated with a single CR. After the
    /// policy's pause, all currently buffered bytes are drained and decoded
    /// lossily (undecodable bytes are replaced, never fatal). An empty
    /// response is a normal outcome and is returned as-is for the caller to
    /// classify.
    pub fn send(&mut self, command: &str) -> ChannelResult<String> {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return Err(ChannelError::EmptyCommand);
        }
        if !self.transport.is_open() {
            return Err(ChannelError::ChannelUnavailable);
        }

        let mut wire = trimmed.as_bytes().to_vec();
        wire.push(b'\r');
        log::debug!("Tx: {trimmed:?}");
        self.transport.write(&wire)?;

        let wait = self.timing.wait_for(trimmed);
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }

        let raw = self.transport.read_available()?;
        let response = String::from_utf8_lossy(&raw).trim().to_string();
        log::debug!("Rx: {response:?}");
        Ok(response)
    }

    /// Opens the underlying transport
    pub fn open(&mut self) -> ChannelResult<()> {
        self.transport.open().map_err(ChannelError::from)
    }

    /// Closes the underlying transport
    pub fn close(&mut self) {
        self.transport.close()
    }

    /// Returns true if the underlying transport is open
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::simulation::SimulationTransport;

    fn test_channel(sim: &SimulationTransport) -> CommandChannel {
        CommandChannel::with_timing(
            Box::new(sim.clone()),
            Box::new(FixedDelayTiming::immediate()),
        )
    }

    #[test]
    fn send_writes_trimmed_command_with_single_cr() {
        let sim = SimulationTransport::new();
        let mut channel = test_channel(&sim);
        channel.open().unwrap();
        channel.send("  ATE0  ").unwrap();
        assert_eq!(sim.sent_commands(), vec!["ATE0\r".to_string()]);
    }

    #[test]
    fn send_does_not_duplicate_terminator() {
        let sim = SimulationTransport::new();
        let mut channel = test_channel(&sim);
        channel.open().unwrap();
        channel.send("ATZ\r").unwrap();
        assert_eq!(sim.sent_commands(), vec!["ATZ\r".to_string()]);
    }

    #[test]
    fn send_rejects_empty_command() {
        let sim = SimulationTransport::new();
        let mut channel = test_channel(&sim);
        channel.open().unwrap();
        assert!(matches!(
            channel.send("   "),
            Err(ChannelError::EmptyCommand)
        ));
    }

    #[test]
    fn send_fails_when_transport_not_open() {
        let sim = SimulationTransport::new();
        let mut channel = test_channel(&sim);
        assert!(matches!(
            channel.send("ATE0"),
            Err(ChannelError::ChannelUnavailable)
        ));
    }

    #[test]
    fn send_returns_trimmed_response() {
        let sim = SimulationTransport::new();
        sim.add_response("ATDPN", "\r\nA6\r\n>");
        let mut channel = test_channel(&sim);
        channel.open().unwrap();
        assert_eq!(channel.send("ATDPN").unwrap(), "A6\r\n>");
    }

    #[test]
    fn empty_response_is_not_an_error() {
        let sim = SimulationTransport::new();
        let mut channel = test_channel(&sim);
        channel.open().unwrap();
        assert_eq!(channel.send("224002").unwrap(), "");
    }

    #[test]
    fn diag_service_requests_get_the_long_delay() {
        let timing = FixedDelayTiming::default();
        assert_eq!(timing.wait_for("224002"), Duration::from_millis(700));
        assert_eq!(timing.wait_for("22F190"), Duration::from_millis(700));
        assert_eq!(timing.wait_for("ATSH6F1"), Duration::from_millis(300));
        assert_eq!(timing.wait_for("ATZ"), Duration::from_millis(300));
        // The prefix check runs on the trimmed form, which is what the
        // channel hands the policy
        assert_eq!(timing.wait_for("224002".trim()), Duration::from_millis(700));
    }
}
