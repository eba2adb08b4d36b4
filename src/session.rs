//! Adapter session: initialization, addressing configuration and PID queries
//!
//! A session owns one [CommandChannel] for its whole lifetime and walks a
//! small state machine:
//!
//! `Disconnected -> Connected -> Initialized -> Configured(ecu) -> Queried`
//!
//! Initialization runs exactly once per connection. Addressing configuration
//! can be re-entered freely for a new ECU - the adapter's own registers are
//! simply overwritten, no teardown is needed. The configuration lives on the
//! physical device, not in this process, so the session never assumes a
//! previously written configuration survives a reconnect.

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::channel::{CommandChannel, TimingPolicy};
use crate::transport::Transport;
use crate::{ScanError, ScanOpResult};

/// Default target/extended address written by [AddressingConfig::standard].
/// Workload-specific tuning, not a protocol constant - override it via
/// [AddressingConfig::new] when the vehicle needs a different slot.
pub const DEFAULT_TARGET_ADDRESS: &str = "01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
/// The fixed adapter initialization sequence, in wire order.
///
/// Order matters: echo must be off before any later logic parses headers,
/// and protocol selection must follow the warm start. Declaration order here
/// is the transmission order.
pub enum InitCommand {
    /// `ATWS` - warm start (reset without dropping the serial link)
    WarmStart,
    /// `ATE0` - echo off
    EchoOff,
    /// `ATM0` - memory off
    MemoryOff,
    /// `ATS0` - spaces off
    SpacesOff,
    /// `ATAT1` - adaptive timing, automatic
    AdaptiveTimingAuto,
    /// `ATH1` - headers on
    HeadersOn,
    /// `ATSP6` - select protocol 6 (ISO 15765-4, 11-bit CAN, 500 kbit/s)
    SelectProtocolCan11,
    /// `ATS0` - spaces off, repeated after protocol selection
    SpacesOffRepeat,
    /// `ATDPN` - describe protocol by number, confirms the selection took
    DescribeProtocol,
}

impl InitCommand {
    /// The AT command string for this step
    pub fn as_str(&self) -> &'static str {
        match self {
            InitCommand::WarmStart => "ATWS",
            InitCommand::EchoOff => "ATE0",
            InitCommand::MemoryOff => "ATM0",
            InitCommand::SpacesOff => "ATS0",
            InitCommand::AdaptiveTimingAuto => "ATAT1",
            InitCommand::HeadersOn => "ATH1",
            InitCommand::SelectProtocolCan11 => "ATSP6",
            InitCommand::SpacesOffRepeat => "ATS0",
            InitCommand::DescribeProtocol => "ATDPN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Addressing configuration for one target ECU
pub struct AddressingConfig {
    /// Bus header value of the ECU, as a hex string (e.g. `6F1`)
    pub ecu_address: String,
    /// Target/extended address slot, as a hex string (e.g. `01`)
    pub target_address: String,
    /// Selects the extended-flow-control header verb (`ATFCSH`) instead of
    /// the standard one (`ATSH`)
    pub extended: bool,
}

impl AddressingConfig {
    /// Creates a validated addressing configuration. Both addresses must be
    /// non-empty hexadecimal strings.
    pub fn new<E, T>(ecu_address: E, target_address: T, extended: bool) -> ScanOpResult<Self>
    where
        E: Into<String>,
        T: Into<String>,
    {
        let ecu_address = ecu_address.into();
        let target_address = target_address.into();
        validate_hex(&ecu_address)?;
        validate_hex(&target_address)?;
        Ok(Self {
            ecu_address,
            target_address,
            extended,
        })
    }

    /// Standard (non-extended) addressing with the default target slot
    pub fn standard<E: Into<String>>(ecu_address: E) -> ScanOpResult<Self> {
        Self::new(ecu_address, DEFAULT_TARGET_ADDRESS, false)
    }

    fn header_command(&self) -> String {
        if self.extended {
            format!("ATFCSH{}", self.ecu_address)
        } else {
            format!("ATSH{}", self.ecu_address)
        }
    }
}

fn validate_hex(addr: &str) -> ScanOpResult<()> {
    if addr.is_empty() || !addr.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ScanError::InvalidAddress(addr.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Lifecycle state of an [AdapterSession]
pub enum SessionState {
    /// Transport not yet opened (or torn down)
    Disconnected,
    /// Transport open, adapter not yet initialized
    Connected,
    /// Initialization sequence sent
    Initialized,
    /// Addressing configured for the named ECU
    Configured {
        /// ECU address currently written to the adapter
        ecu: String,
    },
    /// A PID query has been issued against the named ECU's configuration
    Queried {
        /// ECU address the last query ran against
        ecu: String,
    },
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connected => "Connected",
            SessionState::Initialized => "Initialized",
            SessionState::Configured { .. } => "Configured",
            SessionState::Queried { .. } => "Queried",
        }
    }

    fn configured_ecu(&self) -> Option<&str> {
        match self {
            SessionState::Configured { ecu } | SessionState::Queried { ecu } => Some(ecu),
            _ => None,
        }
    }
}

/// A live session with one adapter over one exclusively-owned transport
#[derive(Debug)]
pub struct AdapterSession {
    channel: CommandChannel,
    state: SessionState,
    closed: bool,
}

impl AdapterSession {
    /// Creates a session over the given transport with default timing
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            channel: CommandChannel::new(transport),
            state: SessionState::Disconnected,
            closed: false,
        }
    }

    /// Creates a session with an explicit timing policy
    pub fn with_timing(transport: Box<dyn Transport>, timing: Box<dyn TimingPolicy>) -> Self {
        Self {
            channel: CommandChannel::with_timing(transport, timing),
            state: SessionState::Disconnected,
            closed: false,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Opens the transport and runs the fixed initialization sequence.
    ///
    /// A transport-open failure is fatal to the whole session and is
    /// surfaced to the caller. Individual initialization commands that fail
    /// are logged and skipped over - the adapter usually recovers - but the
    /// sequence itself always runs start to finish, in order, exactly once.
    pub fn connect(&mut self) -> ScanOpResult<()> {
        self.ensure_not_closed()?;
        if self.state != SessionState::Disconnected {
            return Err(ScanError::InvalidState {
                state: self.state.name(),
            });
        }
        self.channel.open()?;
        self.state = SessionState::Connected;

        for cmd in InitCommand::iter() {
            match self.channel.send(cmd.as_str()) {
                Ok(resp) => log::debug!("Init {:?} -> {resp:?}", cmd.as_str()),
                Err(e) => log::warn!("Init command {:?} failed: {e}", cmd.as_str()),
            }
        }
        log::info!("Adapter initialization sequence sent");
        self.state = SessionState::Initialized;
        Ok(())
    }

    /// Writes the addressing configuration for one ECU and the flow-control
    /// data pattern for the PID about to be queried.
    ///
    /// Re-entering this for a different ECU just overwrites the adapter's
    /// registers; no teardown of the previous configuration happens or is
    /// needed.
    pub fn configure(&mut self, config: &AddressingConfig, pid: &str) -> ScanOpResult<()> {
        self.ensure_not_closed()?;
        if matches!(
            self.state,
            SessionState::Disconnected | SessionState::Connected
        ) {
            return Err(ScanError::InvalidState {
                state: self.state.name(),
            });
        }

        // Timeout multiplier first, then header, then the flow-control block
        self.channel.send("ATST96")?;
        self.channel.send(&config.header_command())?;
        self.channel
            .send(&format!("ATCEA{}", config.target_address))?;
        self.channel
            .send(&format!("ATCRA6{}", config.target_address))?;
        self.channel.send(&format!("ATFCSD0{pid}"))?;
        self.channel.send("ATFCSM1")?;

        self.state = SessionState::Configured {
            ecu: config.ecu_address.clone(),
        };
        Ok(())
    }

    /// Sends the PID itself as the diagnostic request and returns the raw
    /// response. Legal only while configured for an ECU.
    pub fn query(&mut self, pid: &str) -> ScanOpResult<String> {
        self.ensure_not_closed()?;
        let ecu = match self.state.configured_ecu() {
            Some(e) => e.to_string(),
            None => {
                return Err(ScanError::InvalidState {
                    state: self.state.name(),
                });
            }
        };
        let response = self.channel.send(pid)?;
        self.state = SessionState::Queried { ecu };
        Ok(response)
    }

    /// Closes the transport. Permitted from any state; every subsequent
    /// operation fails with [ScanError::SessionClosed].
    pub fn close(&mut self) {
        self.channel.close();
        self.state = SessionState::Disconnected;
        self.closed = true;
    }

    fn ensure_not_closed(&self) -> ScanOpResult<()> {
        if self.closed {
            Err(ScanError::SessionClosed)
        } else {
            Ok(())
        }
    }
}
