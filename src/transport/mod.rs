//! Byte-stream transports for reaching the adapter
//!
//! The adapter itself only requires a duplex byte stream with a bounded read,
//! so the trait here is deliberately narrow. Two implementations are
//! provided:
//! * [serial::SerialTransport] - a real serial (USB) port
//! * [simulation::SimulationTransport] - an in-memory transport for unit
//!   testing higher layers without hardware

pub mod serial;
pub mod simulation;

/// Transport operation result
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
/// Error produced by a transport
pub enum TransportError {
    /// The transport could not be opened. Fatal: no session is possible
    /// without an open transport
    #[error("failed to open transport: {0}")]
    Open(String),
    /// Writing to the transport failed
    #[error("transport write failed")]
    Write(#[source] std::io::Error),
    /// Reading from the transport failed
    #[error("transport read failed")]
    Read(#[source] std::io::Error),
    /// Operation attempted while the transport is not open
    #[error("transport is not open")]
    NotOpen,
}

/// A duplex byte-stream connection to the adapter.
///
/// The adapter is a half-duplex line device with no request framing, so a
/// transport is exclusively owned by one session for its whole lifetime.
/// Reads are a non-blocking drain: [Transport::read_available] returns
/// whatever bytes have arrived so far, which may be nothing. Deciding when a
/// response is complete is the caller's problem (see
/// [crate::channel::TimingPolicy]).
pub trait Transport: Send {
    /// Opens the connection. Calling this on an already open transport is a
    /// no-op.
    fn open(&mut self) -> TransportResult<()>;

    /// Writes the whole buffer to the connection
    fn write(&mut self, bytes: &[u8]) -> TransportResult<()>;

    /// Drains and returns all bytes currently buffered on the connection,
    /// without blocking for more
    fn read_available(&mut self) -> TransportResult<Vec<u8>>;

    /// Closes the connection. Safe to call in any state.
    fn close(&mut self);

    /// Returns true if the connection is currently open
    fn is_open(&self) -> bool;
}
