#![warn(
    missing_docs,
    missing_debug_implementations,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications,
    clippy::uninlined_format_args
)]

//! A crate for driving ELM327-class AT-command diagnostic adapters over a
//! serial link, and for enumerating which ECU address / PID combinations on a
//! vehicle's diagnostic bus return valid data.
//!
//! ## How it works
//!
//! The ELM327 is a half-duplex, line-oriented interpreter. Every request is a
//! single text command terminated by a carriage return, and the adapter
//! offers no explicit end-of-response signal, so this crate uses the
//! adapter's own fixed-delay contract: write the command, pause long enough
//! for the adapter to finish talking to the vehicle, then drain whatever
//! arrived. Diagnostic service `22` requests are given a longer pause than
//! plain `AT` configuration commands since the vehicle side may need several
//! CAN frames to answer.
//!
//! Layers, bottom up:
//! * [transport::Transport] - a byte-stream duplex connection (the serial
//!   port, or a simulation for testing)
//! * [channel::CommandChannel] - one command in, one raw response out, with
//!   the timing policy applied in between
//! * [session::AdapterSession] - adapter initialization and per-ECU
//!   addressing configuration
//! * [scan::ScanOrchestrator] - walks the ECU x PID search space and
//!   classifies each response
//!
//! ## Scanning
//!
//! ```no_run
//! use elm_scan::scan::{NullObserver, ScanOrchestrator};
//! use elm_scan::session::AdapterSession;
//! use elm_scan::transport::serial::SerialTransport;
//! use std::time::Duration;
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", 38400, Duration::from_secs(1));
//! let session = AdapterSession::new(Box::new(transport));
//! let mut orchestrator = ScanOrchestrator::new(session, Box::new(NullObserver));
//! let results = orchestrator.run(&["6F1".into()], &["224002".into()], false).unwrap();
//! for r in results.iter().filter(|r| r.is_valid) {
//!     println!("{} {} -> {}", r.ecu, r.pid, r.response);
//! }
//! ```

use crate::channel::ChannelError;

pub mod channel;
pub mod response;
pub mod scan;
pub mod session;
pub mod transport;

/// Scanner operation result
pub type ScanOpResult<T> = Result<T, ScanError>;

#[derive(Debug, thiserror::Error)]
/// Top level scanner error
pub enum ScanError {
    /// Operation attempted after the session was torn down
    #[error("session is closed")]
    SessionClosed,
    /// Operation attempted in a session state that does not permit it
    #[error("operation not permitted in session state '{state}'")]
    InvalidState {
        /// Name of the state the session was in
        state: &'static str,
    },
    /// An ECU or target address failed hex validation
    #[error("'{0}' is not a valid hexadecimal address")]
    InvalidAddress(String),
    /// The ECU or PID list handed to the orchestrator was empty
    #[error("ECU and PID lists must both be non-empty")]
    EmptyScanList,
    /// Error with the underlying command channel
    #[error("command channel error")]
    Channel(
        #[from]
        #[source]
        ChannelError,
    ),
}
