//! Simulation transport for unit testing the protocol layers

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::transport::{Transport, TransportError, TransportResult};

/// In-memory transport that answers scripted commands.
///
/// Writes are recorded verbatim. If a written command (CR included) has an
/// entry in the request/response map, the mapped response bytes are queued
/// for the next [Transport::read_available] call. Unmapped commands produce
/// no response, which models an adapter staying silent.
///
/// Clones share state, so a test can keep one clone for inspection while the
/// session owns the other.
#[derive(Debug, Clone, Default)]
pub struct SimulationTransport {
    open: Arc<RwLock<bool>>,
    req_resp_map: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
    rx_buffer: Arc<RwLock<Vec<u8>>>,
    sent: Arc<RwLock<Vec<Vec<u8>>>>,
    fail_open: Arc<RwLock<bool>>,
    fail_writes_of: Arc<RwLock<Option<Vec<u8>>>>,
}

impl SimulationTransport {
    /// Creates an empty simulation transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a command (without terminator) to a canned response
    pub fn add_response(&self, request: &str, response: &str) {
        let mut key = request.as_bytes().to_vec();
        key.push(b'\r');
        self.req_resp_map
            .write()
            .unwrap()
            .insert(key, response.as_bytes().to_vec());
    }

    /// Makes the next [Transport::open] call fail
    pub fn fail_next_open(&self) {
        *self.fail_open.write().unwrap() = true;
    }

    /// Makes every write of the given command (without terminator) fail with
    /// an io error
    pub fn fail_writes_of(&self, request: &str) {
        let mut key = request.as_bytes().to_vec();
        key.push(b'\r');
        *self.fail_writes_of.write().unwrap() = Some(key);
    }

    /// Returns every write made so far, decoded as text
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    /// Clears the recorded write log
    pub fn clear_sent(&self) {
        self.sent.write().unwrap().clear();
    }
}

impl Transport for SimulationTransport {
    fn open(&mut self) -> TransportResult<()> {
        if std::mem::take(&mut *self.fail_open.write().unwrap()) {
            return Err(TransportError::Open("simulated open failure".into()));
        }
        *self.open.write().unwrap() = true;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> TransportResult<()> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        if self.fail_writes_of.read().unwrap().as_deref() == Some(bytes) {
            return Err(TransportError::Write(std::io::Error::other(
                "simulated write failure",
            )));
        }
        self.sent.write().unwrap().push(bytes.to_vec());
        if let Some(resp) = self.req_resp_map.read().unwrap().get(bytes) {
            self.rx_buffer.write().unwrap().extend_from_slice(resp);
        }
        Ok(())
    }

    fn read_available(&mut self) -> TransportResult<Vec<u8>> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        Ok(std::mem::take(&mut *self.rx_buffer.write().unwrap()))
    }

    fn close(&mut self) {
        *self.open.write().unwrap() = false;
    }

    fn is_open(&self) -> bool {
        *self.open.read().unwrap()
    }
}
