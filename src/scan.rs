//! Scan orchestration across the ECU x PID search space
//!
//! The orchestrator walks the cross product strictly sequentially, in list
//! order, re-running the full addressing sequence for every task. The
//! adapter's addressing state is shared and overwritten per task, so nothing
//! here may ever be pipelined or parallelized. Results are streamed to the
//! observer the moment they exist: a long scan produces incremental output,
//! and an abort mid-scan leaves every completed task's result intact.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::response::classify;
use crate::session::{AdapterSession, AddressingConfig, SessionState, DEFAULT_TARGET_ADDRESS};
use crate::{ScanError, ScanOpResult};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Outcome of probing one (ECU, PID) pair
pub struct ScanResult {
    /// ECU address that was probed
    pub ecu: String,
    /// PID that was requested
    pub pid: String,
    /// Raw adapter response (or an `ERROR: ...` marker if the task itself
    /// failed at the channel level)
    pub response: String,
    /// Whether the response classified as valid diagnostic data
    pub is_valid: bool,
}

/// Receives each [ScanResult] as soon as it is produced
pub trait ScanObserver {
    /// Called once per completed task, in scan order
    fn on_result(&mut self, result: &ScanResult);
}

#[derive(Debug, Clone, Copy, Default)]
/// Observer that discards every result. For embedders that only want the
/// returned sequence.
pub struct NullObserver;

impl ScanObserver for NullObserver {
    fn on_result(&mut self, _result: &ScanResult) {}
}

/// Observer writing two append-only logs: every attempt, and valid results
/// only. Both files are truncated when the writer is created, i.e. once per
/// run.
#[derive(Debug)]
pub struct ScanLogWriter {
    all: File,
    valid: File,
}

impl ScanLogWriter {
    /// Creates (truncating) the two log files
    pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(all_path: P, valid_path: Q) -> io::Result<Self> {
        Ok(Self {
            all: File::create(all_path)?,
            valid: File::create(valid_path)?,
        })
    }

    fn write_line(file: &mut File, result: &ScanResult) {
        let line = format!(
            "ECU: {} | PID: {} | Response: {}",
            result.ecu, result.pid, result.response
        );
        if let Err(e) = writeln!(file, "{line}").and_then(|_| file.flush()) {
            log::error!("Failed to write scan log entry: {e}");
        }
    }
}

impl ScanObserver for ScanLogWriter {
    fn on_result(&mut self, result: &ScanResult) {
        Self::write_line(&mut self.all, result);
        if result.is_valid {
            Self::write_line(&mut self.valid, result);
        }
    }
}

/// Walks the ECU x PID cross product over one adapter session
pub struct ScanOrchestrator {
    session: AdapterSession,
    observer: Box<dyn ScanObserver>,
    target_address: String,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ScanOrchestrator {{ session: {:?}, target: {} }}",
            self.session, self.target_address
        )
    }
}

impl ScanOrchestrator {
    /// Creates an orchestrator over a session, with the default target
    /// address slot
    pub fn new(session: AdapterSession, observer: Box<dyn ScanObserver>) -> Self {
        Self {
            session,
            observer,
            target_address: DEFAULT_TARGET_ADDRESS.to_string(),
        }
    }

    /// Overrides the target/extended address slot used for every task
    pub fn set_target_address<T: Into<String>>(&mut self, target: T) {
        self.target_address = target.into();
    }

    /// Runs the scan and returns all results in task order.
    ///
    /// For each ECU, in list order, each PID is probed in list order;
    /// duplicates are re-scanned, never de-duplicated. Every task re-runs
    /// the full addressing sequence, even when the ECU matches the previous
    /// task's, since the adapter-side state is never assumed cached.
    ///
    /// A failure to open the transport aborts the run (no session, no scan).
    /// A channel-level failure on an individual task does not: it is logged,
    /// recorded as an invalid result carrying an `ERROR:` marker, and the
    /// remaining matrix continues.
    pub fn run(
        &mut self,
        ecu_list: &[String],
        pid_list: &[String],
        extended: bool,
    ) -> ScanOpResult<Vec<ScanResult>> {
        if ecu_list.is_empty() || pid_list.is_empty() {
            return Err(ScanError::EmptyScanList);
        }

        // Validate the whole address list up front so a typo fails fast
        // instead of half way through a long scan
        let configs: Vec<AddressingConfig> = ecu_list
            .iter()
            .map(|ecu| AddressingConfig::new(ecu.clone(), self.target_address.clone(), extended))
            .collect::<ScanOpResult<_>>()?;

        if *self.session.state() == SessionState::Disconnected {
            self.session.connect()?;
        }

        let total = ecu_list.len() * pid_list.len();
        log::info!(
            "Scanning {} ECU(s) x {} PID(s) = {total} task(s)",
            ecu_list.len(),
            pid_list.len()
        );

        let mut results = Vec::with_capacity(total);
        for config in &configs {
            for pid in pid_list {
                log::info!("Scanning ECU {} with PID {pid}", config.ecu_address);
                let result = match self.run_task(config, pid) {
                    Ok(response) => {
                        let is_valid = classify(&response).is_valid();
                        if is_valid {
                            log::info!(
                                "Valid response from ECU {}, PID {pid}: {response}",
                                config.ecu_address
                            );
                        } else {
                            log::info!("No valid data from ECU {}, PID {pid}", config.ecu_address);
                        }
                        ScanResult {
                            ecu: config.ecu_address.clone(),
                            pid: pid.clone(),
                            response,
                            is_valid,
                        }
                    }
                    Err(ScanError::Channel(e)) => {
                        log::warn!(
                            "Task failed for ECU {}, PID {pid}: {e}",
                            config.ecu_address
                        );
                        ScanResult {
                            ecu: config.ecu_address.clone(),
                            pid: pid.clone(),
                            response: format!("ERROR: {e}"),
                            is_valid: false,
                        }
                    }
                    Err(other) => return Err(other),
                };
                self.observer.on_result(&result);
                results.push(result);
            }
        }
        Ok(results)
    }

    fn run_task(&mut self, config: &AddressingConfig, pid: &str) -> ScanOpResult<String> {
        self.session.configure(config, pid)?;
        self.session.query(pid)
    }

    /// Tears the session down. Further runs will fail with
    /// [ScanError::SessionClosed].
    pub fn close(&mut self) {
        self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::FixedDelayTiming;
    use crate::transport::simulation::SimulationTransport;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingObserver {
        seen: Arc<Mutex<Vec<ScanResult>>>,
    }

    impl ScanObserver for RecordingObserver {
        fn on_result(&mut self, result: &ScanResult) {
            self.seen.lock().unwrap().push(result.clone());
        }
    }

    fn orchestrator(sim: &SimulationTransport, observer: RecordingObserver) -> ScanOrchestrator {
        let session = AdapterSession::with_timing(
            Box::new(sim.clone()),
            Box::new(FixedDelayTiming::immediate()),
        );
        ScanOrchestrator::new(session, Box::new(observer))
    }

    fn queries(sim: &SimulationTransport) -> Vec<String> {
        // Task queries are the only non-AT commands on the wire
        sim.sent_commands()
            .into_iter()
            .filter(|c| !c.starts_with("AT"))
            .collect()
    }

    #[test]
    fn cross_product_runs_in_row_major_list_order() {
        let sim = SimulationTransport::new();
        sim.add_response("2240", "62 40 01");
        let observer = RecordingObserver::default();
        let mut orch = orchestrator(&sim, observer.clone());

        let results = orch
            .run(
                &["6F1".into(), "6F2".into()],
                &["2240".into(), "2241".into()],
                false,
            )
            .unwrap();

        let pairs: Vec<(String, String)> = results
            .iter()
            .map(|r| (r.ecu.clone(), r.pid.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("6F1".into(), "2240".into()),
                ("6F1".into(), "2241".into()),
                ("6F2".into(), "2240".into()),
                ("6F2".into(), "2241".into()),
            ]
        );
        assert_eq!(queries(&sim), vec!["2240\r", "2241\r", "2240\r", "2241\r"]);
        // Streaming: the observer saw everything, in order
        assert_eq!(*observer.seen.lock().unwrap(), results);
    }

    #[test]
    fn revisited_ecu_reruns_the_full_addressing_sequence() {
        let sim = SimulationTransport::new();
        let observer = RecordingObserver::default();
        let mut orch = orchestrator(&sim, observer);

        orch.run(
            &["6F1".into(), "6F2".into(), "6F1".into()],
            &["2240".into()],
            false,
        )
        .unwrap();

        let headers: Vec<String> = sim
            .sent_commands()
            .into_iter()
            .filter(|c| c.starts_with("ATSH"))
            .collect();
        assert_eq!(headers, vec!["ATSH6F1\r", "ATSH6F2\r", "ATSH6F1\r"]);
    }

    #[test]
    fn duplicate_pids_are_rescanned() {
        let sim = SimulationTransport::new();
        let observer = RecordingObserver::default();
        let mut orch = orchestrator(&sim, observer);

        let results = orch
            .run(&["6F1".into()], &["2240".into(), "2240".into()], false)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(queries(&sim), vec!["2240\r", "2240\r"]);
    }

    #[test]
    fn responses_are_classified_per_marker_rules() {
        let sim = SimulationTransport::new();
        sim.add_response("2240", "62 40 01 AB");
        sim.add_response("2241", "NO DATA");
        let observer = RecordingObserver::default();
        let mut orch = orchestrator(&sim, observer);

        let results = orch
            .run(&["6F1".into()], &["2240".into(), "2241".into()], false)
            .unwrap();
        assert!(results[0].is_valid);
        assert!(!results[1].is_valid);
        assert_eq!(results[1].response, "NO DATA");
    }

    #[test]
    fn unanswered_queries_classify_invalid() {
        let sim = SimulationTransport::new();
        let observer = RecordingObserver::default();
        let mut orch = orchestrator(&sim, observer);

        let results = orch.run(&["6F1".into()], &["2299".into()], false).unwrap();
        assert!(!results[0].is_valid);
        assert_eq!(results[0].response, "");
    }

    #[test]
    fn empty_lists_are_rejected() {
        let sim = SimulationTransport::new();
        let mut orch = orchestrator(&sim, RecordingObserver::default());
        assert!(matches!(
            orch.run(&[], &["2240".into()], false),
            Err(ScanError::EmptyScanList)
        ));
        assert!(matches!(
            orch.run(&["6F1".into()], &[], false),
            Err(ScanError::EmptyScanList)
        ));
    }

    #[test]
    fn invalid_ecu_address_fails_before_any_task_runs() {
        let sim = SimulationTransport::new();
        let mut orch = orchestrator(&sim, RecordingObserver::default());
        assert!(matches!(
            orch.run(&["XYZ".into()], &["2240".into()], false),
            Err(ScanError::InvalidAddress(_))
        ));
        assert!(sim.sent_commands().is_empty());
    }

    #[test]
    fn channel_failure_on_one_task_does_not_abort_the_matrix() {
        let sim = SimulationTransport::new();
        sim.add_response("2241", "62 41 00");
        sim.fail_writes_of("2240");
        let observer = RecordingObserver::default();
        let mut orch = orchestrator(&sim, observer);

        let results = orch
            .run(&["6F1".into()], &["2240".into(), "2241".into()], false)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[0].is_valid);
        assert!(results[0].response.starts_with("ERROR:"));
        assert!(results[1].is_valid);
    }

    #[test]
    fn open_failure_aborts_the_run() {
        let sim = SimulationTransport::new();
        sim.fail_next_open();
        let mut orch = orchestrator(&sim, RecordingObserver::default());
        assert!(orch.run(&["6F1".into()], &["2240".into()], false).is_err());
    }
}
