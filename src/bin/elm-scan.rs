//! ECU/PID scanner CLI for ELM327-class adapters.
//!
//! Cycles through each configured ECU address, queries each PID, and prints
//! a table of the combinations that returned valid diagnostic data. Every
//! attempt is also mirrored to a pair of log files.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use elm_scan::scan::{ScanLogWriter, ScanOrchestrator};
use elm_scan::session::{AdapterSession, DEFAULT_TARGET_ADDRESS};
use elm_scan::transport::serial::SerialTransport;

#[derive(Parser, Debug)]
#[command(name = "elm-scan")]
#[command(version, about = "ECU/PID scanner for ELM327-class serial adapters")]
struct Cli {
    /// Serial port of the adapter (e.g. COM3 or /dev/ttyUSB0)
    #[arg(short, long)]
    port: String,

    /// Serial baud rate
    #[arg(short, long, default_value_t = 38400)]
    baudrate: u32,

    /// Serial read timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    read_timeout_ms: u64,

    /// Use extended addressing (ATFCSH header verb instead of ATSH)
    #[arg(short, long)]
    extended: bool,

    /// Target/extended address slot written to the adapter
    #[arg(short, long, default_value = DEFAULT_TARGET_ADDRESS)]
    target_address: String,

    /// ECU addresses to scan, as hex strings (e.g. 6F1 A06 A08)
    #[arg(long, num_args = 1.., required = true)]
    ecus: Vec<String>,

    /// PID values to query, as hex strings (e.g. 224002)
    #[arg(long, num_args = 1.., required = true)]
    pids: Vec<String>,

    /// Directory for the per-run scan logs
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::builder()
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .init();

    let cli = Cli::parse();

    let observer = match ScanLogWriter::create(
        cli.log_dir.join("scan_all.log"),
        cli.log_dir.join("scan_valid.log"),
    ) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Failed to create scan logs in {}: {e}", cli.log_dir.display());
            return ExitCode::FAILURE;
        }
    };

    let transport = SerialTransport::new(
        cli.port,
        cli.baudrate,
        Duration::from_millis(cli.read_timeout_ms),
    );
    let session = AdapterSession::new(Box::new(transport));
    let mut orchestrator = ScanOrchestrator::new(session, Box::new(observer));
    orchestrator.set_target_address(cli.target_address);

    let results = match orchestrator.run(&cli.ecus, &cli.pids, cli.extended) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Scan aborted: {e}");
            orchestrator.close();
            return ExitCode::FAILURE;
        }
    };
    orchestrator.close();

    println!("\nScan complete. Valid ECU/PID responses:");
    for r in results.iter().filter(|r| r.is_valid) {
        println!("ECU: {} | PID: {} | Response: {}", r.ecu, r.pid, r.response);
    }
    ExitCode::SUCCESS
}
