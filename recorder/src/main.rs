mod csv_log;
mod live;
mod websocket;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io::{self, BufReader};
use std::net::{IpAddr, TcpListener};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use rigdaq::config::{DaqConfig, Preset};
use rigdaq::{DaqError, RecordReader};

use csv_log::CsvLog;
use live::{Decimator, LiveFeed};
use websocket::websocket_thread;

const READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(version, about = "Records a rig DAQ stream to CSV and serves a live feed")]
struct Args {
    /// Serial port the sampler is attached to
    port: String,
    /// JSON rig configuration, must match the one the sampler runs with
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "rocket-motor")]
    preset: Preset,
    /// Directory the CSV file is written to
    #[arg(long, default_value = "csv_files")]
    dir: PathBuf,
    /// CSV file name, defaults to data_<date>,<time>.csv
    #[arg(long)]
    file_name: Option<String>,
    /// Do not write a CSV file
    #[arg(long)]
    no_file: bool,
    /// Live feed refresh period in milliseconds
    #[arg(long, default_value = "25")]
    update_rate: u32,
    /// Number of points kept in the live window
    #[arg(long, default_value = "250")]
    max_size: usize,
    #[arg(long, default_value = "127.0.0.1")]
    interface: IpAddr,
    #[arg(long, default_value = "10013")]
    ws_port: u16,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DaqConfig::load(path).with_context(|| format!("Error loading \"{}\"", path.display()))?,
        None => DaqConfig::preset(args.preset),
    };
    let channels: Vec<String> = config.channels.iter().map(|c| c.name.clone()).collect();

    let port = serialport::new(&args.port, config.baud_rate)
        .timeout(READ_TIMEOUT)
        .open()
        .with_context(|| format!("Error opening \"{}\"", args.port))?;
    info!("Reading {:?} records from {} at {} baud", config.encoding, args.port, config.baud_rate);

    let mut csv_log = if args.no_file {
        None
    } else {
        let log = CsvLog::create(&args.dir, args.file_name.as_deref(), &channels)?;
        info!("Writing records to {}", log.path().display());
        Some(log)
    };

    let feed = Arc::new(Mutex::new(LiveFeed::new(channels.clone(), args.max_size)));
    let server = TcpListener::bind((args.interface, args.ws_port))
        .with_context(|| format!("Error binding {}:{}", args.interface, args.ws_port))?;
    info!("WebSocket live feed listening on {}:{}", args.interface, args.ws_port);
    {
        let feed = Arc::clone(&feed);
        let update_rate = Duration::from_millis(args.update_rate as u64);
        thread::spawn(move || websocket_thread(server, feed, update_rate));
    }

    let mut decimator = Decimator::new(args.update_rate, config.sensor_rate_ms);
    let mut reader = RecordReader::new(BufReader::new(port), config.encoding, channels.len());
    loop {
        let sample = match reader.next_record() {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                info!("Serial port closed");
                return Ok(());
            }
            Err(DaqError::Io(e)) if e.kind() == io::ErrorKind::TimedOut => continue,
            // banners and partial lines show up in text mode
            Err(e @ DaqError::TextRecord { .. }) => {
                warn!("Skipping {}", e);
                continue;
            }
            Err(e) => return Err(e).context("Error reading the record stream"),
        };

        if let Some(log) = csv_log.as_mut() {
            log.append(&sample)?;
        }
        if decimator.accept() {
            feed.lock().unwrap_or_else(PoisonError::into_inner).push(&sample);
        }
    }
}
