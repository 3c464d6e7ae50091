use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;

use rigdaq::adc::AdcReader;
use rigdaq::clock::SystemClock;
use rigdaq::config::{DaqConfig, Preset};
use rigdaq::record::{BANNER, write_banner};
use rigdaq::sampler::Sampler;
use rigdaq::serial::{DEFAULT_PORT, SerialLink};
use rigdaq::thermocouple::ThermocoupleBank;

#[derive(Parser)]
#[command(version, about = "Fixed-rate sensor sampler for motor and flow test rigs")]
struct Args {
    /// JSON rig configuration, takes precedence over --preset
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "water-flow")]
    preset: Preset,
    /// UART the records are written to
    #[arg(long, default_value = DEFAULT_PORT)]
    port: PathBuf,
    /// Write records to stdout instead of the UART
    #[arg(long)]
    stdout: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DaqConfig::load(path).with_context(|| format!("Error loading \"{}\"", path.display()))?,
        None => DaqConfig::preset(args.preset),
    };

    info!(
        "Starting rig DAQ: {} channel(s) every {} ms, {:?} records of {} bytes",
        config.channels.len(),
        config.sensor_rate_ms,
        config.encoding,
        config.record_len()
    );
    for (i, channel) in config.channels.iter().enumerate() {
        info!("  [{}] {} <- {:?}", i, channel.name, channel.source);
    }

    // every device has to answer before a single record goes out
    let mut adc = AdcReader::new(&config.adc).context("ADC startup failed")?;
    let mut thermocouples = ThermocoupleBank::new(config.spi_bus, &config.thermocouple_chip_selects())
        .context("Thermocouple startup failed")?;

    if args.stdout {
        stream(&config, &mut adc, &mut thermocouples, io::stdout().lock())
    } else {
        let link = SerialLink::open(&args.port, config.baud_rate)
            .with_context(|| format!("Error opening \"{}\"", args.port.display()))?;
        stream(&config, &mut adc, &mut thermocouples, link)
    }
}

fn stream<W: Write>(
    config: &DaqConfig,
    adc: &mut AdcReader,
    thermocouples: &mut ThermocoupleBank,
    mut out: W,
) -> Result<()> {
    write_banner(&mut out, config.encoding)?;
    info!("{BANNER}");

    let clock = SystemClock::new();
    let mut sampler = Sampler::new(config, adc, thermocouples);
    sampler.run(&clock, &mut out).context("Serial link failed")
}
