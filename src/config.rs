use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::adc::Gain;
use crate::convert;
use crate::error::{DaqError, Result};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_SENSOR_RATE_MS: u32 = 10;
pub const DEFAULT_TEXT_PRECISION: usize = 2;
pub const ADS1115_DEFAULT_ADDRESS: u16 = 0x48;

/// Pressure transducer span for a 0-1000 psi part, in bar.
pub const PT_SPAN_BAR: f32 = 68.9476;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Text,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelSource {
    Adc { mux: u8 },
    Thermocouple { chip_select: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conversion {
    CurrentLoop { shunt_ohms: f32, span: f32 },
    Celsius,
}

impl Conversion {
    pub fn apply(&self, raw: f32) -> f32 {
        match *self {
            Conversion::CurrentLoop { shunt_ohms, span } => convert::current_loop(raw, shunt_ohms, span),
            Conversion::Celsius => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub source: ChannelSource,
    pub conversion: Conversion,
}

impl ChannelConfig {
    pub fn current_loop(name: &str, mux: u8, shunt_ohms: f32, span: f32) -> Self {
        ChannelConfig {
            name: String::from(name),
            source: ChannelSource::Adc { mux },
            conversion: Conversion::CurrentLoop { shunt_ohms, span },
        }
    }

    pub fn thermocouple(name: &str, chip_select: u8) -> Self {
        ChannelConfig {
            name: String::from(name),
            source: ChannelSource::Thermocouple { chip_select },
            conversion: Conversion::Celsius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdcSettings {
    pub i2c_bus: u8,
    pub address: u16,
    pub gain: Gain,
    /// Data rate index, 0 (8 SPS) to 7 (860 SPS).
    pub data_rate: u8,
}

impl Default for AdcSettings {
    fn default() -> Self {
        AdcSettings {
            i2c_bus: 1,
            address: ADS1115_DEFAULT_ADDRESS,
            gain: Gain::One,
            data_rate: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaqConfig {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_sensor_rate")]
    pub sensor_rate_ms: u32,
    pub encoding: Encoding,
    #[serde(default = "default_text_precision")]
    pub text_precision: usize,
    #[serde(default)]
    pub adc: AdcSettings,
    #[serde(default)]
    pub spi_bus: u8,
    pub channels: Vec<ChannelConfig>,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_sensor_rate() -> u32 {
    DEFAULT_SENSOR_RATE_MS
}

fn default_text_precision() -> usize {
    DEFAULT_TEXT_PRECISION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    WaterFlow,
    RocketMotor,
}

impl DaqConfig {
    /// Single 0-200 slm flow meter behind a 150 ohm shunt.
    pub fn water_flow() -> Self {
        DaqConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            sensor_rate_ms: DEFAULT_SENSOR_RATE_MS,
            encoding: Encoding::Binary,
            text_precision: DEFAULT_TEXT_PRECISION,
            adc: AdcSettings::default(),
            spi_bus: 0,
            channels: vec![ChannelConfig::current_loop("FM (slm)", 0, 150.0, 200.0)],
        }
    }

    /// Two pressure transducers, a mass flow meter and two thermocouples.
    pub fn rocket_motor() -> Self {
        DaqConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            sensor_rate_ms: DEFAULT_SENSOR_RATE_MS,
            encoding: Encoding::Binary,
            text_precision: DEFAULT_TEXT_PRECISION,
            adc: AdcSettings::default(),
            spi_bus: 0,
            channels: vec![
                ChannelConfig::current_loop("PT1 (barg)", 0, 150.0, PT_SPAN_BAR),
                ChannelConfig::current_loop("PT2 (barg)", 1, 150.0, PT_SPAN_BAR),
                ChannelConfig::current_loop("FM (g/s)", 2, 150.0, 833.0),
                ChannelConfig::thermocouple("TC1 (degC)", 0),
                ChannelConfig::thermocouple("TC2 (degC)", 1),
            ],
        }
    }

    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::WaterFlow => Self::water_flow(),
            Preset::RocketMotor => Self::rocket_motor(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: DaqConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(DaqError::Config("at least one channel is required".into()));
        }
        if self.sensor_rate_ms == 0 {
            return Err(DaqError::Config("sensor_rate_ms must be positive".into()));
        }
        if self.adc.data_rate > 7 {
            return Err(DaqError::Config(format!(
                "ADC data rate index {} is out of range 0-7",
                self.adc.data_rate
            )));
        }

        let mut names = HashSet::new();
        for channel in &self.channels {
            if !names.insert(channel.name.as_str()) {
                return Err(DaqError::Config(format!("duplicate channel name {:?}", channel.name)));
            }
            match (channel.source, channel.conversion) {
                (ChannelSource::Adc { mux }, Conversion::CurrentLoop { shunt_ohms, .. }) => {
                    if mux > 3 {
                        return Err(DaqError::Config(format!(
                            "{}: ADC multiplexer index {} is out of range 0-3",
                            channel.name, mux
                        )));
                    }
                    if shunt_ohms.is_nan() || shunt_ohms <= 0.0 {
                        return Err(DaqError::Config(format!(
                            "{}: shunt resistance must be positive",
                            channel.name
                        )));
                    }
                }
                (ChannelSource::Thermocouple { .. }, Conversion::Celsius) => {}
                _ => {
                    return Err(DaqError::Config(format!(
                        "{}: conversion does not match its source",
                        channel.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn thermocouple_chip_selects(&self) -> Vec<u8> {
        let mut selects: Vec<u8> = self
            .channels
            .iter()
            .filter_map(|c| match c.source {
                ChannelSource::Thermocouple { chip_select } => Some(chip_select),
                ChannelSource::Adc { .. } => None,
            })
            .collect();
        selects.sort_unstable();
        selects.dedup();
        selects
    }

    /// Bytes per binary record: the timestamp plus one float per channel.
    pub fn record_len(&self) -> usize {
        crate::record::binary_len(self.channels.len())
    }
}
