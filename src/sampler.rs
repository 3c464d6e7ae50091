//! Fixed-rate sampling loop.
//!
//! [`Sampler::tick`] is cheap when nothing is due: it compares the clock with
//! the last emission and returns. When a full sensor period has elapsed it
//! reads every channel in configuration order, converts, and writes one record.

use log::debug;
use std::io::Write;

use crate::clock::Clock;
use crate::config::{ChannelConfig, ChannelSource, DaqConfig};
use crate::error::Result;
use crate::record::Sample;

/// Shared ADC addressed by multiplexer index; yields volts.
pub trait AnalogInput {
    fn read_voltage(&mut self, channel: u8) -> Result<f32>;
}

/// Thermocouple converters addressed by chip select; yields degrees Celsius.
pub trait ThermocoupleInput {
    fn read_celsius(&mut self, chip_select: u8) -> Result<f32>;
}

pub struct Sampler<'a, A, T> {
    config: &'a DaqConfig,
    adc: &'a mut A,
    thermocouples: &'a mut T,
    last_emit: u32,
}

impl<'a, A: AnalogInput, T: ThermocoupleInput> Sampler<'a, A, T> {
    pub fn new(config: &'a DaqConfig, adc: &'a mut A, thermocouples: &'a mut T) -> Self {
        Sampler {
            config,
            adc,
            thermocouples,
            last_emit: 0,
        }
    }

    pub fn last_emit(&self) -> u32 {
        self.last_emit
    }

    pub fn is_due(&self, now: u32) -> bool {
        now.wrapping_sub(self.last_emit) >= self.config.sensor_rate_ms
    }

    /// Emits one record to `out` if a sensor period has elapsed at `now`.
    /// Returns whether a record was written.
    pub fn tick<W: Write>(&mut self, now: u32, out: &mut W) -> Result<bool> {
        if !self.is_due(now) {
            return Ok(false);
        }

        let sample = self.sample(now);
        sample.write_to(out, self.config.encoding, self.config.text_precision)?;
        self.last_emit = now;
        Ok(true)
    }

    /// Reads and converts every channel, in configuration order.
    pub fn sample(&mut self, timestamp: u32) -> Sample {
        let config = self.config;
        let values = config
            .channels
            .iter()
            .map(|channel| self.read_channel(channel))
            .collect();
        Sample::new(timestamp, values)
    }

    fn read_channel(&mut self, channel: &ChannelConfig) -> f32 {
        let raw = match channel.source {
            ChannelSource::Adc { mux } => self.adc.read_voltage(mux),
            ChannelSource::Thermocouple { chip_select } => self.thermocouples.read_celsius(chip_select),
        };

        match raw {
            Ok(value) => channel.conversion.apply(value),
            Err(e) => {
                // no retry, the record goes out with the sentinel
                debug!("{}: {}", channel.name, e);
                f32::NAN
            }
        }
    }

    /// Polls `clock` forever, never sleeping between ticks. Only returns on a
    /// write failure.
    pub fn run<C: Clock, W: Write>(&mut self, clock: &C, out: &mut W) -> Result<()> {
        loop {
            self.tick(clock.millis(), out)?;
        }
    }
}
