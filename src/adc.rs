//! ADS1115 16-bit ADC, single-shot single-ended reads over I2C.

use serde::{Deserialize, Serialize};

#[cfg(feature = "rpi")]
use crate::config::AdcSettings;
#[cfg(feature = "rpi")]
use crate::error::{DaqError, Result};
#[cfg(feature = "rpi")]
use crate::sampler::AnalogInput;
#[cfg(feature = "rpi")]
use log::info;
#[cfg(feature = "rpi")]
use rppal::i2c::I2c;

pub const REG_CONVERSION: u8 = 0x00;
pub const REG_CONFIG: u8 = 0x01;

const CONFIG_OS_SINGLE: u16 = 0x8000;
const CONFIG_MUX_SINGLE_ENDED: u16 = 0x4000;
const CONFIG_MODE_SINGLE_SHOT: u16 = 0x0100;
const CONFIG_COMP_DISABLE: u16 = 0x0003;

#[cfg(feature = "rpi")]
const CONVERSION_POLLS: u32 = 500;

/// Programmable gain, named after the multiplier the ADS1X15 Arduino library uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gain {
    /// +/-6.144 V
    TwoThirds,
    /// +/-4.096 V
    One,
    /// +/-2.048 V
    Two,
    /// +/-1.024 V
    Four,
    /// +/-0.512 V
    Eight,
    /// +/-0.256 V
    Sixteen,
}

impl Gain {
    pub fn full_scale_volts(self) -> f32 {
        match self {
            Gain::TwoThirds => 6.144,
            Gain::One => 4.096,
            Gain::Two => 2.048,
            Gain::Four => 1.024,
            Gain::Eight => 0.512,
            Gain::Sixteen => 0.256,
        }
    }

    fn pga_bits(self) -> u16 {
        let pga = match self {
            Gain::TwoThirds => 0b000,
            Gain::One => 0b001,
            Gain::Two => 0b010,
            Gain::Four => 0b011,
            Gain::Eight => 0b100,
            Gain::Sixteen => 0b101,
        };
        pga << 9
    }
}

/// Config register value that starts one single-ended conversion on `channel`.
pub fn config_word(channel: u8, gain: Gain, data_rate: u8) -> u16 {
    CONFIG_OS_SINGLE
        | CONFIG_MUX_SINGLE_ENDED
        | ((channel as u16 & 0x03) << 12)
        | gain.pga_bits()
        | CONFIG_MODE_SINGLE_SHOT
        | ((data_rate as u16 & 0x07) << 5)
        | CONFIG_COMP_DISABLE
}

pub fn to_voltage(raw: i16, gain: Gain) -> f32 {
    raw as f32 * gain.full_scale_volts() / 32767.0
}

#[cfg(feature = "rpi")]
pub struct AdcReader {
    i2c: I2c,
    gain: Gain,
    data_rate: u8,
}

#[cfg(feature = "rpi")]
impl AdcReader {
    pub fn new(settings: &AdcSettings) -> Result<Self> {
        let startup = |e: rppal::i2c::Error| DaqError::Startup {
            device: "ADS1115",
            reason: e.to_string(),
        };

        let mut i2c = I2c::with_bus(settings.i2c_bus).map_err(startup)?;
        i2c.set_slave_address(settings.address).map_err(startup)?;

        let mut reader = AdcReader {
            i2c,
            gain: settings.gain,
            data_rate: settings.data_rate,
        };
        reader.read_register(REG_CONFIG).map_err(|e| DaqError::Startup {
            device: "ADS1115",
            reason: e.to_string(),
        })?;

        // first conversion after power-up is thrown away
        reader.read_channel(0)?;

        info!(
            "ADS1115 ADC initialized on I2C bus {}, address {:#04x}",
            settings.i2c_bus, settings.address
        );
        Ok(reader)
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c.write(&[register, hi, lo])?;
        Ok(())
    }

    fn read_register(&mut self, register: u8) -> Result<u16> {
        let mut rx_buffer = [0u8; 2];
        self.i2c.write_read(&[register], &mut rx_buffer)?;
        Ok(u16::from_be_bytes(rx_buffer))
    }

    pub fn read_channel(&mut self, channel: u8) -> Result<i16> {
        if channel >= 4 {
            return Err(DaqError::Config(format!("ADC channel must be 0-3, got {channel}")));
        }

        self.write_register(REG_CONFIG, config_word(channel, self.gain, self.data_rate))?;
        for _ in 0..CONVERSION_POLLS {
            if self.read_register(REG_CONFIG)? & CONFIG_OS_SINGLE != 0 {
                return Ok(self.read_register(REG_CONVERSION)? as i16);
            }
        }
        Err(DaqError::ConversionTimeout(channel))
    }
}

#[cfg(feature = "rpi")]
impl AnalogInput for AdcReader {
    fn read_voltage(&mut self, channel: u8) -> Result<f32> {
        Ok(to_voltage(self.read_channel(channel)?, self.gain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_word_for_fast_single_shot() {
        // AIN0, +/-4.096 V, 860 SPS
        assert_eq!(config_word(0, Gain::One, 7), 0xC3E3);
        // AIN3, +/-6.144 V, 128 SPS
        assert_eq!(config_word(3, Gain::TwoThirds, 4), 0xF183);
    }

    #[test]
    fn full_scale_reading() {
        assert!((to_voltage(i16::MAX, Gain::One) - 4.096).abs() < 1e-6);
        assert!((to_voltage(-16384, Gain::Two) + 1.024).abs() < 1e-3);
        assert_eq!(to_voltage(0, Gain::Sixteen), 0.0);
    }

    #[test]
    #[ignore] // needs an ADS1115 on I2C bus 1
    #[cfg(feature = "rpi")]
    fn read_real_adc() {
        let mut adc = AdcReader::new(&AdcSettings::default()).unwrap();
        let volts = adc.read_voltage(0).unwrap();
        println!("AIN0: {volts:.4} V");
    }
}
