//! MAX31855 cold-junction compensated thermocouple converters, one per SPI chip select.

use std::fmt;

use crate::error::{DaqError, Result};
#[cfg(feature = "rpi")]
use crate::sampler::ThermocoupleInput;
#[cfg(feature = "rpi")]
use log::info;
#[cfg(feature = "rpi")]
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
#[cfg(feature = "rpi")]
use std::collections::BTreeMap;

#[cfg(feature = "rpi")]
const SPI_CLOCK_HZ: u32 = 4_000_000;

const FAULT_FLAG: u32 = 1 << 16;
const FAULT_OPEN_CIRCUIT: u32 = 1 << 0;
const FAULT_SHORT_TO_GND: u32 = 1 << 1;
const FAULT_SHORT_TO_VCC: u32 = 1 << 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    OpenCircuit,
    ShortToGround,
    ShortToVcc,
    /// Fault flag set without a cause bit, or a bus stuck high. An all-zero
    /// frame is a valid 0 °C reading and cannot be told apart from a bus stuck
    /// low, so it is not reported.
    Unknown,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Fault::OpenCircuit => "open circuit",
            Fault::ShortToGround => "short to GND",
            Fault::ShortToVcc => "short to VCC",
            Fault::Unknown => "unknown fault",
        };
        f.write_str(text)
    }
}

/// Thermocouple temperature from a raw 32-bit frame.
///
/// Bits 31..18 hold a signed 14-bit value in quarter degrees; bit 16 flags a
/// fault whose cause sits in bits 2..0.
pub fn decode_frame(frame: u32, chip_select: u8) -> Result<f32> {
    if frame == u32::MAX {
        return Err(DaqError::ThermocoupleFault { chip_select, fault: Fault::Unknown });
    }
    if frame & FAULT_FLAG != 0 {
        let fault = if frame & FAULT_OPEN_CIRCUIT != 0 {
            Fault::OpenCircuit
        } else if frame & FAULT_SHORT_TO_GND != 0 {
            Fault::ShortToGround
        } else if frame & FAULT_SHORT_TO_VCC != 0 {
            Fault::ShortToVcc
        } else {
            Fault::Unknown
        };
        return Err(DaqError::ThermocoupleFault { chip_select, fault });
    }

    // arithmetic shift keeps the sign of the 14-bit field
    let quarter_degrees = (frame as i32) >> 18;
    Ok(quarter_degrees as f32 * 0.25)
}

#[cfg(feature = "rpi")]
fn slave_select(chip_select: u8) -> Option<SlaveSelect> {
    match chip_select {
        0 => Some(SlaveSelect::Ss0),
        1 => Some(SlaveSelect::Ss1),
        2 => Some(SlaveSelect::Ss2),
        _ => None,
    }
}

#[cfg(feature = "rpi")]
fn spi_bus(bus: u8) -> Option<Bus> {
    match bus {
        0 => Some(Bus::Spi0),
        1 => Some(Bus::Spi1),
        _ => None,
    }
}

#[cfg(feature = "rpi")]
pub struct ThermocoupleBank {
    devices: BTreeMap<u8, Spi>,
}

#[cfg(feature = "rpi")]
impl ThermocoupleBank {
    /// Opens one SPI device per chip select and checks each converter answers.
    pub fn new(bus: u8, chip_selects: &[u8]) -> Result<Self> {
        let startup = |reason: String| DaqError::Startup { device: "MAX31855", reason };

        let spi_bus = spi_bus(bus).ok_or_else(|| startup(format!("no SPI bus {bus}")))?;
        let mut bank = ThermocoupleBank { devices: BTreeMap::new() };

        for &chip_select in chip_selects {
            let ss = slave_select(chip_select)
                .ok_or_else(|| startup(format!("no chip select {chip_select} on SPI{bus}")))?;
            let spi = Spi::new(spi_bus, ss, SPI_CLOCK_HZ, Mode::Mode0).map_err(|e| startup(e.to_string()))?;
            bank.devices.insert(chip_select, spi);

            // a converter that is not there leaves MISO pulled high
            let frame = bank.read_frame(chip_select).map_err(|e| startup(e.to_string()))?;
            if frame == u32::MAX {
                return Err(startup(format!("chip select {chip_select} returned {frame:#010x}")));
            }
            info!("MAX31855 initialized on SPI{}.{}", bus, chip_select);
        }

        Ok(bank)
    }

    fn read_frame(&mut self, chip_select: u8) -> Result<u32> {
        let spi = self
            .devices
            .get_mut(&chip_select)
            .ok_or(DaqError::UnknownChipSelect(chip_select))?;
        let mut rx_buffer = [0u8; 4];
        spi.read(&mut rx_buffer)?;
        Ok(u32::from_be_bytes(rx_buffer))
    }
}

#[cfg(feature = "rpi")]
impl ThermocoupleInput for ThermocoupleBank {
    fn read_celsius(&mut self, chip_select: u8) -> Result<f32> {
        let frame = self.read_frame(chip_select)?;
        decode_frame(frame, chip_select)
    }
}
