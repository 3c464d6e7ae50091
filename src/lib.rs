//! Fixed-rate data acquisition for motor and flow test rigs.
//!
//! Current-loop transducers are read through an ADS1115, thermocouples through
//! MAX31855 converters, and each sample period one record goes out on the
//! serial link, as CSV text or as a packed little-endian binary record.

pub mod adc;
pub mod clock;
pub mod config;
pub mod convert;
pub mod error;
pub mod record;
pub mod sampler;
#[cfg(feature = "rpi")]
pub mod serial;
pub mod thermocouple;

pub use config::{ChannelConfig, ChannelSource, Conversion, DaqConfig, Encoding};
pub use error::{DaqError, Result};
pub use record::{RecordReader, Sample, write_banner};
pub use sampler::{AnalogInput, Sampler, ThermocoupleInput};
