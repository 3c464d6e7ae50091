use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaqError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A device did not answer while the sampler was starting up.
    #[error("{device} did not respond during startup: {reason}")]
    Startup { device: &'static str, reason: String },

    #[error("ADC conversion on channel {0} did not complete")]
    ConversionTimeout(u8),

    #[error("thermocouple on chip select {chip_select} reports {fault}")]
    ThermocoupleFault {
        chip_select: u8,
        fault: crate::thermocouple::Fault,
    },

    #[error("no thermocouple opened on chip select {0}")]
    UnknownChipSelect(u8),

    #[cfg(feature = "rpi")]
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[cfg(feature = "rpi")]
    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[cfg(feature = "rpi")]
    #[error("UART error: {0}")]
    Uart(#[from] rppal::uart::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("binary record is {actual} bytes, layout expects {expected}")]
    RecordLength { expected: usize, actual: usize },

    #[error("malformed text record {line:?}: {reason}")]
    TextRecord { line: String, reason: String },
}

pub type Result<T> = std::result::Result<T, DaqError>;
