//! UART output link, 8N1 at the configured baud rate.

use std::io::{self, Write};
use std::path::Path;

use log::info;
use rppal::uart::{Parity, Uart};

use crate::error::Result;

pub const DEFAULT_PORT: &str = "/dev/serial0";

pub struct SerialLink {
    uart: Uart,
}

impl SerialLink {
    pub fn open(path: &Path, baud_rate: u32) -> Result<Self> {
        let mut uart = Uart::with_path(path, baud_rate, Parity::None, 8, 1)?;
        // a record must leave in one piece, never partially
        uart.set_write_mode(true)?;
        info!("UART opened on {} at {} baud, 8N1", path.display(), baud_rate);
        Ok(SerialLink { uart })
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.uart.write(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.uart.drain().map_err(io::Error::other)
    }
}
