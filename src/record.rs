//! Wire encodings of one sample.
//!
//! Text records are `<timestamp>,<v1>,...,<vn>\n`. Binary records are a
//! little-endian `u32` timestamp followed by `n` little-endian `f32`s with no
//! framing, so a reader has to know `n` and stay aligned on record boundaries.

use std::fmt::Write as _;
use std::io::{self, Read, Write};

use crate::config::Encoding;
use crate::error::{DaqError, Result};

const TIMESTAMP_LEN: usize = 4;
const VALUE_LEN: usize = 4;
/// Longest text field accepted, enough for any `f32` at a sane precision.
const MAX_FIELD_LEN: usize = 64;

pub const BANNER: &str = "DAQ is ready.";

pub fn binary_len(channels: usize) -> usize {
    TIMESTAMP_LEN + VALUE_LEN * channels
}

fn max_line_len(channels: usize) -> usize {
    MAX_FIELD_LEN * (channels + 1)
}

/// Announces the sampler on the link. Binary streams carry nothing but records,
/// so the banner is only written in text mode.
pub fn write_banner<W: Write>(out: &mut W, encoding: Encoding) -> io::Result<()> {
    if encoding == Encoding::Text {
        out.write_all(format!("{BANNER}\n").as_bytes())?;
        out.flush()?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: u32,
    pub values: Vec<f32>,
}

impl Sample {
    pub fn new(timestamp: u32, values: Vec<f32>) -> Self {
        Sample { timestamp, values }
    }

    pub fn to_text(&self, precision: usize) -> String {
        let mut line = self.timestamp.to_string();
        for value in &self.values {
            let _ = write!(line, ",{:.*}", precision, value);
        }
        line.push('\n');
        line
    }

    pub fn to_binary(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(binary_len(self.values.len()));
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        for value in &self.values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn encode(&self, encoding: Encoding, precision: usize) -> Vec<u8> {
        match encoding {
            Encoding::Text => self.to_text(precision).into_bytes(),
            Encoding::Binary => self.to_binary(),
        }
    }

    /// Encodes the sample and hands it to `out` in a single write.
    pub fn write_to<W: Write>(&self, out: &mut W, encoding: Encoding, precision: usize) -> io::Result<()> {
        out.write_all(&self.encode(encoding, precision))?;
        out.flush()
    }

    pub fn from_binary(bytes: &[u8], channels: usize) -> Result<Self> {
        let expected = binary_len(channels);
        if bytes.len() != expected {
            return Err(DaqError::RecordLength { expected, actual: bytes.len() });
        }

        let (head, body) = bytes.split_at(TIMESTAMP_LEN);
        let timestamp = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);
        let values = body
            .chunks_exact(VALUE_LEN)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Sample { timestamp, values })
    }

    pub fn from_text(line: &str, channels: usize) -> Result<Self> {
        let malformed = |reason: String| DaqError::TextRecord {
            line: line.to_owned(),
            reason,
        };

        let mut fields = line.trim_end_matches(['\r', '\n']).split(',');
        let timestamp = fields
            .next()
            .unwrap_or_default()
            .trim()
            .parse::<u32>()
            .map_err(|e| malformed(format!("timestamp: {e}")))?;
        let values = fields
            .map(|f| f.trim().parse::<f32>().map_err(|e| malformed(format!("value {f:?}: {e}"))))
            .collect::<Result<Vec<f32>>>()?;

        if values.len() != channels {
            return Err(malformed(format!("{} values, expected {}", values.len(), channels)));
        }
        Ok(Sample { timestamp, values })
    }
}

/// Pulls consecutive records of a known layout off a byte stream.
pub struct RecordReader<R> {
    inner: R,
    encoding: Encoding,
    channels: usize,
    buffer: Vec<u8>,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R, encoding: Encoding, channels: usize) -> Self {
        RecordReader {
            inner,
            encoding,
            channels,
            buffer: Vec::with_capacity(binary_len(channels)),
        }
    }

    /// Next record, or `None` once the stream ends on a record boundary.
    pub fn next_record(&mut self) -> Result<Option<Sample>> {
        match self.encoding {
            Encoding::Binary => self.next_binary(),
            Encoding::Text => self.next_text(),
        }
    }

    fn next_binary(&mut self) -> Result<Option<Sample>> {
        self.buffer.resize(binary_len(self.channels), 0);
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.inner.read(&mut self.buffer[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(DaqError::RecordLength {
                        expected: self.buffer.len(),
                        actual: filled,
                    });
                }
                Ok(n) => filled += n,
                // a timeout inside a record must not cost alignment
                Err(e) if retryable(&e, filled > 0) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Sample::from_binary(&self.buffer, self.channels).map(Some)
    }

    fn next_text(&mut self) -> Result<Option<Sample>> {
        self.buffer.clear();
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) if self.buffer.is_empty() => return Ok(None),
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) if self.buffer.len() == max_line_len(self.channels) => {
                    let line = String::from_utf8_lossy(&self.buffer[..MAX_FIELD_LEN]);
                    return Err(DaqError::TextRecord {
                        line: format!("{line}..."),
                        reason: format!("no line end within {} bytes", self.buffer.len()),
                    });
                }
                Ok(_) => self.buffer.push(byte[0]),
                Err(e) if retryable(&e, !self.buffer.is_empty()) => {}
                Err(e) => return Err(e.into()),
            }
        }
        let line = String::from_utf8_lossy(&self.buffer);
        Sample::from_text(&line, self.channels).map(Some)
    }
}

fn retryable(e: &io::Error, mid_record: bool) -> bool {
    match e.kind() {
        io::ErrorKind::Interrupted => true,
        io::ErrorKind::TimedOut => mid_record,
        _ => false,
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn text_record_format() {
        let sample = Sample::new(1000, vec![1.23, 45.6]);
        assert_eq!(sample.to_text(2), "1000,1.23,45.60\n");
        assert_eq!(sample.to_text(0), "1000,1,46\n");
    }

    #[test]
    fn binary_record_layout() {
        let sample = Sample::new(0x0102_0304, vec![1.0, -2.5]);
        let bytes = sample.to_binary();
        assert_eq!(bytes.len(), 4 + 4 * 2);
        assert_eq!(&bytes[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[4..8], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[8..], &(-2.5f32).to_le_bytes());
    }

    #[test]
    fn binary_decode_is_bit_exact() {
        let odd = f32::from_bits(0x7fc0_1234);
        let sample = Sample::new(u32::MAX, vec![416.5, f32::MIN_POSITIVE, odd, -0.0]);
        let decoded = Sample::from_binary(&sample.to_binary(), 4).unwrap();

        assert_eq!(decoded.timestamp, u32::MAX);
        let bits: Vec<u32> = decoded.values.iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u32> = sample.values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn binary_decode_checks_length() {
        let err = Sample::from_binary(&[0u8; 7], 1).unwrap_err();
        assert!(matches!(err, DaqError::RecordLength { expected: 8, actual: 7 }));
    }

    #[test]
    fn reader_walks_a_binary_stream() {
        let mut stream = Vec::new();
        for t in [10u32, 20, 30] {
            stream.extend(Sample::new(t, vec![t as f32, 1.5]).to_binary());
        }

        let records: Vec<Sample> = RecordReader::new(Cursor::new(stream), Encoding::Binary, 2)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.iter().map(|s| s.timestamp).collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(records[2].values, vec![30.0, 1.5]);
    }

    #[test]
    fn reader_rejects_truncated_record() {
        let mut stream = Sample::new(10, vec![1.0]).to_binary();
        stream.extend_from_slice(&[1, 2, 3]);

        let mut reader = RecordReader::new(Cursor::new(stream), Encoding::Binary, 1);
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().is_err());
    }

    /// Hands out one byte per read and times out between bytes.
    struct SlowLink {
        bytes: Vec<u8>,
        pos: usize,
        stalled: bool,
    }

    impl Read for SlowLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.stalled = !self.stalled;
            if self.stalled {
                return Err(io::ErrorKind::TimedOut.into());
            }
            if self.pos == self.bytes.len() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn reader_keeps_alignment_across_timeouts() {
        let sample = Sample::new(42, vec![3.25]);
        let link = SlowLink { bytes: sample.to_binary(), pos: 0, stalled: false };
        let mut reader = RecordReader::new(link, Encoding::Binary, 1);

        // idle link surfaces the timeout, a started record does not
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, DaqError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut));
        assert_eq!(reader.next_record().unwrap(), Some(sample));
    }

    #[test]
    fn reader_walks_a_text_stream() {
        let stream = "10,1.00,2.00\r\n20,3.50,-4.25\n";
        let mut reader = RecordReader::new(Cursor::new(stream), Encoding::Text, 2);

        assert_eq!(reader.next_record().unwrap(), Some(Sample::new(10, vec![1.0, 2.0])));
        assert_eq!(reader.next_record().unwrap(), Some(Sample::new(20, vec![3.5, -4.25])));
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn reader_gives_up_on_endless_line() {
        // binary data read as text rarely contains a newline
        let stream = vec![0x41u8; 10_000];
        let mut reader = RecordReader::new(Cursor::new(stream), Encoding::Text, 2);

        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, DaqError::TextRecord { .. }));
        assert!(reader.buffer.len() <= max_line_len(2));
    }

    #[test]
    fn banner_only_in_text_mode() {
        let mut out = Vec::new();
        write_banner(&mut out, Encoding::Text).unwrap();
        assert_eq!(out, b"DAQ is ready.\n");

        let mut out = Vec::new();
        write_banner(&mut out, Encoding::Binary).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn text_parse_checks_field_count() {
        assert!(Sample::from_text("10,1.0", 2).is_err());
        assert!(Sample::from_text("DAQ is ready.", 1).is_err());
    }
}
