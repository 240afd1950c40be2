//! Kernel log (`dmesg`) extraction for the 3.5 to 5.9 `printk_log` format.

use std::fmt;

use kwalk_core::{MemoryPort, Va, WalkError};
use memchr::memchr;

use crate::{LinuxError, LinuxOs, offsets};

/// Size of `struct printk_log` without `CONFIG_PRINTK_CALLER`.
const RECORD_HEADER_SIZE: usize = 16;

/// Largest kernel log buffer, `1 << CONFIG_LOG_BUF_SHIFT` at its maximum.
pub const MAX_LOG_BUF_LEN: usize = 1 << 25;

/// A record of the kernel log ring buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Timestamp in nanoseconds since boot.
    pub timestamp_ns: u64,

    /// Syslog facility.
    pub facility: u8,

    /// Syslog level (0 to 7).
    pub level: u8,

    /// Internal record flags.
    pub flags: u8,

    /// Message text.
    pub text: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let seconds = self.timestamp_ns / 1_000_000_000;
        let micros = (self.timestamp_ns % 1_000_000_000) / 1_000;

        write!(f, "[{seconds:5}.{micros:06}] {}", self.text)
    }
}

/// Parses the records of a `printk_log` ring buffer.
///
/// Records are read from `first_idx` until `next_idx`. A record whose `len`
/// is zero marks the end of the buffer and the walk continues at index 0.
///
/// ```
/// # use kwalk_os_linux::parse_log_records;
/// let mut buffer = vec![0u8; 64];
/// buffer[0..8].copy_from_slice(&1_500_000_000u64.to_le_bytes());
/// buffer[8..10].copy_from_slice(&24u16.to_le_bytes()); // len
/// buffer[10..12].copy_from_slice(&5u16.to_le_bytes()); // text_len
/// buffer[15] = 6 << 5; // level
/// buffer[16..21].copy_from_slice(b"hello");
///
/// let records = parse_log_records(&buffer, 0, 24).unwrap();
/// assert_eq!(records[0].to_string(), "[    1.500000] hello");
/// ```
pub fn parse_log_records(
    buffer: &[u8],
    first_idx: usize,
    next_idx: usize,
) -> Result<Vec<LogRecord>, LinuxError> {
    let mut records = Vec::new();
    let mut index = first_idx;
    let mut wrapped = false;

    // Each record is at least a header long, which bounds the walk even if
    // the indices are garbage.
    let max_records = buffer.len() / RECORD_HEADER_SIZE + 1;

    while index != next_idx {
        if records.len() > max_records {
            return Err(LinuxError::CorruptedLogRecord { index });
        }

        let header = buffer
            .get(index..index + RECORD_HEADER_SIZE)
            .ok_or(LinuxError::CorruptedLogRecord { index })?;

        let len = u16::from_le_bytes([header[8], header[9]]) as usize;
        if len == 0 {
            if wrapped {
                return Err(LinuxError::CorruptedLogRecord { index });
            }

            tracing::trace!(index, "printk log wraps");
            wrapped = true;
            index = 0;
            continue;
        }

        let text_len = u16::from_le_bytes([header[10], header[11]]) as usize;
        if len < RECORD_HEADER_SIZE + text_len {
            return Err(LinuxError::CorruptedLogRecord { index });
        }

        let text = buffer
            .get(index + RECORD_HEADER_SIZE..index + RECORD_HEADER_SIZE + text_len)
            .ok_or(LinuxError::CorruptedLogRecord { index })?;

        records.push(LogRecord {
            timestamp_ns: u64::from_le_bytes([
                header[0], header[1], header[2], header[3], header[4], header[5], header[6],
                header[7],
            ]),
            facility: header[14],
            level: header[15] >> 5,
            flags: header[15] & 0x1f,
            text: String::from_utf8_lossy(text).into_owned(),
        });

        index += len;
    }

    Ok(records)
}

fn check_log_len(len: usize) -> Result<usize, LinuxError> {
    if len > MAX_LOG_BUF_LEN {
        return Err(LinuxError::LogBufferTooLarge {
            len,
            max: MAX_LOG_BUF_LEN,
        });
    }

    Ok(len)
}

impl LinuxOs {
    /// Returns the address of the kernel log buffer.
    pub fn log_buffer<Port>(&self, port: Port) -> Result<Va, WalkError>
    where
        Port: MemoryPort,
    {
        let log_buf = self.symbols.resolve(offsets::LOG_BUF)?;
        let buffer = port.read_va(log_buf)?;

        tracing::debug!(%log_buf, %buffer, "resolved log buffer");
        Ok(buffer)
    }

    /// Returns the size of the kernel log buffer.
    ///
    /// Fails with [`LinuxError::LogBufferTooLarge`] above
    /// [`MAX_LOG_BUF_LEN`].
    pub fn log_buffer_len<Port>(&self, port: Port) -> Result<usize, WalkError>
    where
        Port: MemoryPort,
    {
        let log_buf_len = self.symbols.resolve(offsets::LOG_BUF_LEN)?;
        let len = port.read_u32(log_buf_len)? as usize;
        Ok(check_log_len(len)?)
    }

    /// Reads the kernel log buffer as text, up to the first NUL byte or
    /// `limit` bytes.
    ///
    /// With no `limit`, the buffer size from `log_buf_len` is used. A full
    /// buffer has no terminator, so reaching the bound is not an error here.
    pub fn read_log_text<Port>(&self, port: Port, limit: Option<usize>) -> Result<String, WalkError>
    where
        Port: MemoryPort,
    {
        let buffer = self.log_buffer(&port)?;
        let limit = match limit {
            Some(limit) => check_log_len(limit)?,
            None => self.log_buffer_len(&port)?,
        };

        let mut bytes = vec![0u8; limit];
        port.read(buffer, &mut bytes)?;

        if let Some(position) = memchr(0, &bytes) {
            bytes.truncate(position);
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads and parses the `printk_log` records of the kernel log.
    pub fn read_log_records<Port>(&self, port: Port) -> Result<Vec<LogRecord>, WalkError>
    where
        Port: MemoryPort,
    {
        let buffer = self.log_buffer(&port)?;
        let len = self.log_buffer_len(&port)?;
        let first_idx = port.read_u32(self.symbols.resolve(offsets::LOG_FIRST_IDX)?)? as usize;
        let next_idx = port.read_u32(self.symbols.resolve(offsets::LOG_NEXT_IDX)?)? as usize;

        tracing::debug!(len, first_idx, next_idx, "reading printk records");

        let mut bytes = vec![0u8; len];
        port.read(buffer, &mut bytes)?;

        Ok(parse_log_records(&bytes, first_idx, next_idx)?)
    }
}
