/// Error types for Linux operations.
#[derive(thiserror::Error, Debug)]
pub enum LinuxError {
    /// Corrupted struct.
    #[error("Corrupted struct: {0}")]
    CorruptedStruct(&'static str),

    /// A printk record header is inconsistent with the log buffer.
    #[error("Corrupted printk record at index {index:#x}")]
    CorruptedLogRecord {
        /// Byte index of the record in the log buffer.
        index: usize,
    },

    /// The kernel log buffer is larger than any kernel allows.
    #[error("Kernel log buffer length {len:#x} exceeds {max:#x}")]
    LogBufferTooLarge {
        /// The length read from the target.
        len: usize,

        /// The largest accepted length.
        max: usize,
    },

    /// A line of the syscall baseline could not be parsed.
    #[error("Invalid syscall baseline at line {line}: {message}")]
    InvalidBaseline {
        /// The 1-based line number.
        line: usize,

        /// The error description.
        message: String,
    },

    /// The requested syscall table entry width is not supported.
    #[error("Unsupported syscall table entry width {0}")]
    UnsupportedWidth(usize),
}

impl From<LinuxError> for kwalk_core::WalkError {
    fn from(value: LinuxError) -> Self {
        kwalk_core::WalkError::Os(value.into())
    }
}
