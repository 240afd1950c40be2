use kwalk_core::{Pa, WalkError};

/// Error type for the dump driver.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error occurred while parsing an ELF file.
    #[error(transparent)]
    Elf(#[from] elf::ParseError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The ELF core has no loadable segments.
    #[error("ELF core has no PT_LOAD segments")]
    NoLoadSegments,

    /// A segment points outside the file.
    #[error("PT_LOAD segment at {paddr} exceeds the file")]
    TruncatedSegment {
        /// Physical address of the segment.
        paddr: Pa,
    },

    /// A segment extends past the end of the physical address space.
    #[error("PT_LOAD segment at {paddr} wraps the physical address space")]
    SegmentOverflow {
        /// Physical address of the segment.
        paddr: Pa,
    },

    /// The physical address is not backed by the dump.
    #[error("Physical address {0} is not in the dump")]
    OutOfBounds(Pa),
}

impl From<Error> for WalkError {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(value) => Self::Io(value),
            Error::OutOfBounds(address) => Self::OutOfBounds { address },
            value => Self::Driver(Box::new(value)),
        }
    }
}
