use crate::{OsFamily, Pa, Va};

/// An error that can occur while walking target memory.
#[derive(thiserror::Error, Debug)]
pub enum WalkError {
    /// An error occurred in the memory backend.
    #[error(transparent)]
    Driver(Box<dyn std::error::Error>),

    /// An OS-specific error occurred.
    #[error(transparent)]
    Os(Box<dyn std::error::Error>),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The target could not be paused.
    #[error("Failed to pause the target")]
    Pause(#[source] Box<WalkError>),

    /// The target could not be resumed.
    #[error("Failed to resume the target")]
    Resume(#[source] Box<WalkError>),

    /// A kernel symbol could not be resolved.
    #[error("Symbol `{0}` not found")]
    UnknownSymbol(String),

    /// A field offset is not present in the offset table.
    #[error("Offset `{field}` not found for {os}")]
    UnknownField {
        /// The OS family of the offset table.
        os: OsFamily,

        /// The requested field name.
        field: String,
    },

    /// The operation is not available for this OS family.
    #[error("Unsupported OS: {0}")]
    UnsupportedOs(String),

    /// A page fault occurred during address translation.
    #[error("Page not present ({address}, root: {root})")]
    PageFault {
        /// The virtual address that caused the page fault.
        address: Va,

        /// The root of the page table hierarchy.
        root: Pa,
    },

    /// The physical address is not backed by the target.
    #[error("Physical address {address} out of bounds")]
    OutOfBounds {
        /// The physical address that could not be read.
        address: Pa,
    },

    /// The given address has invalid width.
    #[error("Invalid address width")]
    InvalidAddressWidth,

    /// No terminator was found within the string length limit.
    #[error("String at {address} exceeds {limit} bytes")]
    StringTooLong {
        /// The address of the string.
        address: Va,

        /// The maximum number of bytes scanned.
        limit: usize,
    },

    /// A list walk did not return to its head within the iteration limit.
    #[error("Walk from {head} exceeded {limit} nodes")]
    WalkOverrun {
        /// The list head the walk started from.
        head: Va,

        /// The iteration limit.
        limit: usize,
    },

    /// A list node holds a NULL link.
    #[error("Corrupted list: NULL link in node {node}")]
    CorruptedList {
        /// The node holding the NULL link.
        node: Va,
    },

    /// The profile configuration could not be parsed.
    #[error("Config error at line {line}: {message}")]
    Config {
        /// The 1-based line number.
        line: usize,

        /// The error description.
        message: String,
    },

    /// The requested profile is not present in the configuration.
    #[error("Profile `{0}` not found")]
    UnknownProfile(String),

    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}

impl WalkError {
    /// Creates a new page fault error.
    pub fn page_fault(address: Va, root: Pa) -> Self {
        Self::PageFault { address, root }
    }

    /// Returns `true` if the error is a failed memory access.
    pub fn is_read_error(&self) -> bool {
        matches!(
            self,
            Self::Driver(_)
                | Self::Io(_)
                | Self::PageFault { .. }
                | Self::OutOfBounds { .. }
                | Self::InvalidAddressWidth
        )
    }

    /// Returns `true` if the error is a failed symbol or offset lookup.
    pub fn is_resolve_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSymbol(_) | Self::UnknownField { .. } | Self::UnsupportedOs(_)
        )
    }
}
