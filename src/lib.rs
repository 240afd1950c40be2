//! Offset-based kernel structure walking over paused virtual machine memory.
//!
//! This crate re-exports the workspace crates behind cargo features:
//!
//! - the crate root: addresses, errors, the driver contract, the list
//!   walker, the field extractor and the traversal driver.
//! - [`arch`]: architecture-specific address translation.
//! - [`driver`]: memory backends.
//! - [`os`]: operating-system specific walks.

pub use kwalk_core::*;

/// Architecture-specific code.
pub mod arch {
    /// AMD64 architecture.
    #[cfg(feature = "arch-amd64")]
    pub mod amd64 {
        pub use kwalk_arch_amd64::*;
    }
}

/// Memory backends.
pub mod driver {
    /// Physical memory dump backend.
    #[cfg(feature = "driver-dump")]
    pub mod dump {
        pub use kwalk_driver_dump::*;
    }
}

/// Operating-system specific walks.
pub mod os {
    /// Linux.
    #[cfg(feature = "os-linux")]
    pub mod linux {
        pub use kwalk_os_linux::*;
    }

    /// Windows.
    #[cfg(feature = "os-windows")]
    pub mod windows {
        pub use kwalk_os_windows::*;
    }
}
