use crate::{Architecture, DriverInfo, Gfn, MappedPage, WalkError};

/// A backend giving access to the memory of a target.
///
/// Live targets pause and resume the guest; memory dumps are permanently
/// paused and implement both as no-ops.
pub trait WalkDriver {
    /// The architecture of the target.
    type Architecture: Architecture + ?Sized;

    /// Retrieves information about the target memory.
    fn info(&self) -> Result<DriverInfo, WalkError>;

    /// Pauses the target.
    fn pause(&self) -> Result<(), WalkError>;

    /// Resumes the target.
    fn resume(&self) -> Result<(), WalkError>;

    /// Reads a page of physical memory.
    fn read_page(&self, gfn: Gfn) -> Result<MappedPage, WalkError>;
}
