use crate::Gfn;

/// Geometry of the target's physical memory, as reported by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverInfo {
    /// Page size in bytes.
    pub page_size: u64,

    /// `log2(page_size)`.
    pub page_shift: u64,

    /// Highest frame backed by the target.
    pub max_gfn: Gfn,
}
