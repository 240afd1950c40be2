use crate::{Gfn, Pa, Va, WalkCore, WalkDriver, WalkError};

/// Page geometry and address translation of a CPU architecture.
pub trait Architecture {
    /// Page size in bytes.
    const PAGE_SIZE: u64;

    /// `log2(PAGE_SIZE)`.
    const PAGE_SHIFT: u64;

    /// Clears the in-page offset bits of an address.
    const PAGE_MASK: u64;

    /// Frame holding `pa`.
    fn gfn_from_pa(pa: Pa) -> Gfn {
        Gfn(pa.0 >> Self::PAGE_SHIFT)
    }

    /// First byte of frame `gfn`.
    fn pa_from_gfn(gfn: Gfn) -> Pa {
        Pa(gfn.0 << Self::PAGE_SHIFT)
    }

    /// Offset of `pa` inside its frame.
    fn pa_offset(pa: Pa) -> u64 {
        pa.0 & !Self::PAGE_MASK
    }

    /// Translates `va` through the page tables rooted at `root`.
    ///
    /// Table entries are read through `core`, so translations share its page
    /// cache.
    fn translate_address<Driver>(core: &WalkCore<Driver>, va: Va, root: Pa) -> Result<Pa, WalkError>
    where
        Driver: WalkDriver<Architecture = Self>;
}
