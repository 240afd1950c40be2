use kwalk_core::{Pa, Va};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Bits 12..51 of an entry hold the physical frame address.
const ADDRESS_MASK: u64 = 0x000f_ffff_ffff_f000;

/// The levels of the 4-level page table hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageTableLevel {
    /// Page Table; maps 4 KiB pages.
    Pt,

    /// Page Directory; maps page tables or 2 MiB pages.
    Pd,

    /// Page Directory Pointer Table; maps page directories or 1 GiB pages.
    Pdpt,

    /// Page Map Level 4; the root of the hierarchy.
    Pml4,
}

impl PageTableLevel {
    /// Returns the next lower level, or `None` for [`Pt`].
    ///
    /// [`Pt`]: Self::Pt
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pml4 => Some(Self::Pdpt),
            Self::Pdpt => Some(Self::Pd),
            Self::Pd => Some(Self::Pt),
            Self::Pt => None,
        }
    }

    /// Returns the number of virtual address bits translated below this
    /// level.
    pub fn shift(self) -> u64 {
        match self {
            Self::Pt => 12,
            Self::Pd => 21,
            Self::Pdpt => 30,
            Self::Pml4 => 39,
        }
    }

    /// Returns the index of `va` in a table of this level.
    pub fn index_of(self, va: Va) -> usize {
        ((va.0 >> self.shift()) & 0x1ff) as usize
    }

    /// Returns the offset of `va` inside a page mapped at this level.
    pub fn page_offset(self, va: Va) -> u64 {
        va.0 & ((1 << self.shift()) - 1)
    }

    /// Checks whether an entry at this level may map a page directly.
    pub fn maps_large_pages(self) -> bool {
        matches!(self, Self::Pd | Self::Pdpt)
    }
}

/// An entry in one of the paging structures.
#[repr(transparent)]
#[derive(Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PageTableEntry(pub u64);

impl PageTableEntry {
    /// Checks if the entry is present.
    pub fn present(self) -> bool {
        self.0 & 1 != 0
    }

    /// Checks if the entry maps a large page (the PS bit).
    pub fn large(self) -> bool {
        (self.0 >> 7) & 1 != 0
    }

    /// Returns the physical address of the next table or of the 4 KiB page.
    pub fn address(self) -> Pa {
        Pa(self.0 & ADDRESS_MASK)
    }

    /// Returns the base address of a page mapped at `level`.
    ///
    /// For large pages the low address bits hold the PAT bit and are
    /// masked off.
    pub fn frame(self, level: PageTableLevel) -> Pa {
        Pa(self.0 & ADDRESS_MASK & !((1 << level.shift()) - 1))
    }
}

impl std::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PageTableEntry")
            .field("present", &self.present())
            .field("large", &self.large())
            .field("address", &self.address())
            .finish()
    }
}
