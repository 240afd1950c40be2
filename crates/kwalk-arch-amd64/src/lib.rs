//! AMD64 architecture support.
//!
//! Implements 4-level paging translation for [`kwalk_core`] with 4 KiB,
//! 2 MiB and 1 GiB pages.

mod paging;

use kwalk_core::{Architecture, Pa, Va, WalkCore, WalkDriver, WalkError};
use zerocopy::FromBytes;

pub use self::paging::{PageTableEntry, PageTableLevel};

/// AMD64 architecture.
#[derive(Debug)]
pub struct Amd64;

impl Architecture for Amd64 {
    const PAGE_SIZE: u64 = 0x1000;
    const PAGE_SHIFT: u64 = 12;
    const PAGE_MASK: u64 = 0xFFFFFFFFFFFFF000;

    fn translate_address<Driver>(core: &WalkCore<Driver>, va: Va, root: Pa) -> Result<Pa, WalkError>
    where
        Driver: WalkDriver<Architecture = Self>,
    {
        let mut table = root;
        let mut level = PageTableLevel::Pml4;

        loop {
            let entry = Self::read_entry(core, table, level.index_of(va))?;

            if !entry.present() {
                tracing::trace!(%va, %root, ?level, "page not present");
                return Err(WalkError::page_fault(va, root));
            }

            let next = match level.next() {
                Some(next) if !(level.maps_large_pages() && entry.large()) => next,
                _ => return Ok(entry.frame(level) + level.page_offset(va)),
            };

            table = entry.address();
            level = next;
        }
    }
}

impl Amd64 {
    /// Reads the entry at `index` of the paging structure at `table`.
    pub fn read_entry<Driver>(
        core: &WalkCore<Driver>,
        table: Pa,
        index: usize,
    ) -> Result<PageTableEntry, WalkError>
    where
        Driver: WalkDriver<Architecture = Self>,
    {
        let page = core.read_page(Self::gfn_from_pa(table))?;
        let offset = index * size_of::<PageTableEntry>();

        page.get(offset..offset + size_of::<PageTableEntry>())
            .and_then(|bytes| PageTableEntry::read_from_bytes(bytes).ok())
            .ok_or(WalkError::OutOfBounds { address: table })
    }
}
