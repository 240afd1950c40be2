#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use kwalk_core::{
    Architecture, DriverInfo, Gfn, MappedPage, Pa, Va, WalkCore, WalkDriver, WalkError,
};

pub const PAGE_SIZE: u64 = 0x1000;

/// An architecture with 4 KiB pages where every virtual address maps to the
/// physical address of the same value.
pub struct IdentityArch;

impl Architecture for IdentityArch {
    const PAGE_SIZE: u64 = PAGE_SIZE;
    const PAGE_SHIFT: u64 = 12;
    const PAGE_MASK: u64 = !(PAGE_SIZE - 1);

    fn translate_address<Driver>(
        _core: &WalkCore<Driver>,
        va: Va,
        _root: Pa,
    ) -> Result<Pa, WalkError>
    where
        Driver: WalkDriver<Architecture = Self>,
    {
        Ok(Pa(va.0))
    }
}

/// Sparse in-memory target that counts pause and resume calls.
#[derive(Default)]
pub struct MockDriver {
    pages: RefCell<HashMap<Gfn, Vec<u8>>>,
    pub pauses: Cell<usize>,
    pub resumes: Cell<usize>,
    pub page_reads: Cell<usize>,
    pub fail_pause: Cell<bool>,
    pub fail_resume: Cell<bool>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `bytes` at physical address `pa`, allocating pages as needed.
    pub fn write(&self, pa: u64, bytes: &[u8]) {
        let mut pages = self.pages.borrow_mut();

        for (index, byte) in bytes.iter().enumerate() {
            let address = pa + index as u64;
            let page = pages
                .entry(Gfn(address / PAGE_SIZE))
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize]);
            page[(address % PAGE_SIZE) as usize] = *byte;
        }
    }

    pub fn write_u32(&self, pa: u64, value: u32) {
        self.write(pa, &value.to_le_bytes());
    }

    pub fn write_u64(&self, pa: u64, value: u64) {
        self.write(pa, &value.to_le_bytes());
    }

    pub fn write_cstring(&self, pa: u64, value: &str) {
        self.write(pa, value.as_bytes());
        self.write(pa + value.len() as u64, &[0]);
    }

    pub fn balanced(&self) -> bool {
        self.pauses.get() == self.resumes.get()
    }
}

impl WalkDriver for MockDriver {
    type Architecture = IdentityArch;

    fn info(&self) -> Result<DriverInfo, WalkError> {
        Ok(DriverInfo {
            page_size: PAGE_SIZE,
            page_shift: 12,
            max_gfn: Gfn(0xfffff),
        })
    }

    fn pause(&self) -> Result<(), WalkError> {
        self.pauses.set(self.pauses.get() + 1);

        match self.fail_pause.get() {
            true => Err(WalkError::Other("pause refused")),
            false => Ok(()),
        }
    }

    fn resume(&self) -> Result<(), WalkError> {
        self.resumes.set(self.resumes.get() + 1);

        match self.fail_resume.get() {
            true => Err(WalkError::Other("resume refused")),
            false => Ok(()),
        }
    }

    fn read_page(&self, gfn: Gfn) -> Result<MappedPage, WalkError> {
        self.page_reads.set(self.page_reads.get() + 1);

        let pages = self.pages.borrow();
        let page = pages.get(&gfn).ok_or(WalkError::OutOfBounds {
            address: IdentityArch::pa_from_gfn(gfn),
        })?;

        Ok(MappedPage::new(page.clone()))
    }
}

/// Links `nodes` into a circular list through `head`, with the next pointer
/// stored at `next_offset` inside each node.
pub fn link_list(driver: &MockDriver, head: u64, nodes: &[u64], next_offset: u64) {
    let mut previous = head;

    for &node in nodes {
        driver.write_u64(previous + next_offset, node);
        previous = node;
    }

    driver.write_u64(previous + next_offset, head);
}
