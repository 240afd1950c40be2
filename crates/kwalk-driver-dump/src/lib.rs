//! kwalk driver for physical memory dumps.
//!
//! Supports flat raw images (`file offset == physical address`) and ELF
//! cores such as the ones written by QEMU `dump-guest-memory` or
//! `virsh dump --memory-only`, where `PT_LOAD` segments are placed by their
//! physical address.
//!
//! A dump is a permanently paused target: [`pause`] and [`resume`] only
//! count and log the calls.
//!
//! [`pause`]: WalkDriver::pause
//! [`resume`]: WalkDriver::resume

mod dump;
mod error;

use std::{cell::Cell, marker::PhantomData, path::Path};

use kwalk_core::{Architecture, DriverInfo, Gfn, MappedPage, WalkDriver, WalkError};

pub use self::{
    dump::{Dump, DumpFormat},
    error::Error,
};

/// A driver reading from a memory dump file.
pub struct DumpDriver<Arch>
where
    Arch: Architecture,
{
    dump: Dump,
    pauses: Cell<u64>,
    resumes: Cell<u64>,
    _marker: PhantomData<Arch>,
}

impl<Arch> DumpDriver<Arch>
where
    Arch: Architecture,
{
    /// Opens a memory dump.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, WalkError> {
        Ok(Self {
            dump: Dump::open(path)?,
            pauses: Cell::new(0),
            resumes: Cell::new(0),
            _marker: PhantomData,
        })
    }

    /// Returns the underlying dump.
    pub fn dump(&self) -> &Dump {
        &self.dump
    }

    /// Returns the number of pause and resume calls so far.
    pub fn pause_count(&self) -> (u64, u64) {
        (self.pauses.get(), self.resumes.get())
    }
}

impl<Arch> WalkDriver for DumpDriver<Arch>
where
    Arch: Architecture,
{
    type Architecture = Arch;

    fn info(&self) -> Result<DriverInfo, WalkError> {
        let end = self.dump.end();

        Ok(DriverInfo {
            page_size: Arch::PAGE_SIZE,
            page_shift: Arch::PAGE_SHIFT,
            max_gfn: Arch::gfn_from_pa(end.checked_sub(1).unwrap_or_default()),
        })
    }

    fn pause(&self) -> Result<(), WalkError> {
        self.pauses.set(self.pauses.get() + 1);
        tracing::debug!(count = self.pauses.get(), "pause (memory dump, no-op)");
        Ok(())
    }

    fn resume(&self) -> Result<(), WalkError> {
        self.resumes.set(self.resumes.get() + 1);
        tracing::debug!(count = self.resumes.get(), "resume (memory dump, no-op)");
        Ok(())
    }

    fn read_page(&self, gfn: Gfn) -> Result<MappedPage, WalkError> {
        Ok(self.dump.map(Arch::pa_from_gfn(gfn), Arch::PAGE_SIZE)?)
    }
}
