//! Core primitives for walking kernel structures in paused target memory.
//!
//! The crate is organised around a handful of pieces:
//!
//! - [`WalkDriver`] gives page-granular access to the physical memory of a
//!   target and can pause and resume it.
//! - [`WalkCore`] turns page reads into byte, scalar and pointer reads by
//!   virtual or physical address, with page and translation caches that
//!   never survive a pause/resume cycle. Bounded string reads live on
//!   [`MemoryPort`], which [`WalkCore::space`] provides.
//! - [`OffsetTable`] and [`SymbolTable`] resolve field names and kernel
//!   symbols; [`ProfileConfig`] loads both from disk.
//! - [`ListWalker`], [`FieldExtractor`] and [`Traversal`] walk circular
//!   intrusive lists and pull typed fields out of each record.

mod arch;
mod config;
mod core;
mod driver;
mod error;
mod extract;
mod offsets;
mod page;
mod port;
mod symbols;
mod traversal;
mod walker;

use std::{cell::RefCell, num::NonZeroUsize};

use lru::LruCache;

pub use self::{
    arch::Architecture,
    config::{Profile, ProfileConfig},
    core::{AccessContext, DriverInfo, Gfn, Hex, Pa, TranslationMechanism, Va},
    driver::WalkDriver,
    error::WalkError,
    extract::{FieldExtractor, FieldWidth},
    offsets::{OffsetTable, OsFamily},
    page::MappedPage,
    port::{AddressSpace, MemoryPort},
    symbols::SymbolTable,
    traversal::{Traversal, TraversalState},
    walker::{DEFAULT_WALK_LIMIT, ListWalker},
};

struct Cache {
    gfn: RefCell<LruCache<Gfn, MappedPage>>,
    v2p: RefCell<LruCache<(Va, Pa), Pa>>,
}

impl Cache {
    const DEFAULT_SIZE: NonZeroUsize = NonZeroUsize::new(8192).unwrap();

    fn new(size: NonZeroUsize) -> Self {
        Self {
            gfn: RefCell::new(LruCache::new(size)),
            v2p: RefCell::new(LruCache::new(size)),
        }
    }

    fn clear(&self) {
        self.gfn.borrow_mut().clear();
        self.v2p.borrow_mut().clear();
    }
}

/// Reads target memory through a [`WalkDriver`].
///
/// Pages and virtual-to-physical translations are cached. Both caches are
/// flushed on every pause and every resume, so data read during one pause
/// window is never served in the next.
pub struct WalkCore<Driver>
where
    Driver: WalkDriver,
{
    driver: Driver,
    cache: Cache,
}

impl<Driver> WalkCore<Driver>
where
    Driver: WalkDriver,
{
    /// Creates a new `WalkCore` with the given driver.
    ///
    /// Both caches hold up to 8192 entries.
    pub fn new(driver: Driver) -> Self {
        Self::with_cache_size(driver, Cache::DEFAULT_SIZE)
    }

    /// Creates a new `WalkCore` with caches of `size` entries each.
    pub fn with_cache_size(driver: Driver, size: NonZeroUsize) -> Self {
        Self {
            driver,
            cache: Cache::new(size),
        }
    }

    /// Returns the driver.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Retrieves information about the target memory.
    pub fn info(&self) -> Result<DriverInfo, WalkError> {
        self.driver.info()
    }

    /// Pauses the target and flushes the caches.
    pub fn pause(&self) -> Result<(), WalkError> {
        self.cache.clear();
        self.driver
            .pause()
            .map_err(|err| WalkError::Pause(Box::new(err)))
    }

    /// Resumes the target and flushes the caches.
    pub fn resume(&self) -> Result<(), WalkError> {
        self.cache.clear();
        self.driver
            .resume()
            .map_err(|err| WalkError::Resume(Box::new(err)))
    }

    /// Pauses the target and returns a guard that resumes it when dropped.
    pub fn pause_guard(&self) -> Result<PauseGuard<'_, Driver>, WalkError> {
        PauseGuard::new(self)
    }

    /// Returns an address space reading through `mechanism`.
    pub fn space(&self, mechanism: TranslationMechanism) -> AddressSpace<'_, Driver> {
        AddressSpace::new(self, mechanism)
    }

    /// Reads memory into `buffer`, crossing page boundaries as needed.
    pub fn read(&self, ctx: impl Into<AccessContext>, buffer: &mut [u8]) -> Result<(), WalkError> {
        let ctx = ctx.into();
        let mut position = 0usize;

        while position < buffer.len() {
            let address = self.translate_access_context(ctx + position as u64)?;
            let gfn = Driver::Architecture::gfn_from_pa(address);
            let offset = Driver::Architecture::pa_offset(address) as usize;

            let page = self.read_page(gfn)?;
            let page = page.get(offset..).ok_or(WalkError::OutOfBounds { address })?;
            if page.is_empty() {
                return Err(WalkError::OutOfBounds { address });
            }

            let size = std::cmp::min(buffer.len() - position, page.len());
            buffer[position..position + size].copy_from_slice(&page[..size]);
            position += size;
        }

        Ok(())
    }

    /// Reads a single byte.
    pub fn read_u8(&self, ctx: impl Into<AccessContext>) -> Result<u8, WalkError> {
        let mut buffer = [0u8; 1];
        self.read(ctx, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Reads a little-endian 16-bit value.
    pub fn read_u16(&self, ctx: impl Into<AccessContext>) -> Result<u16, WalkError> {
        let mut buffer = [0u8; 2];
        self.read(ctx, &mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }

    /// Reads a little-endian 32-bit value.
    pub fn read_u32(&self, ctx: impl Into<AccessContext>) -> Result<u32, WalkError> {
        let mut buffer = [0u8; 4];
        self.read(ctx, &mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    /// Reads a little-endian 64-bit value.
    pub fn read_u64(&self, ctx: impl Into<AccessContext>) -> Result<u64, WalkError> {
        let mut buffer = [0u8; 8];
        self.read(ctx, &mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    /// Reads a 64-bit pointer.
    pub fn read_va(&self, ctx: impl Into<AccessContext>) -> Result<Va, WalkError> {
        self.read_u64(ctx).map(Va)
    }

    /// Translates an access context to a physical address.
    pub fn translate_access_context(&self, ctx: AccessContext) -> Result<Pa, WalkError> {
        match ctx.mechanism {
            TranslationMechanism::Direct => Ok(Pa(ctx.address)),
            TranslationMechanism::Paging { root } => {
                let va = Va(ctx.address);
                let page = va & Driver::Architecture::PAGE_MASK;
                let offset = va - page;

                Ok(self.translate_page(page, root)? + offset)
            }
        }
    }

    /// Reads a page of physical memory, using the page cache.
    pub fn read_page(&self, gfn: Gfn) -> Result<MappedPage, WalkError> {
        let mut cache = self.cache.gfn.borrow_mut();
        if let Some(page) = cache.get(&gfn) {
            return Ok(page.clone());
        }

        let page = self.driver.read_page(gfn)?;
        cache.put(gfn, page.clone());
        Ok(page)
    }

    fn translate_page(&self, page: Va, root: Pa) -> Result<Pa, WalkError> {
        if let Some(pa) = self.cache.v2p.borrow_mut().get(&(page, root)) {
            return Ok(*pa);
        }

        let pa = Driver::Architecture::translate_address(self, page, root)?;
        self.cache.v2p.borrow_mut().put((page, root), pa);
        Ok(pa)
    }
}

/// A guard that pauses the target on creation and resumes it on drop.
///
/// Resume failures on drop are logged, not propagated. Use [`resume`] to
/// observe them.
///
/// [`resume`]: Self::resume
pub struct PauseGuard<'a, Driver>
where
    Driver: WalkDriver,
{
    core: &'a WalkCore<Driver>,
    active: bool,
}

impl<'a, Driver> PauseGuard<'a, Driver>
where
    Driver: WalkDriver,
{
    /// Pauses the target.
    pub fn new(core: &'a WalkCore<Driver>) -> Result<Self, WalkError> {
        core.pause()?;
        tracing::trace!("target paused");

        Ok(Self { core, active: true })
    }

    /// Resumes the target now, returning the resume error if any.
    pub fn resume(mut self) -> Result<(), WalkError> {
        self.active = false;
        self.core.resume()
    }
}

impl<Driver> Drop for PauseGuard<'_, Driver>
where
    Driver: WalkDriver,
{
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        match self.core.resume() {
            Ok(()) => tracing::trace!("target resumed"),
            Err(err) => tracing::error!(?err, "failed to resume the target"),
        }
    }
}
