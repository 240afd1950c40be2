//! Byte-level access to target memory.

use memchr::memchr;

use crate::{AccessContext, TranslationMechanism, Va, WalkCore, WalkDriver, WalkError};

/// Reads raw bytes from target memory.
///
/// Every structured read (scalars, pointers, strings) is built on top of
/// [`read`]. Implementations never cache across a pause/resume cycle.
///
/// [`read`]: Self::read
pub trait MemoryPort {
    /// Fills `buffer` with the bytes at `address`.
    fn read(&self, address: Va, buffer: &mut [u8]) -> Result<(), WalkError>;

    /// Returns the granularity at which string reads are chunked.
    fn page_size(&self) -> u64 {
        0x1000
    }

    /// Reads a single byte.
    fn read_u8(&self, address: Va) -> Result<u8, WalkError> {
        let mut buffer = [0u8; 1];
        self.read(address, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Reads a little-endian 16-bit value.
    fn read_u16(&self, address: Va) -> Result<u16, WalkError> {
        let mut buffer = [0u8; 2];
        self.read(address, &mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }

    /// Reads a little-endian 32-bit value.
    fn read_u32(&self, address: Va) -> Result<u32, WalkError> {
        let mut buffer = [0u8; 4];
        self.read(address, &mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    /// Reads a little-endian 64-bit value.
    fn read_u64(&self, address: Va) -> Result<u64, WalkError> {
        let mut buffer = [0u8; 8];
        self.read(address, &mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    /// Reads an unsigned integer of `size` bytes (1, 2, 4 or 8).
    fn read_uint(&self, address: Va, size: usize) -> Result<u64, WalkError> {
        match size {
            1 => self.read_u8(address).map(u64::from),
            2 => self.read_u16(address).map(u64::from),
            4 => self.read_u32(address).map(u64::from),
            8 => self.read_u64(address),
            _ => Err(WalkError::InvalidAddressWidth),
        }
    }

    /// Reads a 64-bit pointer.
    fn read_va(&self, address: Va) -> Result<Va, WalkError> {
        self.read_u64(address).map(Va)
    }

    /// Reads a NUL-terminated string of at most `max_len` bytes, terminator
    /// included.
    ///
    /// The string is read page by page and no byte past `address + max_len`
    /// is ever requested. Fails with [`WalkError::StringTooLong`] if no
    /// terminator is found within the bound. Invalid UTF-8 is replaced.
    fn read_cstring(&self, address: Va, max_len: usize) -> Result<String, WalkError> {
        let page_size = self.page_size().max(1);
        let mut bytes = Vec::new();

        while bytes.len() < max_len {
            let current = address + bytes.len() as u64;
            let to_page_end = (page_size - current.0 % page_size) as usize;
            let chunk_len = to_page_end.min(max_len - bytes.len());

            let start = bytes.len();
            bytes.resize(start + chunk_len, 0);
            self.read(current, &mut bytes[start..])?;

            if let Some(position) = memchr(0, &bytes[start..]) {
                bytes.truncate(start + position);
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
        }

        Err(WalkError::StringTooLong {
            address,
            limit: max_len,
        })
    }
}

impl<T> MemoryPort for &T
where
    T: MemoryPort + ?Sized,
{
    fn read(&self, address: Va, buffer: &mut [u8]) -> Result<(), WalkError> {
        (**self).read(address, buffer)
    }

    fn page_size(&self) -> u64 {
        (**self).page_size()
    }
}

/// A view of target memory through one translation mechanism.
///
/// With [`TranslationMechanism::Direct`] the addresses handed to the port are
/// physical; with [`TranslationMechanism::Paging`] they are translated by the
/// driver's architecture.
pub struct AddressSpace<'a, Driver>
where
    Driver: WalkDriver,
{
    core: &'a WalkCore<Driver>,
    mechanism: TranslationMechanism,
}

impl<'a, Driver> AddressSpace<'a, Driver>
where
    Driver: WalkDriver,
{
    /// Creates a new address space.
    pub fn new(core: &'a WalkCore<Driver>, mechanism: TranslationMechanism) -> Self {
        Self { core, mechanism }
    }

    /// Returns the underlying core.
    pub fn core(&self) -> &'a WalkCore<Driver> {
        self.core
    }

    /// Returns the translation mechanism.
    pub fn mechanism(&self) -> TranslationMechanism {
        self.mechanism
    }

    /// Builds the access context for `address`.
    pub fn access(&self, address: Va) -> AccessContext {
        AccessContext::with_mechanism(address.0, self.mechanism)
    }
}

impl<Driver> Clone for AddressSpace<'_, Driver>
where
    Driver: WalkDriver,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<Driver> Copy for AddressSpace<'_, Driver> where Driver: WalkDriver {}

impl<Driver> MemoryPort for AddressSpace<'_, Driver>
where
    Driver: WalkDriver,
{
    fn read(&self, address: Va, buffer: &mut [u8]) -> Result<(), WalkError> {
        self.core.read(self.access(address), buffer)
    }

    fn page_size(&self) -> u64 {
        <Driver::Architecture as crate::Architecture>::PAGE_SIZE
    }
}
