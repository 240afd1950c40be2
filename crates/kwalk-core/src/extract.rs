use crate::{MemoryPort, OffsetTable, Va, WalkError};

/// Width of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldWidth {
    /// 8 bits.
    U8,

    /// 16 bits.
    U16,

    /// 32 bits.
    U32,

    /// 64 bits.
    U64,
}

impl FieldWidth {
    /// Returns the width in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

/// Reads typed fields of records located by address, using offsets looked up
/// by name.
///
/// The extractor never pauses or resumes the target; it relies on the caller
/// to run inside a [`Traversal`].
///
/// [`Traversal`]: crate::Traversal
pub struct FieldExtractor<'a, Port>
where
    Port: MemoryPort,
{
    port: Port,
    offsets: &'a OffsetTable,
}

impl<'a, Port> FieldExtractor<'a, Port>
where
    Port: MemoryPort,
{
    /// Creates a new field extractor.
    pub fn new(port: Port, offsets: &'a OffsetTable) -> Self {
        Self { port, offsets }
    }

    /// Returns the memory port.
    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Returns the offset table.
    pub fn offsets(&self) -> &'a OffsetTable {
        self.offsets
    }

    /// Returns the address of `field` inside the record at `record`.
    pub fn field_address(&self, record: Va, field: &str) -> Result<Va, WalkError> {
        Ok(record + self.offsets.offset(field)?)
    }

    /// Reads an unsigned scalar field.
    pub fn read_scalar(&self, record: Va, field: &str, width: FieldWidth) -> Result<u64, WalkError> {
        let address = self.field_address(record, field)?;
        self.port.read_uint(address, width.size())
    }

    /// Reads a 32-bit field.
    pub fn read_u32(&self, record: Va, field: &str) -> Result<u32, WalkError> {
        let address = self.field_address(record, field)?;
        self.port.read_u32(address)
    }

    /// Reads a pointer field.
    pub fn read_pointer(&self, record: Va, field: &str) -> Result<Va, WalkError> {
        let address = self.field_address(record, field)?;
        self.port.read_va(address)
    }

    /// Reads a NUL-terminated string stored inline in the record.
    ///
    /// At most `max_len` bytes are scanned, terminator included.
    pub fn read_cstring(&self, record: Va, field: &str, max_len: usize) -> Result<String, WalkError> {
        let address = self.field_address(record, field)?;
        self.port.read_cstring(address, max_len)
    }
}
