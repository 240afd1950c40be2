//! Windows kernel structure walks.
//!
//! [`WindowsOs`] walks the `_EPROCESS` list of a paused Windows target using
//! the `win_tasks`, `win_pname` and `win_pid` offsets of a profile.

mod error;
pub mod offsets;

use kwalk_core::{
    FieldExtractor, ListWalker, MemoryPort, OffsetTable, OsFamily, SymbolTable, Va, WalkError,
};
use memchr::memchr;

pub use self::error::WindowsError;

/// A Windows process as seen in its `_EPROCESS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsProcess {
    /// Address of the `_EPROCESS`.
    pub eprocess: Va,

    /// Process ID (low 32 bits of `UniqueProcessId`).
    pub pid: u32,

    /// Image file name, at most 15 characters.
    pub name: String,
}

/// Where a process list walk starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessListHead {
    /// The `PsActiveProcessHead` sentinel; never yielded.
    Sentinel(Va),

    /// The `System` process found through `PsInitialSystemProcess`; yielded
    /// first.
    ///
    /// Without the sentinel symbol the walk cannot tell the sentinel apart
    /// from a real `_EPROCESS`, so one extra record (the sentinel's
    /// container) appears in the results.
    System(Va),
}

/// Windows walks over a fixed offset and symbol profile.
#[derive(Debug)]
pub struct WindowsOs {
    offsets: OffsetTable,
    symbols: SymbolTable,
}

impl WindowsOs {
    /// Creates a new `WindowsOs`.
    ///
    /// Fails with [`WalkError::UnsupportedOs`] if `offsets` is not a Windows
    /// table.
    pub fn new(offsets: OffsetTable, symbols: SymbolTable) -> Result<Self, WalkError> {
        offsets.expect_os(OsFamily::Windows)?;
        Ok(Self { offsets, symbols })
    }

    /// Returns the offset table.
    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Returns the symbol table.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Locates the head of the process list.
    ///
    /// Prefers `PsActiveProcessHead`; falls back to the process that
    /// `PsInitialSystemProcess` points to.
    pub fn process_list_head<Port>(&self, port: Port) -> Result<ProcessListHead, WalkError>
    where
        Port: MemoryPort,
    {
        if let Some(head) = self.symbols.get(offsets::PS_ACTIVE_PROCESS_HEAD) {
            return Ok(ProcessListHead::Sentinel(head));
        }

        let pointer = self.symbols.resolve(offsets::PS_INITIAL_SYSTEM_PROCESS)?;
        let system = port.read_va(pointer)?;
        if system.is_null() {
            return Err(WindowsError::CorruptedStruct("PsInitialSystemProcess is NULL").into());
        }

        tracing::debug!(%system, "walking from the system process");
        Ok(ProcessListHead::System(system))
    }

    /// Iterates over all `_EPROCESS` addresses.
    pub fn eprocesses<Port>(
        &self,
        port: Port,
        limit: usize,
    ) -> Result<impl Iterator<Item = Result<Va, WalkError>> + use<Port>, WalkError>
    where
        Port: MemoryPort,
    {
        let tasks = self.offsets.offset(offsets::TASKS)?;

        let (first, head) = match self.process_list_head(&port)? {
            ProcessListHead::Sentinel(head) => (None, head),
            ProcessListHead::System(system) => (Some(Ok(system)), system + tasks),
        };

        let walker = ListWalker::begin(port, head, 0)?
            .containing(tasks)
            .with_limit(limit);

        Ok(first.into_iter().chain(walker))
    }

    /// Reads the identifying fields of an `_EPROCESS`.
    pub fn process<Port>(&self, port: Port, eprocess: Va) -> Result<WindowsProcess, WalkError>
    where
        Port: MemoryPort,
    {
        let fields = FieldExtractor::new(port, &self.offsets);

        // ImageFileName is a fixed array and is not terminated when full.
        let mut name = [0u8; offsets::IMAGE_FILE_NAME_LEN];
        fields
            .port()
            .read(fields.field_address(eprocess, offsets::NAME)?, &mut name)?;
        let name = &name[..memchr(0, &name).unwrap_or(name.len())];

        Ok(WindowsProcess {
            eprocess,
            pid: fields.read_u32(eprocess, offsets::PID)?,
            name: String::from_utf8_lossy(name).into_owned(),
        })
    }

    /// Reads every process in the process list.
    pub fn processes<Port>(&self, port: Port, limit: usize) -> Result<Vec<WindowsProcess>, WalkError>
    where
        Port: MemoryPort + Copy,
    {
        self.eprocesses(port, limit)?
            .map(|eprocess| self.process(port, eprocess?))
            .collect()
    }

    /// Finds the `_EPROCESS` with the given PID, stopping at the first match.
    pub fn find_process<Port>(
        &self,
        port: Port,
        pid: u32,
        limit: usize,
    ) -> Result<Option<Va>, WalkError>
    where
        Port: MemoryPort + Copy,
    {
        let fields = FieldExtractor::new(port, &self.offsets);

        for eprocess in self.eprocesses(port, limit)? {
            let eprocess = eprocess?;

            if fields.read_u32(eprocess, offsets::PID)? == pid {
                tracing::debug!(pid, %eprocess, "found process");
                return Ok(Some(eprocess));
            }
        }

        Ok(None)
    }
}
