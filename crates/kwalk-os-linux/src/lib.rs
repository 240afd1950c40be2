//! Linux kernel structure walks.
//!
//! [`LinuxOs`] combines a Linux [`OffsetTable`] with a [`SymbolTable`] and
//! walks the task list, file tables, kernel log and syscall table of a
//! paused target. All reads go through a [`MemoryPort`]; pausing and
//! resuming is left to the caller's [`Traversal`].
//!
//! [`Traversal`]: kwalk_core::Traversal

mod dmesg;
mod error;
pub mod offsets;
mod syscalls;

use kwalk_core::{
    FieldExtractor, ListWalker, MemoryPort, OffsetTable, OsFamily, Pa, SymbolTable, Va, WalkError,
};

pub use self::{
    dmesg::{LogRecord, MAX_LOG_BUF_LEN, parse_log_records},
    error::LinuxError,
    syscalls::{SyscallBaseline, SyscallEntry},
};

/// A Linux process as seen in its `task_struct`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxProcess {
    /// Address of the `task_struct`.
    pub task: Va,

    /// Process ID.
    pub pid: u32,

    /// Command name (`comm`).
    pub name: String,

    /// Task state, if the profile has a `linux_state` offset.
    pub state: Option<u32>,
}

/// Summary of a task's `files_struct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTable {
    /// Address of the `files_struct`.
    pub files: Va,

    /// Reference count of the `files_struct`.
    pub count: u32,

    /// Capacity of the embedded fd table.
    pub max_fds: u32,
}

/// An open file descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    /// Descriptor number.
    pub fd: u32,

    /// Address of the `struct file`.
    pub file: Va,

    /// Name of the dentry the file refers to.
    pub name: String,
}

/// Linux walks over a fixed offset and symbol profile.
#[derive(Debug)]
pub struct LinuxOs {
    offsets: OffsetTable,
    symbols: SymbolTable,
}

impl LinuxOs {
    /// Creates a new `LinuxOs`.
    ///
    /// Fails with [`WalkError::UnsupportedOs`] if `offsets` is not a Linux
    /// table.
    pub fn new(offsets: OffsetTable, symbols: SymbolTable) -> Result<Self, WalkError> {
        offsets.expect_os(OsFamily::Linux)?;
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

    /// Computes the physical address of the kernel's top-level page table.
    ///
    /// The table lives in the kernel text mapping, so its physical address
    /// is its virtual address minus `__START_KERNEL_map` plus `phys_base`.
    pub fn kernel_page_table_root(&self, phys_base: u64) -> Result<Pa, WalkError> {
        let (va, name) = self.symbols.resolve_any(offsets::KERNEL_PAGE_TABLE)?;

        let pa = va
            .0
            .checked_sub(offsets::START_KERNEL_MAP)
            .ok_or(LinuxError::CorruptedStruct("kernel page table outside the text mapping"))?;

        tracing::debug!(symbol = name, %va, "resolved kernel page table");
        Ok(Pa(pa.wrapping_add(phys_base)))
    }

    /// Returns the address of `init_task`.
    pub fn init_task(&self) -> Result<Va, WalkError> {
        self.symbols.resolve(offsets::INIT_TASK)
    }

    /// Iterates over all `task_struct` addresses, starting with `init_task`.
    ///
    /// `init_task` (PID 0, the swapper) is the list head of
    /// `task_struct.tasks`; it is yielded first and then every other task in
    /// list order.
    pub fn tasks<Port>(
        &self,
        port: Port,
        limit: usize,
    ) -> Result<impl Iterator<Item = Result<Va, WalkError>> + use<Port>, WalkError>
    where
        Port: MemoryPort,
    {
        let init_task = self.init_task()?;
        let tasks = self.offsets.offset(offsets::TASKS)?;

        let walker = ListWalker::begin(port, init_task + tasks, 0)?
            .containing(tasks)
            .with_limit(limit);

        Ok(std::iter::once(Ok(init_task)).chain(walker))
    }

    /// Reads the identifying fields of a task.
    pub fn process<Port>(&self, port: Port, task: Va) -> Result<LinuxProcess, WalkError>
    where
        Port: MemoryPort,
    {
        let fields = FieldExtractor::new(port, &self.offsets);

        let state = match self.offsets.contains(offsets::STATE) {
            true => Some(fields.read_u32(task, offsets::STATE)?),
            false => None,
        };

        Ok(LinuxProcess {
            task,
            pid: fields.read_u32(task, offsets::PID)?,
            name: fields.read_cstring(task, offsets::NAME, offsets::TASK_COMM_LEN)?,
            state,
        })
    }

    /// Reads every process in the task list.
    pub fn processes<Port>(&self, port: Port, limit: usize) -> Result<Vec<LinuxProcess>, WalkError>
    where
        Port: MemoryPort + Copy,
    {
        self.tasks(port, limit)?
            .map(|task| self.process(port, task?))
            .collect()
    }

    /// Finds the task with the given PID, stopping at the first match.
    pub fn find_task<Port>(&self, port: Port, pid: u32, limit: usize) -> Result<Option<Va>, WalkError>
    where
        Port: MemoryPort + Copy,
    {
        let fields = FieldExtractor::new(port, &self.offsets);

        for task in self.tasks(port, limit)? {
            let task = task?;

            if fields.read_u32(task, offsets::PID)? == pid {
                tracing::debug!(pid, %task, "found task");
                return Ok(Some(task));
            }
        }

        Ok(None)
    }

    /// Reads the `files_struct` summary of a task.
    ///
    /// Kernel threads have no `files_struct`; for them this returns `None`.
    pub fn file_table<Port>(&self, port: Port, task: Va) -> Result<Option<FileTable>, WalkError>
    where
        Port: MemoryPort,
    {
        let fields = FieldExtractor::new(port, &self.offsets);

        let files = fields.read_pointer(task, offsets::FILES)?;
        if files.is_null() {
            return Ok(None);
        }

        Ok(Some(FileTable {
            files,
            count: fields.read_u32(files, offsets::FILES_COUNT)?,
            max_fds: fields.read_u32(files, offsets::MAX_FDS)?,
        }))
    }

    /// Lists the open file descriptors of a file table.
    ///
    /// The slot count comes from the live `fdtable` behind `files->fdt`,
    /// which outgrows the embedded one once a process opens more than
    /// `table.max_fds` descriptors. At most `min(fdt->max_fds, limit)` slots
    /// are inspected; empty slots are skipped.
    pub fn open_files<Port>(
        &self,
        port: Port,
        table: &FileTable,
        limit: usize,
    ) -> Result<Vec<OpenFile>, WalkError>
    where
        Port: MemoryPort + Copy,
    {
        let fields = FieldExtractor::new(port, &self.offsets);

        let fdt = fields.read_pointer(table.files, offsets::FDT)?;
        if fdt.is_null() {
            return Err(LinuxError::CorruptedStruct("files_struct.fdt is NULL").into());
        }

        // `max_fds` is profiled relative to `files_struct`, so rebase it
        // onto a standalone `fdtable`.
        let max_fds_offset = self
            .offsets
            .offset(offsets::MAX_FDS)?
            .checked_sub(self.offsets.offset(offsets::FDTABLE)?)
            .ok_or(LinuxError::CorruptedStruct(
                "files_struct.fdtab.max_fds lies before files_struct.fdtab",
            ))?;

        let max_fds = port.read_u32(fdt + max_fds_offset)?;
        if max_fds != table.max_fds {
            tracing::debug!(embedded = table.max_fds, max_fds, "fd table expanded");
        }

        let fd_array = fields.read_pointer(fdt, offsets::FD)?;
        let slots = (max_fds as usize).min(limit);

        if slots < max_fds as usize {
            tracing::warn!(max_fds, limit, "fd table truncated");
        }

        let mut result = Vec::new();
        for fd in 0..slots {
            let file = port.read_va(fd_array + (fd * size_of::<u64>()) as u64)?;
            if file.is_null() {
                continue;
            }

            result.push(OpenFile {
                fd: fd as u32,
                file,
                name: self.file_name(port, file)?,
            });
        }

        Ok(result)
    }

    /// Reads the dentry name of a `struct file`.
    pub fn file_name<Port>(&self, port: Port, file: Va) -> Result<String, WalkError>
    where
        Port: MemoryPort,
    {
        let fields = FieldExtractor::new(port, &self.offsets);

        let path = fields.field_address(file, offsets::F_PATH)?;
        let dentry = fields.read_pointer(path, offsets::PATH_DENTRY)?;
        if dentry.is_null() {
            return Err(LinuxError::CorruptedStruct("file.f_path.dentry is NULL").into());
        }

        let qstr = fields.field_address(dentry, offsets::DENTRY_NAME)?;
        let name = fields.read_pointer(qstr, offsets::QSTR_NAME)?;

        fields.port().read_cstring(name, offsets::DENTRY_NAME_LEN)
    }
}
