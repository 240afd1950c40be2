#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap};

use kwalk_core::{MemoryPort, OffsetTable, OsFamily, Pa, SymbolTable, Va, WalkError};
use kwalk_os_linux::LinuxOs;

const PAGE_SIZE: u64 = 0x1000;

/// Sparse kernel virtual memory.
#[derive(Default)]
pub struct KernelMemory {
    pages: RefCell<HashMap<u64, Vec<u8>>>,
}

impl KernelMemory {
    pub fn write(&self, address: u64, bytes: &[u8]) {
        let mut pages = self.pages.borrow_mut();

        for (index, byte) in bytes.iter().enumerate() {
            let address = address + index as u64;
            let page = pages
                .entry(address / PAGE_SIZE)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize]);
            page[(address % PAGE_SIZE) as usize] = *byte;
        }
    }

    pub fn write_u32(&self, address: u64, value: u32) {
        self.write(address, &value.to_le_bytes());
    }

    pub fn write_u64(&self, address: u64, value: u64) {
        self.write(address, &value.to_le_bytes());
    }

    pub fn write_cstring(&self, address: u64, value: &str) {
        self.write(address, value.as_bytes());
        self.write(address + value.len() as u64, &[0]);
    }
}

impl MemoryPort for KernelMemory {
    fn read(&self, address: Va, buffer: &mut [u8]) -> Result<(), WalkError> {
        let pages = self.pages.borrow();

        for (index, byte) in buffer.iter_mut().enumerate() {
            let address = address.0 + index as u64;
            let page = pages.get(&(address / PAGE_SIZE)).ok_or(WalkError::OutOfBounds {
                address: Pa(address),
            })?;
            *byte = page[(address % PAGE_SIZE) as usize];
        }

        Ok(())
    }
}

pub const INIT_TASK: u64 = 0xffff_ffff_8261_3940;

/// Offsets of a small fake kernel.
pub const TASKS: u64 = 0x3a0;
pub const NAME: u64 = 0x550;
pub const PID: u64 = 0x4a0;
pub const STATE: u64 = 0x18;
pub const FILES: u64 = 0x6a8;

pub fn linux_offsets() -> OffsetTable {
    OffsetTable::new(
        OsFamily::Linux,
        [
            ("linux_tasks", TASKS),
            ("linux_name", NAME),
            ("linux_pid", PID),
            ("linux_state", STATE),
            ("linux_files", FILES),
            ("count", 0x0),
            ("fdtable", 0x20),
            ("max_fds", 0x20),
            ("linux_fdt", 0x28),
            ("linux_fd", 0x8),
            ("linux_f_path", 0x10),
            ("linux_path_dentry", 0x8),
            ("linux_dentry_name", 0x20),
            ("linux_qstr_name", 0x8),
        ],
    )
}

pub fn linux(symbols: SymbolTable) -> LinuxOs {
    LinuxOs::new(linux_offsets(), symbols).unwrap()
}

pub fn symbols() -> SymbolTable {
    let mut symbols = SymbolTable::new();
    symbols.insert("init_task", Va(INIT_TASK));
    symbols
}

/// Writes a task and links it after `previous` in the task list.
pub fn write_task(memory: &KernelMemory, task: u64, pid: u32, name: &str) {
    memory.write_u32(task + PID, pid);
    memory.write_u32(task + STATE, 1);
    memory.write_cstring(task + NAME, name);
}

/// Links `tasks` into the circular list headed by `init_task`.
pub fn link_tasks(memory: &KernelMemory, tasks: &[u64]) {
    let mut previous = INIT_TASK;

    for &task in tasks {
        memory.write_u64(previous + TASKS, task + TASKS);
        previous = task;
    }

    memory.write_u64(previous + TASKS, INIT_TASK + TASKS);
}
