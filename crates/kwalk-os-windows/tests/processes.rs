use std::{cell::RefCell, collections::HashMap};

use kwalk_core::{
    DEFAULT_WALK_LIMIT, MemoryPort, OffsetTable, OsFamily, Pa, SymbolTable, Va, WalkError,
};
use kwalk_os_windows::{ProcessListHead, WindowsOs};

const PAGE_SIZE: u64 = 0x1000;

#[derive(Default)]
struct KernelMemory {
    pages: RefCell<HashMap<u64, Vec<u8>>>,
}

impl KernelMemory {
    fn write(&self, address: u64, bytes: &[u8]) {
        let mut pages = self.pages.borrow_mut();

        for (index, byte) in bytes.iter().enumerate() {
            let address = address + index as u64;
            let page = pages
                .entry(address / PAGE_SIZE)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize]);
            page[(address % PAGE_SIZE) as usize] = *byte;
        }
    }

    fn write_u64(&self, address: u64, value: u64) {
        self.write(address, &value.to_le_bytes());
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

const ACTIVE_PROCESS_LINKS: u64 = 0x448;
const UNIQUE_PROCESS_ID: u64 = 0x440;
const IMAGE_FILE_NAME: u64 = 0x5a8;

const PS_ACTIVE_PROCESS_HEAD: u64 = 0xfffff803_3ce1_e0a0;
const PS_INITIAL_SYSTEM_PROCESS: u64 = 0xfffff803_3cf1_c5a0;

const SYSTEM: u64 = 0xffffc001_0e86_5040;
const SMSS: u64 = 0xffffc001_1020_3080;
const EXPLORER: u64 = 0xffffc001_1320_b0c0;

fn offsets() -> OffsetTable {
    OffsetTable::new(
        OsFamily::Windows,
        [
            ("win_tasks", ACTIVE_PROCESS_LINKS),
            ("win_pname", IMAGE_FILE_NAME),
            ("win_pid", UNIQUE_PROCESS_ID),
        ],
    )
}

fn write_process(memory: &KernelMemory, eprocess: u64, pid: u64, name: &[u8]) {
    memory.write_u64(eprocess + UNIQUE_PROCESS_ID, pid);
    memory.write(eprocess + IMAGE_FILE_NAME, name);
}

/// PsActiveProcessHead -> System -> smss.exe -> explorer.exe -> head
fn kernel() -> KernelMemory {
    let memory = KernelMemory::default();
    write_process(&memory, SYSTEM, 4, b"System\0");
    write_process(&memory, SMSS, 388, b"smss.exe\0");
    // A full ImageFileName is not terminated; the next byte is
    // PriorityClass.
    write_process(&memory, EXPLORER, 4712, b"SearchIndexer.e\x02");

    let links = [
        PS_ACTIVE_PROCESS_HEAD,
        SYSTEM + ACTIVE_PROCESS_LINKS,
        SMSS + ACTIVE_PROCESS_LINKS,
        EXPLORER + ACTIVE_PROCESS_LINKS,
    ];
    for (index, link) in links.iter().enumerate() {
        memory.write_u64(*link, links[(index + 1) % links.len()]);
    }

    memory.write_u64(PS_INITIAL_SYSTEM_PROCESS, SYSTEM);
    memory
}

fn symbols(sentinel: bool) -> SymbolTable {
    let mut symbols = SymbolTable::new();
    symbols.insert("PsInitialSystemProcess", Va(PS_INITIAL_SYSTEM_PROCESS));
    if sentinel {
        symbols.insert("PsActiveProcessHead", Va(PS_ACTIVE_PROCESS_HEAD));
    }
    symbols
}

#[test]
fn walks_from_active_process_head() -> Result<(), WalkError> {
    let memory = kernel();
    let windows = WindowsOs::new(offsets(), symbols(true))?;

    assert_eq!(
        windows.process_list_head(&memory)?,
        ProcessListHead::Sentinel(Va(PS_ACTIVE_PROCESS_HEAD))
    );

    let processes = windows.processes(&memory, DEFAULT_WALK_LIMIT)?;

    let summary: Vec<_> = processes
        .iter()
        .map(|process| (process.eprocess, process.pid, process.name.as_str()))
        .collect();
    assert_eq!(
        summary,
        [
            (Va(SYSTEM), 4, "System"),
            (Va(SMSS), 388, "smss.exe"),
            (Va(EXPLORER), 4712, "SearchIndexer.e"),
        ]
    );
    Ok(())
}

#[test]
fn falls_back_to_system_process() -> Result<(), WalkError> {
    let memory = kernel();
    let windows = WindowsOs::new(offsets(), symbols(false))?;

    assert_eq!(
        windows.process_list_head(&memory)?,
        ProcessListHead::System(Va(SYSTEM))
    );

    let eprocesses = windows
        .eprocesses(&memory, DEFAULT_WALK_LIMIT)?
        .collect::<Result<Vec<_>, _>>()?;

    // System first, then the rest of the ring including the sentinel's
    // container.
    assert_eq!(
        eprocesses,
        [
            Va(SYSTEM),
            Va(SMSS),
            Va(EXPLORER),
            Va(PS_ACTIVE_PROCESS_HEAD - ACTIVE_PROCESS_LINKS),
        ]
    );
    Ok(())
}

#[test]
fn finds_process_by_pid() -> Result<(), WalkError> {
    let memory = kernel();
    let windows = WindowsOs::new(offsets(), symbols(true))?;

    assert_eq!(
        windows.find_process(&memory, 388, DEFAULT_WALK_LIMIT)?,
        Some(Va(SMSS))
    );
    assert_eq!(windows.find_process(&memory, 1, DEFAULT_WALK_LIMIT)?, None);
    Ok(())
}

#[test]
fn null_system_process() {
    let memory = kernel();
    memory.write_u64(PS_INITIAL_SYSTEM_PROCESS, 0);
    let windows = WindowsOs::new(offsets(), symbols(false)).unwrap();

    assert!(matches!(
        windows.processes(&memory, DEFAULT_WALK_LIMIT),
        Err(WalkError::Os(_))
    ));
}

#[test]
fn missing_symbols() {
    let memory = kernel();
    let windows = WindowsOs::new(offsets(), SymbolTable::new()).unwrap();

    assert!(matches!(
        windows.processes(&memory, DEFAULT_WALK_LIMIT),
        Err(WalkError::UnknownSymbol(name)) if name == "PsInitialSystemProcess"
    ));
}

#[test]
fn walk_cap_applies() {
    let memory = kernel();
    let windows = WindowsOs::new(offsets(), symbols(true)).unwrap();

    assert!(matches!(
        windows.processes(&memory, 2),
        Err(WalkError::WalkOverrun { limit: 2, .. })
    ));
}

#[test]
fn rejects_linux_offsets() {
    let offsets = OffsetTable::new(OsFamily::Linux, [("linux_tasks", 0x3a0)]);

    assert!(matches!(
        WindowsOs::new(offsets, SymbolTable::new()),
        Err(WalkError::UnsupportedOs(_))
    ));
}
