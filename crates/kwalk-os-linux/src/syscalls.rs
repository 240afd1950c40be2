//! Syscall table integrity check against a known-good baseline.

use std::path::Path;

use kwalk_core::{MemoryPort, Va, WalkError};

use crate::{LinuxError, LinuxOs};

/// Size of a syscall table slot on 64-bit kernels.
const SLOT_SIZE: u64 = 8;

/// Known-good syscall handler addresses, one `<index> <hex address>` pair
/// per line.
///
/// ```
/// # use kwalk_os_linux::SyscallBaseline;
/// let baseline = SyscallBaseline::parse("0 ffffffff811c5d60\n1 0xffffffff811c5e20\n").unwrap();
/// assert_eq!(baseline.entries(), [(0, 0xffffffff811c5d60), (1, 0xffffffff811c5e20)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyscallBaseline {
    entries: Vec<(u32, u64)>,
}

impl SyscallBaseline {
    /// Parses a baseline. Blank lines and `#` comments are ignored.
    pub fn parse(text: &str) -> Result<Self, LinuxError> {
        let mut entries = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line = match line.split_once('#') {
                Some((content, _)) => content,
                None => line,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            let error = |message: &str| LinuxError::InvalidBaseline {
                line: index + 1,
                message: message.to_owned(),
            };

            let mut parts = line.split_whitespace();
            let (Some(number), Some(address), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(error("expected `<index> <address>`"));
            };

            let number = number
                .parse::<u32>()
                .map_err(|_| error("invalid syscall number"))?;

            let address = address
                .strip_prefix("0x")
                .or_else(|| address.strip_prefix("0X"))
                .unwrap_or(address);

            let address = u64::from_str_radix(address, 16).map_err(|_| error("invalid address"))?;

            entries.push((number, address));
        }

        Ok(Self { entries })
    }

    /// Loads a baseline file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalkError> {
        Ok(Self::parse(&std::fs::read_to_string(path)?)?)
    }

    /// Returns the `(index, address)` pairs in file order.
    pub fn entries(&self) -> &[(u32, u64)] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the baseline has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One compared syscall table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallEntry {
    /// Syscall number.
    pub index: u32,

    /// Address of the table slot.
    pub slot: Va,

    /// Handler address from the baseline.
    pub expected: u64,

    /// Handler address found in memory.
    pub actual: u64,
}

impl SyscallEntry {
    /// Returns `true` if the slot differs from the baseline.
    pub fn is_modified(&self) -> bool {
        self.expected != self.actual
    }
}

impl LinuxOs {
    /// Compares the syscall table at `table` with `baseline`.
    ///
    /// Slots are 8 bytes apart. With `width == 4` only the low 32 bits of
    /// each slot and of each expected address are compared. With
    /// `stop_on_first`, the check ends after the first modified slot, which
    /// is included in the result.
    pub fn check_syscall_table<Port>(
        &self,
        port: Port,
        table: Va,
        baseline: &SyscallBaseline,
        width: usize,
        stop_on_first: bool,
    ) -> Result<Vec<SyscallEntry>, WalkError>
    where
        Port: MemoryPort,
    {
        let mask = match width {
            8 => u64::MAX,
            4 => u64::from(u32::MAX),
            _ => return Err(LinuxError::UnsupportedWidth(width).into()),
        };

        let mut result = Vec::with_capacity(baseline.len());

        for &(index, expected) in baseline.entries() {
            let slot = table + u64::from(index) * SLOT_SIZE;

            let entry = SyscallEntry {
                index,
                slot,
                expected: expected & mask,
                actual: port.read_uint(slot, width)?,
            };

            result.push(entry);

            if entry.is_modified() {
                tracing::warn!(
                    index,
                    %slot,
                    expected = entry.expected,
                    actual = entry.actual,
                    "syscall table entry modified"
                );

                if stop_on_first {
                    break;
                }
            }
        }

        Ok(result)
    }
}
