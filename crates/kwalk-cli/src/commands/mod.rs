mod dmesg;
mod files;
mod pslist;
mod symbols;
mod systable;

use kwalk_core::{OffsetTable, WalkError};
use kwalk_os_linux::offsets as linux;

pub use self::{
    dmesg::{DmesgArgs, dmesg},
    files::{FilesArgs, files},
    pslist::{PslistArgs, pslist},
    symbols::{SymbolsArgs, symbols},
    systable::{SystableArgs, systable},
};

/// Result of a command; `Ok` carries the exit status.
pub type CommandResult = Result<std::process::ExitCode, Box<dyn std::error::Error>>;

/// Prints `fields` with their offsets, failing on the first unknown one.
fn print_offsets(offsets: &OffsetTable, fields: &[&str]) -> Result<(), WalkError> {
    let mut line = String::from("offsets:");

    for field in fields {
        line.push_str(&format!(" {field}={:#x}", offsets.offset(field)?));
    }

    println!("{line}");
    Ok(())
}

/// Returns the `task_struct` fields printed by the Linux commands, followed
/// by `extra`. The optional state field is listed only when profiled.
fn linux_task_fields(offsets: &OffsetTable, extra: &[&'static str]) -> Vec<&'static str> {
    let mut fields = vec![linux::TASKS, linux::NAME, linux::PID];

    if offsets.contains(linux::STATE) {
        fields.push(linux::STATE);
    }

    fields.extend_from_slice(extra);
    fields
}

#[cfg(test)]
mod tests {
    use kwalk_core::OsFamily;

    use super::*;

    #[test]
    fn task_fields_include_profiled_state() {
        let offsets = OffsetTable::new(
            OsFamily::Linux,
            [("linux_tasks", 0x3a0), ("linux_state", 0x18)],
        );

        assert_eq!(
            linux_task_fields(&offsets, &[linux::FILES]),
            ["linux_tasks", "linux_name", "linux_pid", "linux_state", "linux_files"]
        );
    }

    #[test]
    fn task_fields_skip_missing_state() {
        let offsets = OffsetTable::new(OsFamily::Linux, [("linux_tasks", 0x3a0)]);

        assert_eq!(
            linux_task_fields(&offsets, &[]),
            ["linux_tasks", "linux_name", "linux_pid"]
        );
    }
}
