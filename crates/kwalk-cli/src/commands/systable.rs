use std::{path::PathBuf, process::ExitCode};

use clap::Args;
use kwalk_core::Hex;
use kwalk_os_linux::SyscallBaseline;

use super::CommandResult;
use crate::{
    GlobalArgs,
    session::{Session, TargetArgs},
};

/// Arguments of `kwalk systable`.
#[derive(Args, Debug)]
pub struct SystableArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Known-good `<index> <address>` pairs
    pub baseline: PathBuf,

    /// Symbol of the table to check
    #[arg(long, default_value = "sys_call_table")]
    pub table: String,

    /// Compared width of each entry in bytes (4 or 8)
    #[arg(long, default_value_t = 8, value_parser = parse_width)]
    pub width: usize,

    /// Stop at the first modified entry
    #[arg(long)]
    pub stop_on_first: bool,
}

fn parse_width(value: &str) -> Result<usize, String> {
    match value {
        "4" => Ok(4),
        "8" => Ok(8),
        _ => Err(format!("width must be 4 or 8, got `{value}`")),
    }
}

/// Compares a syscall table with a baseline.
///
/// Exits with status 2 if any entry differs.
pub fn systable(global: &GlobalArgs, args: &SystableArgs) -> CommandResult {
    let baseline = SyscallBaseline::load(&args.baseline)?;
    let session = Session::open(global, &args.target)?;
    let os = session.profiled.linux()?;
    let table = os.symbols().resolve(&args.table)?;

    println!("{} virtual address is {table}", args.table);

    let entries = session.traversal().run(|space| {
        os.check_syscall_table(space, table, &baseline, args.width, args.stop_on_first)
    })?;

    let mut modified = 0usize;
    for entry in &entries {
        match entry.is_modified() {
            true => {
                modified += 1;
                println!(
                    "{}th entry ({}) modified from {} to {}",
                    entry.index,
                    entry.slot,
                    Hex(entry.expected),
                    Hex(entry.actual)
                );
            }
            false => println!(
                "{}-{}-{}: {} - {}",
                args.table,
                entry.index,
                entry.slot,
                Hex(entry.expected),
                Hex(entry.actual)
            ),
        }
    }

    println!(
        "{modified} of {} checked entries modified ({} in baseline)",
        entries.len(),
        baseline.len()
    );

    Ok(match modified {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::from(2),
    })
}
