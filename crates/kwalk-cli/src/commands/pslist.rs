use std::process::ExitCode;

use clap::Args;
use kwalk_core::{OsFamily, Va};
use kwalk_os_windows::offsets as windows;

use super::{CommandResult, linux_task_fields, print_offsets};
use crate::{
    GlobalArgs,
    session::{Session, TargetArgs},
};

/// Arguments of `kwalk pslist`.
#[derive(Args, Debug)]
pub struct PslistArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Lists the processes of the target.
pub fn pslist(global: &GlobalArgs, args: &PslistArgs) -> CommandResult {
    let session = Session::open(global, &args.target)?;
    let traversal = session.traversal();

    let processes: Vec<(u32, String, Va, Option<u32>)> = match session.os() {
        OsFamily::Linux => {
            let os = session.profiled.linux()?;
            print_offsets(os.offsets(), &linux_task_fields(os.offsets(), &[]))?;

            traversal
                .run(|space| os.processes(space, traversal.limit()))?
                .into_iter()
                .map(|process| (process.pid, process.name, process.task, process.state))
                .collect()
        }
        OsFamily::Windows => {
            let os = session.profiled.windows()?;
            print_offsets(os.offsets(), &[windows::TASKS, windows::NAME, windows::PID])?;

            traversal
                .run(|space| os.processes(space, traversal.limit()))?
                .into_iter()
                .map(|process| (process.pid, process.name, process.eprocess, None))
                .collect()
        }
    };

    for (pid, name, address, state) in &processes {
        println!("{}", process_line(*pid, name, *address, *state));
    }

    tracing::info!(count = processes.len(), "process listing finished");
    Ok(ExitCode::SUCCESS)
}

fn process_line(pid: u32, name: &str, address: Va, state: Option<u32>) -> String {
    match state {
        Some(state) => format!("[{pid:5}] {name} (struct addr:{address:x}) state:{state}"),
        None => format!("[{pid:5}] {name} (struct addr:{address:x})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_line_shows_state() {
        assert_eq!(
            process_line(1, "systemd", Va(0xffff_8880_0100_0000), Some(1)),
            "[    1] systemd (struct addr:ffff888001000000) state:1"
        );
    }

    #[test]
    fn line_without_state() {
        assert_eq!(
            process_line(4, "System", Va(0xffff_e000_1234_5040), None),
            "[    4] System (struct addr:ffffe00012345040)"
        );
    }
}
