use std::process::ExitCode;

use clap::Args;
use kwalk_os_linux::{FileTable, OpenFile, offsets as linux};

use super::{CommandResult, linux_task_fields, print_offsets};
use crate::{
    GlobalArgs,
    session::{Session, TargetArgs},
};

/// Arguments of `kwalk files`.
#[derive(Args, Debug)]
pub struct FilesArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// PID of the process
    pub pid: u32,

    /// Also list the open file descriptors
    #[arg(long)]
    pub list: bool,

    /// Maximum number of descriptor slots inspected with `--list`
    #[arg(long, default_value_t = 1024)]
    pub max_fds: usize,
}

/// Shows the file table of a Linux process.
pub fn files(global: &GlobalArgs, args: &FilesArgs) -> CommandResult {
    let session = Session::open(global, &args.target)?;
    let os = session.profiled.linux()?;
    let traversal = session.traversal();
    print_offsets(os.offsets(), &linux_task_fields(os.offsets(), &[linux::FILES]))?;

    let found = traversal.run(|space| {
        let Some(task) = os.find_task(space, args.pid, traversal.limit())? else {
            return Ok(None);
        };

        let process = os.process(space, task)?;
        let table = os.file_table(space, task)?;

        let open = match (&table, args.list) {
            (Some(table), true) => os.open_files(space, table, args.max_fds)?,
            _ => Vec::new(),
        };

        Ok(Some((process, table, open)))
    })?;

    let Some((process, table, open)) = found else {
        return Err(format!("no process with PID {}", args.pid).into());
    };

    println!("process-{}-{} opened files information:", process.pid, process.name);
    if let Some(state) = process.state {
        println!("state is {state}");
    }

    match table {
        Some(FileTable { files, count, max_fds }) => {
            println!("files_struct: {files}");
            println!("count is {count}");
            println!("max_fds is {max_fds}");
        }
        None => println!("no files_struct (kernel thread)"),
    }

    for OpenFile { fd, file, name } in &open {
        println!("{fd:5} -> {name} (file:{file:x})");
    }

    Ok(ExitCode::SUCCESS)
}
