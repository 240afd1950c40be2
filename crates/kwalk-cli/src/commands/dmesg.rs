use std::process::ExitCode;

use clap::{Args, ValueEnum};

use super::CommandResult;
use crate::{
    GlobalArgs,
    session::{Session, TargetArgs},
};

/// How the kernel log is decoded.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DmesgFormat {
    /// The raw buffer up to the first NUL byte.
    #[default]
    Plain,

    /// Parsed `printk_log` records (Linux 3.5 to 5.9).
    Records,
}

/// Arguments of `kwalk dmesg`.
#[derive(Args, Debug)]
pub struct DmesgArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: DmesgFormat,

    /// Maximum number of bytes read in plain format (default: `log_buf_len`)
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Prints the Linux kernel log.
pub fn dmesg(global: &GlobalArgs, args: &DmesgArgs) -> CommandResult {
    let session = Session::open(global, &args.target)?;
    let os = session.profiled.linux()?;
    let traversal = session.traversal();

    match args.format {
        DmesgFormat::Plain => {
            let (buffer, text) = traversal.run(|space| {
                Ok((os.log_buffer(space)?, os.read_log_text(space, args.limit)?))
            })?;

            println!("log_buf: {buffer}");
            println!("dmesg: {text}");
        }
        DmesgFormat::Records => {
            let records = traversal.run(|space| os.read_log_records(space))?;

            for record in &records {
                println!("{record}");
            }

            tracing::info!(count = records.len(), "kernel log decoded");
        }
    }

    Ok(ExitCode::SUCCESS)
}
