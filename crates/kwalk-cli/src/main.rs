//! `kwalk`: process lists, open files, kernel logs and syscall table checks
//! read out of memory dumps.

mod commands;
mod logging;
mod session;

use std::{error::Error, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use kwalk_core::WalkError;

use self::commands::{DmesgArgs, FilesArgs, PslistArgs, SymbolsArgs, SystableArgs};

/// Walks kernel structures in a memory dump using a fixed offset profile.
#[derive(Parser, Debug)]
#[command(name = "kwalk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Profile configuration file
    #[arg(
        long,
        global = true,
        env = "KWALK_CONFIG",
        default_value = "/etc/kwalk.conf"
    )]
    pub config: PathBuf,

    /// Profile block name (default: first block)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Symbol override, e.g. `init_task=0xffffffff82613940`
    #[arg(short = 's', long = "symbol", global = true, value_parser = parse_symbol)]
    pub symbols: Vec<(String, u64)>,

    /// More logging (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List processes
    Pslist(PslistArgs),

    /// Show the file table of a Linux process
    Files(FilesArgs),

    /// Print the Linux kernel log
    Dmesg(DmesgArgs),

    /// Compare the Linux syscall table with a baseline
    Systable(SystableArgs),

    /// Resolve kernel symbols
    Symbols(SymbolsArgs),
}

/// Parses a hexadecimal (`0x` prefixed) or decimal number.
pub fn parse_number(value: &str) -> Result<u64, String> {
    let result = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };

    result.map_err(|err| format!("invalid number `{value}`: {err}"))
}

fn parse_symbol(value: &str) -> Result<(String, u64), String> {
    let (name, address) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=ADDRESS, got `{value}`"))?;

    Ok((name.trim().to_owned(), parse_number(address.trim())?))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.global.verbose, cli.global.quiet);

    let result = match &cli.command {
        Command::Pslist(args) => commands::pslist(&cli.global, args),
        Command::Files(args) => commands::files(&cli.global, args),
        Command::Dmesg(args) => commands::dmesg(&cli.global, args),
        Command::Systable(args) => commands::systable(&cli.global, args),
        Command::Symbols(args) => commands::symbols(&cli.global, args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            report(err.as_ref());
            ExitCode::FAILURE
        }
    }
}

fn report(err: &(dyn Error + 'static)) {
    for line in report_lines(err) {
        eprintln!("{line}");
    }
}

/// Formats an error with its causes, plus a hint when a symbol or offset
/// lookup failed.
fn report_lines(err: &(dyn Error + 'static)) -> Vec<String> {
    let mut lines = vec![format!("error: {err}")];
    let mut unresolved = is_resolve_error(err);

    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("  caused by: {cause}"));
        unresolved |= is_resolve_error(cause);
        source = cause.source();
    }

    if unresolved {
        lines.push(String::from(
            "  hint: check the profile block (--config, --profile) and the \
             System.map, or pass the symbol with -s NAME=ADDRESS",
        ));
    }

    lines
}

fn is_resolve_error(err: &(dyn Error + 'static)) -> bool {
    err.downcast_ref::<WalkError>()
        .is_some_and(WalkError::is_resolve_error)
}
