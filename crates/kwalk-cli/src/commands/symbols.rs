use std::process::ExitCode;

use clap::Args;

use super::CommandResult;
use crate::{GlobalArgs, session::Profiled};

/// Arguments of `kwalk symbols`.
#[derive(Args, Debug)]
pub struct SymbolsArgs {
    /// Symbol names
    #[arg(required = true)]
    pub names: Vec<String>,
}

/// Resolves kernel symbols from the profile's `System.map` and overrides.
pub fn symbols(global: &GlobalArgs, args: &SymbolsArgs) -> CommandResult {
    let profiled = Profiled::load(global)?;
    let mut missing = 0usize;

    for name in &args.names {
        match profiled.symbols.get(name) {
            Some(address) => println!("{address} {name}"),
            None => {
                eprintln!("{name}: not found");
                missing += 1;
            }
        }
    }

    Ok(match missing {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
