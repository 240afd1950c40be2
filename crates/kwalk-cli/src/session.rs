use std::path::{Path, PathBuf};

use clap::Args;
use kwalk_arch_amd64::Amd64;
use kwalk_core::{
    OsFamily, Pa, Profile, ProfileConfig, SymbolTable, TranslationMechanism, Traversal, Va,
    WalkCore, WalkError,
};
use kwalk_driver_dump::DumpDriver;
use kwalk_os_linux::LinuxOs;
use kwalk_os_windows::WindowsOs;

use crate::{GlobalArgs, parse_number};

/// Driver used by every command.
pub type Driver = DumpDriver<Amd64>;

/// Options selecting the target memory.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Memory dump (raw physical image or ELF core)
    pub dump: PathBuf,

    /// Page-table root (physical address)
    #[arg(long, value_parser = parse_number)]
    pub dtb: Option<u64>,

    /// Treat kernel addresses as physical addresses
    #[arg(long, conflicts_with = "dtb")]
    pub physical: bool,

    /// Maximum number of list nodes visited by a single walk
    #[arg(long, default_value_t = kwalk_core::DEFAULT_WALK_LIMIT)]
    pub max_nodes: usize,
}

/// The profile and symbols selected on the command line.
pub struct Profiled {
    pub profile: Profile,
    pub symbols: SymbolTable,
}

impl Profiled {
    pub fn load(global: &GlobalArgs) -> Result<Self, WalkError> {
        let config = ProfileConfig::load(&global.config)?;
        let profile = config.profile(global.profile.as_deref())?.clone();

        let mut symbols = profile.symbols()?;
        for (name, address) in &global.symbols {
            symbols.insert(name.clone(), Va(*address));
        }

        tracing::info!(
            profile = %profile.name,
            os = %profile.os(),
            offsets = profile.offsets.len(),
            symbols = symbols.len(),
            "profile loaded"
        );

        Ok(Self { profile, symbols })
    }

    pub fn linux(&self) -> Result<LinuxOs, WalkError> {
        LinuxOs::new(self.profile.offsets.clone(), self.symbols.clone())
    }

    pub fn windows(&self) -> Result<WindowsOs, WalkError> {
        WindowsOs::new(self.profile.offsets.clone(), self.symbols.clone())
    }
}

/// An opened dump with a resolved translation mechanism.
pub struct Session {
    pub profiled: Profiled,
    pub core: WalkCore<Driver>,
    pub mechanism: TranslationMechanism,
    pub max_nodes: usize,
}

impl Session {
    pub fn open(global: &GlobalArgs, target: &TargetArgs) -> Result<Self, WalkError> {
        let profiled = Profiled::load(global)?;
        let core = WalkCore::new(open_dump(&target.dump)?);

        let mechanism = match target.physical {
            true => TranslationMechanism::Direct,
            false => TranslationMechanism::Paging {
                root: resolve_root(&profiled, target.dtb)?,
            },
        };

        tracing::debug!(?mechanism, "session ready");

        Ok(Self {
            profiled,
            core,
            mechanism,
            max_nodes: target.max_nodes,
        })
    }

    pub fn os(&self) -> OsFamily {
        self.profiled.profile.os()
    }

    pub fn traversal(&self) -> Traversal<'_, Driver> {
        Traversal::new(&self.core, self.mechanism).with_limit(self.max_nodes)
    }
}

fn open_dump(path: &Path) -> Result<Driver, WalkError> {
    let driver = Driver::new(path)?;

    tracing::info!(
        path = %path.display(),
        format = ?driver.dump().format(),
        end = %driver.dump().end(),
        "dump opened"
    );

    Ok(driver)
}

/// Picks the page-table root: the command line, then the profile, then (on
/// Linux) the kernel's own top-level table.
fn resolve_root(profiled: &Profiled, dtb: Option<u64>) -> Result<Pa, WalkError> {
    if let Some(dtb) = dtb {
        return Ok(Pa(dtb));
    }

    if let Some(dtb) = profiled.profile.dtb {
        return Ok(dtb);
    }

    match profiled.profile.os() {
        OsFamily::Linux => profiled
            .linux()?
            .kernel_page_table_root(profiled.profile.phys_base),
        OsFamily::Windows => Err(WalkError::Other(
            "Windows profiles need a page-table root (--dtb or `dtb` in the profile)",
        )),
    }
}
