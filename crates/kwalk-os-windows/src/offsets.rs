//! Names of the Windows offsets and symbols used by the walks.

/// `_EPROCESS.ActiveProcessLinks`.
pub const TASKS: &str = "win_tasks";

/// `_EPROCESS.ImageFileName`.
pub const NAME: &str = "win_pname";

/// `_EPROCESS.UniqueProcessId`.
pub const PID: &str = "win_pid";

/// Size of `_EPROCESS.ImageFileName`.
pub const IMAGE_FILE_NAME_LEN: usize = 15;

/// Sentinel head of the active process list.
pub const PS_ACTIVE_PROCESS_HEAD: &str = "PsActiveProcessHead";

/// Pointer to the `System` process.
pub const PS_INITIAL_SYSTEM_PROCESS: &str = "PsInitialSystemProcess";
