//! Names of the Linux offsets and symbols used by the walks.
//!
//! Offset names follow the keys printed by the offset-finder kernel module.

/// `task_struct.tasks`.
pub const TASKS: &str = "linux_tasks";

/// `task_struct.comm`.
pub const NAME: &str = "linux_name";

/// `task_struct.pid`.
pub const PID: &str = "linux_pid";

/// `task_struct.state` (or `__state`).
pub const STATE: &str = "linux_state";

/// `task_struct.files`.
pub const FILES: &str = "linux_files";

/// `files_struct.count`.
pub const FILES_COUNT: &str = "count";

/// `files_struct.fdtab`, the embedded fd table.
pub const FDTABLE: &str = "fdtable";

/// `files_struct.fdtab.max_fds`.
pub const MAX_FDS: &str = "max_fds";

/// `files_struct.fdt`.
pub const FDT: &str = "linux_fdt";

/// `fdtable.fd`.
pub const FD: &str = "linux_fd";

/// `file.f_path`.
pub const F_PATH: &str = "linux_f_path";

/// `path.dentry`.
pub const PATH_DENTRY: &str = "linux_path_dentry";

/// `dentry.d_name`.
pub const DENTRY_NAME: &str = "linux_dentry_name";

/// `qstr.name`.
pub const QSTR_NAME: &str = "linux_qstr_name";

/// Length of `task_struct.comm`, terminator included.
pub const TASK_COMM_LEN: usize = 16;

/// Bound for dentry names (`NAME_MAX` plus terminator).
pub const DENTRY_NAME_LEN: usize = 256;

/// The first task, PID 0.
pub const INIT_TASK: &str = "init_task";

/// Kernel log buffer pointer.
pub const LOG_BUF: &str = "log_buf";

/// Kernel log buffer length.
pub const LOG_BUF_LEN: &str = "log_buf_len";

/// Index of the oldest printk record.
pub const LOG_FIRST_IDX: &str = "log_first_idx";

/// Index one past the newest printk record.
pub const LOG_NEXT_IDX: &str = "log_next_idx";

/// The native syscall table.
pub const SYS_CALL_TABLE: &str = "sys_call_table";

/// Kernel top-level page table, by kernel version.
pub const KERNEL_PAGE_TABLE: &[&str] = &["init_top_pgt", "init_level4_pgt"];

/// Base of the kernel text mapping (`__START_KERNEL_map`).
pub const START_KERNEL_MAP: u64 = 0xffff_ffff_8000_0000;
