/// Configuration constants for the message port subsystem

/// Maximum number of port slots in the table (must be a power of two;
/// port IDs are congruent to their slot index modulo this value)
pub const MAX_PORTS: usize = 4096;

/// Maximum queue depth a port may be created with
pub const MAX_QUEUE_LENGTH: usize = 4096;

/// Maximum payload size of a single message in bytes
pub const PORT_MAX_MESSAGE_SIZE: usize = 65536;

/// Maximum length of a port or semaphore name, including the terminator slot
/// (stored names are truncated to MAX_OS_NAME_LEN - 1 bytes)
pub const MAX_OS_NAME_LEN: usize = 32;

/// Maximum number of semaphore slots (two per port plus headroom)
pub const MAX_SEMS: usize = 8192;

/// Payload bytes held by one block of a chained buffer
pub const CBUF_BLOCK_SIZE: usize = 2048;

/// Start of the kernel half of the address space; user pointers at or above
/// this address are rejected at the syscall boundary
pub const KERNEL_BASE: usize = 0xFFFF_8000_0000_0000;

/// Maximum number of registered debugger commands
pub const MAX_DBG_COMMANDS: usize = 32;
