/// Memory helpers for the port subsystem
/// Chained payload buffers and the user/kernel copy boundary.

pub mod cbuf;
pub mod usercopy;

pub use cbuf::CBuf;
pub use usercopy::{is_kernel_address, UserPtr};
