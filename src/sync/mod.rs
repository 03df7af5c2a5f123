/// Synchronization primitives for the port subsystem
/// Spinlocks for short critical sections and the counting-semaphore table
/// used for producer/consumer blocking.

pub mod sem;
pub mod spin;

pub use spin::{IrqSpinLock, IrqSpinLockGuard, SpinLock, SpinLockGuard};
