//! Named message port IPC
//!
//! A kernel-level named message port subsystem: bounded, process-associated,
//! many-writer / many-reader FIFO queues of `(code, payload)` messages.
//! Ports are the IPC building block for application and system services;
//! each has a stable integer identity, an owner task, a human-readable name
//! and a fixed-capacity queue of variable-length byte payloads tagged with
//! a caller-supplied opcode.
//!
//! # Components
//!
//! - **port**: the port table, per-port queue state and lifecycle
//! - **port::user**: the syscall-boundary wrappers
//! - **sync**: spinlocks and the counting-semaphore table
//! - **mm**: chained payload buffers and the user/kernel copy boundary
//! - **task**: task identity, signal and teardown hooks
//! - **console**, **log**, **debug**: output sink, structured logging and
//!   debugger commands
//!
//! # Blocking architecture
//!
//! Each port carries two counting semaphores: `read_sem` counts queued
//! messages, `write_sem` counts free queue cells. Writers acquire a write
//! token and release a read token; readers do the opposite, so each side
//! blocks only on its own shortage and the two counts always conserve the
//! queue capacity. Deleting a port destroys both semaphores, which is what
//! wakes every blocked task with a `Deleted` result.
//!
//! # Example
//!
//! ```rust,no_run
//! use msgport::port;
//!
//! port::init();
//!
//! let p = port::create(16, Some("service requests")).unwrap();
//! port::write(p, 0x42, b"hello").unwrap();
//!
//! let mut buf = [0u8; 64];
//! let (code, len) = port::read(p, &mut buf).unwrap();
//! assert_eq!((code, &buf[..len]), (0x42, &b"hello"[..]));
//!
//! port::delete(p).unwrap();
//! ```

#![cfg_attr(target_os = "none", no_std)]

extern crate alloc;

pub mod config;
pub mod console;
pub mod debug;
pub mod log;
pub mod mm;
pub mod port;
pub mod sync;
pub mod task;
pub mod time;

pub use port::{PortError, PortFlags, PortId, PortInfo, PortResult};

/// Bring up the whole subsystem (semaphore table, then port table)
pub fn init() {
    port::init();
}
