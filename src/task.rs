//! Task identity and teardown hooks
//!
//! The port subsystem needs three things from the task layer: the identity
//! of the caller (ports are credited to an owner task), a pending-signal
//! check for interruptible blocking, and a teardown hook that reclaims all
//! ports a dying task still owns.
//!
//! On bare metal the current-task cell is maintained by the scheduler via
//! [`set_current_task`]. On hosted builds every OS thread is its own task
//! and gets an identity assigned on first use, which is what the
//! integration tests rely on.

use crate::log_debug;
use alloc::collections::BTreeSet;
use core::sync::atomic::{AtomicI32, Ordering};
use spin::Mutex;

/// Task identifier type
pub type TaskId = i32;

/// Identity of the kernel's own bootstrap task
pub const KERNEL_TASK: TaskId = 0;

#[cfg(target_os = "none")]
mod current {
    use super::*;

    /// Current task, maintained by the scheduler on context switch
    static CURRENT_TASK: AtomicI32 = AtomicI32::new(KERNEL_TASK);

    /// Identity of the currently running task
    pub fn current_task_id() -> TaskId {
        CURRENT_TASK.load(Ordering::Relaxed)
    }

    /// Scheduler hook: record the task now running on this CPU
    pub fn set_current_task(task: TaskId) {
        CURRENT_TASK.store(task, Ordering::Relaxed);
    }

    /// Give up the CPU while waiting for another task to make progress
    pub fn yield_now() {
        core::hint::spin_loop();
    }
}

#[cfg(not(target_os = "none"))]
mod current {
    use super::*;
    use core::cell::Cell;

    /// Next identity handed to a thread that has none yet
    static NEXT_TASK_ID: AtomicI32 = AtomicI32::new(1);

    std::thread_local! {
        static THREAD_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
    }

    /// Identity of the currently running task
    ///
    /// Each OS thread is treated as a task and assigned a fresh identity
    /// the first time it asks.
    pub fn current_task_id() -> TaskId {
        THREAD_TASK.with(|cell| match cell.get() {
            Some(id) => id,
            None => {
                let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
                cell.set(Some(id));
                id
            }
        })
    }

    /// Override the calling thread's task identity
    pub fn set_current_task(task: TaskId) {
        THREAD_TASK.with(|cell| cell.set(Some(task)));
    }

    /// Give up the CPU while waiting for another task to make progress
    pub fn yield_now() {
        std::thread::yield_now();
    }
}

pub use current::{current_task_id, set_current_task, yield_now};

/// Tasks with a signal pending delivery
///
/// Interruptible semaphore waits consult this set; a real signal subsystem
/// would feed it, the tests poke it directly.
static PENDING_SIGNALS: Mutex<BTreeSet<TaskId>> = Mutex::new(BTreeSet::new());

/// Mark a signal pending for `task`, interrupting its blocking waits
pub fn post_interrupt(task: TaskId) {
    PENDING_SIGNALS.lock().insert(task);
}

/// Check whether `task` has a signal pending
pub fn interrupt_pending(task: TaskId) -> bool {
    PENDING_SIGNALS.lock().contains(&task)
}

/// Consume a pending signal for `task`
pub fn clear_interrupt(task: TaskId) {
    PENDING_SIGNALS.lock().remove(&task);
}

/// Task teardown hook
///
/// Reclaims every port the dying task still owns and consumes any pending
/// signal. Returns the number of ports deleted.
pub fn exit_cleanup(task: TaskId) -> usize {
    clear_interrupt(task);

    let deleted = match crate::port::delete_owned_ports(task) {
        Ok(n) => n,
        Err(_) => 0,
    };

    if deleted > 0 {
        log_debug!("task", "task {} exit reclaimed {} ports", task, deleted);
    }

    deleted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_identity_is_stable() {
        let a = current_task_id();
        let b = current_task_id();
        assert_eq!(a, b);
        assert!(a >= 1);
    }

    #[test]
    fn threads_get_distinct_identities() {
        let here = current_task_id();
        let there = std::thread::spawn(current_task_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn signal_post_and_clear() {
        let me = current_task_id();
        assert!(!interrupt_pending(me));
        post_interrupt(me);
        assert!(interrupt_pending(me));
        clear_interrupt(me);
        assert!(!interrupt_pending(me));
    }
}
