//! Counting semaphores
//!
//! The blocking primitive underneath the port queues. Semaphores live in a
//! fixed slot table; handles are monotonically minted integers congruent to
//! their slot index, so a handle to a deleted semaphore can never be
//! mistaken for the slot's next occupant.
//!
//! # Blocking model
//!
//! Waiters poll: each attempt takes the slot lock only long enough to test
//! and decrement the count, then spins/yields outside the lock until the
//! deadline. Deleting a semaphore frees its slot, so every parked waiter
//! fails the identity check on its next attempt and returns `Deleted` in
//! bounded time. No waiter ever sleeps under a spinlock.

use crate::config::{MAX_OS_NAME_LEN, MAX_SEMS};
use crate::log_debug;
use crate::sync::spin::IrqSpinLock;
use crate::task::{self, TaskId};
use crate::time;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use bitflags::bitflags;
use spin::Once;

/// Semaphore handle type
pub type SemId = i32;

/// Semaphore error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemError {
    /// Semaphore table not initialized yet
    NotActive,
    /// Handle does not name a live semaphore
    InvalidHandle,
    /// Count or flags argument out of range
    InvalidArgs,
    /// No free slot in the semaphore table
    OutOfSlots,
    /// Semaphore was deleted while the caller was waiting on it
    Deleted,
    /// Wait deadline expired (or count unavailable with a zero timeout)
    TimedOut,
    /// A pending signal interrupted the wait
    Interrupted,
}

/// Result type for semaphore operations
pub type SemResult<T> = Result<T, SemError>;

bitflags! {
    /// Flags accepted by [`acquire_etc`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SemFlags: u32 {
        /// Honour the timeout argument; zero means try once
        const TIMEOUT = 1 << 0;
        /// Let a pending signal abort the wait with `Interrupted`
        const INTERRUPTABLE = 1 << 1;
    }
}

/// A live semaphore occupying a table slot
///
/// Owner and name are carried for debugger output parity with ports; the
/// wait protocol itself only touches `id` and `count`.
struct LiveSem {
    id: SemId,
    count: i32,
    #[allow(dead_code)]
    owner: TaskId,
    #[allow(dead_code)]
    name: String,
}

/// Slot allocation state, guarded separately from the slots themselves
struct SemAlloc {
    next_id: i32,
}

struct SemTable {
    slots: Box<[IrqSpinLock<Option<LiveSem>>]>,
    alloc: IrqSpinLock<SemAlloc>,
}

static SEM_TABLE: Once<SemTable> = Once::new();

/// Initialize the semaphore table
///
/// Idempotent; all other operations fail with `NotActive` until this has
/// run once.
pub fn init() {
    SEM_TABLE.call_once(|| {
        let mut slots = Vec::with_capacity(MAX_SEMS);
        for _ in 0..MAX_SEMS {
            slots.push(IrqSpinLock::new(None));
        }

        log_debug!("sem", "semaphore table ready ({} slots)", MAX_SEMS);

        SemTable {
            slots: slots.into_boxed_slice(),
            alloc: IrqSpinLock::new(SemAlloc { next_id: 0 }),
        }
    });
}

fn table() -> SemResult<&'static SemTable> {
    SEM_TABLE.get().ok_or(SemError::NotActive)
}

/// Create a semaphore with the given initial count
///
/// The name is informational (debugger output) and truncated to the
/// bounded name length.
pub fn create(initial: i32, name: &str, owner: TaskId) -> SemResult<SemId> {
    let table = table()?;

    if initial < 0 {
        return Err(SemError::InvalidArgs);
    }

    let mut bounded = String::from(name);
    if bounded.len() > MAX_OS_NAME_LEN - 1 {
        // Back off to a char boundary; truncate would panic mid-char
        let mut cut = MAX_OS_NAME_LEN - 1;
        while !bounded.is_char_boundary(cut) {
            cut -= 1;
        }
        bounded.truncate(cut);
    }

    let mut alloc = table.alloc.lock();
    for (i, slot) in table.slots.iter().enumerate() {
        let mut state = slot.lock();
        if state.is_some() {
            continue;
        }

        // Mint an id congruent to the slot index
        let rem = alloc.next_id.rem_euclid(MAX_SEMS as i32) as usize;
        if i >= rem {
            alloc.next_id += (i - rem) as i32;
        } else {
            alloc.next_id += (MAX_SEMS - (rem - i)) as i32;
        }
        let id = alloc.next_id;
        alloc.next_id += 1;

        *state = Some(LiveSem {
            id,
            count: initial,
            owner,
            name: bounded,
        });
        return Ok(id);
    }

    Err(SemError::OutOfSlots)
}

/// Acquire `n` tokens, blocking without limit
pub fn acquire(handle: SemId, n: i32) -> SemResult<()> {
    acquire_etc(handle, n, SemFlags::empty(), 0)
}

/// Acquire `n` tokens with timeout and interruption control
///
/// Outcomes: `Ok` once the tokens are taken; `Deleted` when the semaphore
/// goes away mid-wait; `TimedOut` when `TIMEOUT` is set and the deadline
/// expires (immediately, for a zero timeout); `Interrupted` when
/// `INTERRUPTABLE` is set and the calling task has a signal pending.
pub fn acquire_etc(handle: SemId, n: i32, flags: SemFlags, timeout_us: u64) -> SemResult<()> {
    let table = table()?;

    if handle < 0 {
        return Err(SemError::InvalidHandle);
    }
    if n <= 0 {
        return Err(SemError::InvalidArgs);
    }

    let slot = &table.slots[handle as usize % MAX_SEMS];
    let deadline = if flags.contains(SemFlags::TIMEOUT) {
        Some(time::now_us().saturating_add(timeout_us))
    } else {
        None
    };

    let mut first_attempt = true;
    loop {
        {
            let mut state = slot.lock();
            match state.as_mut() {
                Some(sem) if sem.id == handle => {
                    if sem.count >= n {
                        sem.count -= n;
                        return Ok(());
                    }
                }
                // A stale handle on entry is the caller's bug; going stale
                // after we started waiting means deletion woke us.
                _ if first_attempt => return Err(SemError::InvalidHandle),
                _ => return Err(SemError::Deleted),
            }
        }
        first_attempt = false;

        if let Some(deadline) = deadline {
            if time::now_us() >= deadline {
                return Err(SemError::TimedOut);
            }
        }
        if flags.contains(SemFlags::INTERRUPTABLE)
            && task::interrupt_pending(task::current_task_id())
        {
            return Err(SemError::Interrupted);
        }

        task::yield_now();
    }
}

/// Release `n` tokens, admitting that many waiters
pub fn release(handle: SemId, n: i32) -> SemResult<()> {
    let table = table()?;

    if handle < 0 {
        return Err(SemError::InvalidHandle);
    }
    if n <= 0 {
        return Err(SemError::InvalidArgs);
    }

    let mut state = table.slots[handle as usize % MAX_SEMS].lock();
    match state.as_mut() {
        Some(sem) if sem.id == handle => {
            sem.count += n;
            Ok(())
        }
        _ => Err(SemError::InvalidHandle),
    }
}

/// Read the current token count
pub fn get_count(handle: SemId) -> SemResult<i32> {
    let table = table()?;

    if handle < 0 {
        return Err(SemError::InvalidHandle);
    }

    let state = table.slots[handle as usize % MAX_SEMS].lock();
    match state.as_ref() {
        Some(sem) if sem.id == handle => Ok(sem.count),
        _ => Err(SemError::InvalidHandle),
    }
}

/// Delete a semaphore, waking every blocked waiter with `Deleted`
pub fn delete(handle: SemId) -> SemResult<()> {
    let table = table()?;

    if handle < 0 {
        return Err(SemError::InvalidHandle);
    }

    let freed = {
        let mut state = table.slots[handle as usize % MAX_SEMS].lock();
        let live = matches!(state.as_ref(), Some(sem) if sem.id == handle);
        if !live {
            return Err(SemError::InvalidHandle);
        }
        state.take()
    };

    // Name storage is freed here, outside the slot lock
    drop(freed);
    Ok(())
}
