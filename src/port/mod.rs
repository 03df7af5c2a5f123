//! Named message ports
//! Bounded many-writer/many-reader FIFO queues of `(code, payload)` messages
//!
//! # SMP Safety and Lock Ordering
//!
//! The port table uses a two-level locking strategy:
//!
//! 1. **Table allocation lock**: guards slot allocation, name lookup and
//!    iteration (rarely held)
//! 2. **Per-slot locks**: guard individual port state (frequently held)
//!
//! ## Lock Ordering Rules
//!
//! - The table lock must be acquired before any per-slot lock
//! - Never hold more than one per-slot lock at a time
//! - A port-slot lock may be held while taking a semaphore-slot lock for a
//!   non-blocking operation (`get_count`, `release`); never the reverse
//! - No spin lock is held across a semaphore acquire, an allocation, or a
//!   user-memory copy
//!
//! ## Blocking protocol
//!
//! Writers and readers block on counting semaphores, never under a lock:
//! resolve the port, snapshot the semaphore handle under the slot lock,
//! drop the lock, acquire the semaphore, then retake the lock and
//! re-verify the port identity before touching the ring. The re-check
//! matters because a port can be deleted and its slot recycled while the
//! caller is parked; a recycled slot carries a fresh ID, so the stale
//! caller fails the check and reports `Deleted` instead of operating on
//! the new occupant's queue.

use crate::config::{MAX_OS_NAME_LEN, MAX_PORTS, MAX_QUEUE_LENGTH, PORT_MAX_MESSAGE_SIZE};
use crate::mm::cbuf::CBuf;
use crate::mm::usercopy::UserPtr;
use crate::sync::sem::{self, SemError, SemFlags, SemId};
use crate::sync::spin::IrqSpinLock;
use crate::task::{self, TaskId};
use crate::{debug, kprintln, log_debug, log_error};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Once;

pub mod user;

/// Port handle type
pub type PortId = i32;

/// Port error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// Port table not initialized yet
    NotActive,
    /// Handle does not name a live port
    InvalidHandle,
    /// Argument out of range (queue depth, message size, ...)
    InvalidArgs,
    /// Allocation failed
    NoMemory,
    /// Every slot in the port table is occupied
    OutOfSlots,
    /// Port no longer accepts writes
    Closed,
    /// Port was deleted (possibly while the caller was blocked on it)
    Deleted,
    /// Wait deadline expired (or queue full/empty with a zero timeout)
    TimedOut,
    /// A pending signal interrupted the wait
    Interrupted,
    /// Iteration exhausted the table
    NotFound,
    /// A user pointer resolved into the kernel address range
    BadUserMemory,
}

/// Result type for port operations
pub type PortResult<T> = Result<T, PortError>;

bitflags! {
    /// Flags accepted by the `_etc` operation variants
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortFlags: u32 {
        /// Honour the timeout argument; zero means try once
        const TIMEOUT = 1 << 0;
        /// Let a pending signal abort a blocked operation
        const INTERRUPTABLE = 1 << 1;
        /// The payload endpoint is a user address. The copy path itself is
        /// selected by the `SourceBuffer`/`SinkBuffer` variant; this bit
        /// must agree with it and exists for the syscall ABI, where flags
        /// are all a caller can pass.
        const USE_USER_MEMCPY = 1 << 2;
    }
}

/// Metadata snapshot of one port, as returned by [`get_info`]
#[derive(Debug, Clone, Copy)]
pub struct PortInfo {
    /// Port handle
    pub id: PortId,
    /// Owning task
    pub owner: TaskId,
    /// NUL-terminated name bytes
    pub name: [u8; MAX_OS_NAME_LEN],
    /// Queue depth fixed at creation
    pub capacity: i32,
    /// Messages currently queued
    pub queue_count: i32,
    /// Successful writes since creation
    pub total_count: i32,
}

impl PortInfo {
    /// The name as a string slice (up to the first NUL)
    pub fn name_str(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }
}

/// Where a write takes its payload from
pub enum SourceBuffer<'a> {
    /// A kernel slice
    Kernel(&'a [u8]),
    /// `n` bytes at a user address
    User(UserPtr, usize),
}

impl SourceBuffer<'_> {
    fn len(&self) -> usize {
        match self {
            SourceBuffer::Kernel(data) => data.len(),
            SourceBuffer::User(_, n) => *n,
        }
    }
}

/// Where a read delivers its payload
pub enum SinkBuffer<'a> {
    /// A kernel slice
    Kernel(&'a mut [u8]),
    /// A user buffer of `n` bytes
    User(UserPtr, usize),
}

impl SinkBuffer<'_> {
    fn len(&self) -> usize {
        match self {
            SinkBuffer::Kernel(buf) => buf.len(),
            SinkBuffer::User(_, n) => *n,
        }
    }
}

/// One cell of a port's ring buffer
///
/// `payload` exclusively owns the chained buffer while the message is
/// queued; `take()` on dequeue and the drop of the ring on deletion are the
/// only ways it leaves, so a payload is freed exactly once.
struct MessageSlot {
    code: i32,
    payload: Option<CBuf>,
    len: usize,
}

impl MessageSlot {
    const fn empty() -> Self {
        MessageSlot {
            code: 0,
            payload: None,
            len: 0,
        }
    }
}

/// A live port occupying a table slot
struct LivePort {
    id: PortId,
    owner: TaskId,
    name: String,
    capacity: usize,
    head: usize,
    tail: usize,
    total_count: i32,
    closed: bool,
    read_sem: SemId,
    write_sem: SemId,
    queue: Box<[MessageSlot]>,
}

/// Slot allocation state, guarded separately from the slots themselves
struct PortAlloc {
    next_id: i32,
}

struct PortTable {
    slots: Box<[IrqSpinLock<Option<LivePort>>]>,
    alloc: IrqSpinLock<PortAlloc>,
}

/// Port subsystem counters for observability and debugging
///
/// All counters use relaxed ordering; they are statistics, not
/// synchronization.
pub struct PortMetrics {
    pub creates: AtomicUsize,
    pub deletes: AtomicUsize,
    pub writes: AtomicUsize,
    pub reads: AtomicUsize,
    pub timeouts: AtomicUsize,
}

impl PortMetrics {
    const fn new() -> Self {
        const ZERO: AtomicUsize = AtomicUsize::new(0);
        PortMetrics {
            creates: ZERO,
            deletes: ZERO,
            writes: ZERO,
            reads: ZERO,
            timeouts: ZERO,
        }
    }
}

/// Global port subsystem metrics
pub static METRICS: PortMetrics = PortMetrics::new();

/// Global port table, allocated once at bring-up and never freed
static PORT_TABLE: Once<PortTable> = Once::new();

/// Initialize the port subsystem
///
/// Allocates the port table, brings up the semaphore table it depends on,
/// and registers the `ports`/`port` debugger commands. Idempotent; every
/// public operation fails with `NotActive` until this has run once.
pub fn init() {
    sem::init();

    PORT_TABLE.call_once(|| {
        let mut slots = Vec::with_capacity(MAX_PORTS);
        for _ in 0..MAX_PORTS {
            slots.push(IrqSpinLock::new(None));
        }

        debug::add_command("ports", "Dump a list of all active ports", cmd_dump_port_list);
        debug::add_command("port", "Dump info about a particular port", cmd_dump_port_info);

        log_debug!("port", "port table ready ({} slots)", MAX_PORTS);

        PortTable {
            slots: slots.into_boxed_slice(),
            alloc: IrqSpinLock::new(PortAlloc { next_id: 0 }),
        }
    });
}

fn table() -> PortResult<&'static PortTable> {
    PORT_TABLE.get().ok_or(PortError::NotActive)
}

/// Run `f` on the live port named by `id`, under its slot lock
///
/// `missing` is returned when the slot is free or occupied by a different
/// port: `InvalidHandle` on first resolution, `Deleted` when re-entering
/// after a semaphore acquire (the handle was valid when the wait started).
fn with_port<T>(
    id: PortId,
    missing: PortError,
    f: impl FnOnce(&mut LivePort) -> PortResult<T>,
) -> PortResult<T> {
    let table = table()?;
    if id < 0 {
        return Err(PortError::InvalidHandle);
    }

    let mut state = table.slots[id as usize % MAX_PORTS].lock();
    match state.as_mut() {
        Some(port) if port.id == id => f(port),
        _ => Err(missing),
    }
}

/// [`with_port`] for first resolution of a caller-supplied handle
fn with_live_port<T>(id: PortId, f: impl FnOnce(&mut LivePort) -> PortResult<T>) -> PortResult<T> {
    with_port(id, PortError::InvalidHandle, f)
}

/// Translate a semaphore wait outcome into the port-level taxonomy
///
/// A handle that went invalid means the port (and its semaphores) was
/// deleted between the snapshot and the acquire.
fn map_sem_err(err: SemError) -> PortError {
    match err {
        SemError::Deleted | SemError::InvalidHandle | SemError::NotActive => PortError::Deleted,
        SemError::TimedOut => PortError::TimedOut,
        SemError::Interrupted => PortError::Interrupted,
        SemError::InvalidArgs | SemError::OutOfSlots => PortError::InvalidArgs,
    }
}

fn sem_flags(flags: PortFlags) -> SemFlags {
    let mut out = SemFlags::empty();
    if flags.contains(PortFlags::TIMEOUT) {
        out |= SemFlags::TIMEOUT;
    }
    if flags.contains(PortFlags::INTERRUPTABLE) {
        out |= SemFlags::INTERRUPTABLE;
    }
    out
}

/// Truncate a name to the bounded length, respecting char boundaries
fn bound_name(name: &str) -> String {
    let mut bounded = String::from(name);
    if bounded.len() > MAX_OS_NAME_LEN - 1 {
        let mut cut = MAX_OS_NAME_LEN - 1;
        while !bounded.is_char_boundary(cut) {
            cut -= 1;
        }
        bounded.truncate(cut);
    }
    bounded
}

/// Fill an info snapshot from a port; caller holds the slot lock
fn fill_info(port: &LivePort) -> PortInfo {
    let mut name = [0u8; MAX_OS_NAME_LEN];
    let n = port.name.len().min(MAX_OS_NAME_LEN - 1);
    name[..n].copy_from_slice(&port.name.as_bytes()[..n]);

    // The semaphore count is the queue depth; clamp so a count made
    // negative by parked waiters is never exposed.
    let queue_count = sem::get_count(port.read_sem).unwrap_or(0).max(0);

    PortInfo {
        id: port.id,
        owner: port.owner,
        name,
        capacity: port.capacity as i32,
        queue_count,
        total_count: port.total_count,
    }
}

/// Create a port with the given queue depth
///
/// A `None` name creates the port as "unnamed port". Returns the new
/// port's handle.
///
/// # Errors
/// - `NotActive` before [`init`]
/// - `InvalidArgs` if `queue_length` is outside `[1, MAX_QUEUE_LENGTH]`
/// - `NoMemory` if the ring or either semaphore cannot be allocated
/// - `OutOfSlots` if every table slot is occupied
pub fn create(queue_length: i32, name: Option<&str>) -> PortResult<PortId> {
    let table = table()?;

    if queue_length < 1 || queue_length as usize > MAX_QUEUE_LENGTH {
        return Err(PortError::InvalidArgs);
    }
    let capacity = queue_length as usize;
    let bounded = bound_name(name.unwrap_or("unnamed port"));

    // Allocate the ring before taking any lock
    let mut queue = Vec::new();
    if queue.try_reserve_exact(capacity).is_err() {
        return Err(PortError::NoMemory);
    }
    for _ in 0..capacity {
        queue.push(MessageSlot::empty());
    }

    // read_sem counts queued messages, write_sem counts free ring cells
    let read_sem = match sem::create(0, &bounded, -1) {
        Ok(s) => s,
        Err(_) => return Err(PortError::NoMemory),
    };
    let write_sem = match sem::create(queue_length, &bounded, -1) {
        Ok(s) => s,
        Err(_) => {
            let _ = sem::delete(read_sem);
            return Err(PortError::NoMemory);
        }
    };

    let owner = task::current_task_id();

    let mut alloc = table.alloc.lock();
    for (i, slot) in table.slots.iter().enumerate() {
        let mut state = slot.lock();
        if state.is_some() {
            continue;
        }

        // Advance next_id so the minted id stays congruent to the slot
        // index; a recycled slot thereby never reissues an old id.
        let rem = alloc.next_id.rem_euclid(MAX_PORTS as i32) as usize;
        if i >= rem {
            alloc.next_id += (i - rem) as i32;
        } else {
            alloc.next_id += (MAX_PORTS - (rem - i)) as i32;
        }
        let id = alloc.next_id;
        alloc.next_id += 1;

        *state = Some(LivePort {
            id,
            owner,
            name: bounded,
            capacity,
            head: 0,
            tail: 0,
            total_count: 0,
            closed: false,
            read_sem,
            write_sem,
            queue: queue.into_boxed_slice(),
        });
        drop(state);
        drop(alloc);

        METRICS.creates.fetch_add(1, Ordering::Relaxed);
        log_debug!("port", "created port {} depth {} for task {}", id, capacity, owner);
        return Ok(id);
    }
    drop(alloc);

    // Not enough slots; give back everything allocated so far
    let _ = sem::delete(read_sem);
    let _ = sem::delete(write_sem);
    log_error!("port", "create: out of port slots");
    Err(PortError::OutOfSlots)
}

/// Close a port: further writes are rejected, reads drain the queue
///
/// Idempotent; queued messages and blocked readers are not disturbed.
pub fn close(id: PortId) -> PortResult<()> {
    with_live_port(id, |port| {
        port.closed = true;
        Ok(())
    })
}

/// Delete a port, waking every task blocked on it with `Deleted`
///
/// Queued payloads, the ring and the name are freed; destroying the two
/// semaphores is what wakes the blocked parties.
pub fn delete(id: PortId) -> PortResult<()> {
    let table = table()?;
    if id < 0 {
        return Err(PortError::InvalidHandle);
    }

    // Detach the port under the slot lock; all freeing happens after
    let freed = {
        let mut state = table.slots[id as usize % MAX_PORTS].lock();
        let live = matches!(state.as_ref(), Some(port) if port.id == id);
        if !live {
            return Err(PortError::InvalidHandle);
        }
        state.take()
    };
    let port = match freed {
        Some(port) => port,
        None => return Err(PortError::InvalidHandle),
    };

    let read_sem = port.read_sem;
    let write_sem = port.write_sem;

    // Frees every payload still queued, the ring and the name
    drop(port);

    // Wake the tasks blocked on this port; they observe SemaphoreDeleted
    // and report the port as Deleted
    let _ = sem::delete(read_sem);
    let _ = sem::delete(write_sem);

    METRICS.deletes.fetch_add(1, Ordering::Relaxed);
    log_debug!("port", "deleted port {}", id);
    Ok(())
}

/// Find a port by exact name
///
/// First match in slot order wins.
pub fn find(name: &str) -> PortResult<PortId> {
    let table = table()?;

    // The table lock serialises the scan; each slot lock makes the name
    // read safe against a concurrent delete.
    let _alloc = table.alloc.lock();
    for slot in table.slots.iter() {
        let state = slot.lock();
        if let Some(port) = state.as_ref() {
            if port.name == name {
                return Ok(port.id);
            }
        }
    }
    Err(PortError::InvalidHandle)
}

/// Snapshot a port's metadata
pub fn get_info(id: PortId) -> PortResult<PortInfo> {
    with_live_port(id, |port| Ok(fill_info(port)))
}

/// Find the next port owned by `owner`, scanning forward from `cookie`
///
/// Returns the snapshot and the advanced cookie to pass on the next call;
/// start with a cookie of 0. `NotFound` once the scan exhausts the table.
pub fn get_next_info(owner: TaskId, cookie: u32) -> PortResult<(PortInfo, u32)> {
    let table = table()?;

    let mut slot_idx = cookie as usize;
    if slot_idx >= MAX_PORTS {
        return Err(PortError::InvalidHandle);
    }

    let _alloc = table.alloc.lock();
    while slot_idx < MAX_PORTS {
        let state = table.slots[slot_idx].lock();
        if let Some(port) = state.as_ref() {
            if port.owner == owner {
                return Ok((fill_info(port), slot_idx as u32 + 1));
            }
        }
        slot_idx += 1;
    }
    Err(PortError::NotFound)
}

/// Length of the next readable message, without consuming it
pub fn buffer_size(id: PortId) -> PortResult<usize> {
    buffer_size_etc(id, PortFlags::empty(), 0)
}

/// Length of the next readable message, blocking until one is queued
///
/// The returned length is only meaningful if the same task immediately
/// performs the matching read; with other readers racing, the message it
/// describes may be gone by then.
pub fn buffer_size_etc(id: PortId, flags: PortFlags, timeout_us: u64) -> PortResult<usize> {
    // Snapshot the semaphore handle, then wait with no lock held. Message
    // operations report a missing port as Deleted, not InvalidHandle: to a
    // messaging peer a recycled slot and a deleted port are the same event.
    let read_sem = with_port(id, PortError::Deleted, |port| Ok(port.read_sem))?;

    sem::acquire_etc(read_sem, 1, sem_flags(flags), timeout_us).map_err(map_sem_err)?;

    with_port(id, PortError::Deleted, |port| {
        let t = port.tail;
        assert!(
            t < port.capacity,
            "port {}: tail {} out of range {}",
            port.id,
            t,
            port.capacity
        );
        let len = port.queue[t].len;

        // The message stays queued: put the token back
        let _ = sem::release(port.read_sem, 1);
        Ok(len)
    })
}

/// Number of messages currently queued on a port
pub fn count(id: PortId) -> PortResult<i32> {
    with_live_port(id, |port| {
        // do not return negative numbers
        Ok(sem::get_count(port.read_sem).unwrap_or(0).max(0))
    })
}

/// Read the next message into a kernel buffer, blocking until one arrives
///
/// Returns the message code and the number of payload bytes copied.
pub fn read(id: PortId, buffer: &mut [u8]) -> PortResult<(i32, usize)> {
    read_etc(id, SinkBuffer::Kernel(buffer), PortFlags::empty(), 0)
}

/// Read the next message with timeout and interruption control
///
/// Dequeues the message at the ring tail and copies up to the sink's size
/// of its payload. Returns the message code and the byte count copied,
/// which is `min(sink size, payload length)`.
pub fn read_etc(id: PortId, buffer: SinkBuffer, flags: PortFlags, timeout_us: u64) -> PortResult<(i32, usize)> {
    debug_assert_eq!(
        flags.contains(PortFlags::USE_USER_MEMCPY),
        matches!(&buffer, SinkBuffer::User(..)),
        "USE_USER_MEMCPY flag disagrees with the sink buffer variant"
    );

    // Snapshot the semaphore handle, then wait for a message with no lock
    // held. As in buffer_size_etc, a missing port reads as Deleted here.
    let read_sem = with_port(id, PortError::Deleted, |port| Ok(port.read_sem))?;

    if let Err(err) = sem::acquire_etc(read_sem, 1, sem_flags(flags), timeout_us) {
        if err == SemError::TimedOut {
            METRICS.timeouts.fetch_add(1, Ordering::Relaxed);
        }
        return Err(map_sem_err(err));
    }

    // Dequeue under the slot lock, re-verifying the identity: the port may
    // have been deleted and the slot recycled while we were parked.
    let (code, payload, len, write_sem) = with_port(id, PortError::Deleted, |port| {
        let t = port.tail;
        assert!(
            t < port.capacity,
            "port {}: tail {} out of range {}",
            port.id,
            t,
            port.capacity
        );
        port.tail = (port.tail + 1) % port.capacity;

        let msg = &mut port.queue[t];
        let payload = msg.payload.take();
        Ok((msg.code, payload, msg.len, port.write_sem))
    })?;

    // Copy out with no lock held
    let to_copy = buffer.len().min(len);
    let mut copy_failed = false;
    if to_copy > 0 {
        if let Some(cbuf) = payload.as_ref() {
            match buffer {
                SinkBuffer::Kernel(buf) => cbuf.copy_to_kernel(0, &mut buf[..to_copy]),
                SinkBuffer::User(ptr, _) => {
                    copy_failed = unsafe { cbuf.copy_to_user(0, ptr, to_copy) }.is_err();
                }
            }
        }
    }

    // Free the payload and make one ring cell available to writers again.
    // This happens even when the copy-out faulted: the message is consumed
    // and the port stays intact for other readers.
    drop(payload);
    let _ = sem::release(write_sem, 1);

    if copy_failed {
        return Err(PortError::BadUserMemory);
    }

    METRICS.reads.fetch_add(1, Ordering::Relaxed);
    Ok((code, to_copy))
}

/// Write a message from a kernel buffer, blocking while the queue is full
pub fn write(id: PortId, code: i32, data: &[u8]) -> PortResult<()> {
    write_etc(id, code, SourceBuffer::Kernel(data), PortFlags::empty(), 0)
}

/// Write a message with timeout and interruption control
///
/// Claims a free ring cell (blocking per `flags`), stages the payload in a
/// chained buffer, then publishes it at the ring head and wakes a reader.
pub fn write_etc(
    id: PortId,
    code: i32,
    data: SourceBuffer,
    flags: PortFlags,
    timeout_us: u64,
) -> PortResult<()> {
    debug_assert_eq!(
        flags.contains(PortFlags::USE_USER_MEMCPY),
        matches!(&data, SourceBuffer::User(..)),
        "USE_USER_MEMCPY flag disagrees with the source buffer variant"
    );

    let len = data.len();
    if len > PORT_MAX_MESSAGE_SIZE {
        return Err(PortError::InvalidArgs);
    }

    // Reject closed ports and snapshot the semaphore handle. A missing
    // port reads as Deleted here, as in the other message operations.
    let write_sem = with_port(id, PortError::Deleted, |port| {
        if port.closed {
            return Err(PortError::Closed);
        }
        Ok(port.write_sem)
    })?;

    // Wait for a free ring cell with no lock held
    if let Err(err) = sem::acquire_etc(write_sem, 1, sem_flags(flags), timeout_us) {
        if err == SemError::TimedOut {
            METRICS.timeouts.fetch_add(1, Ordering::Relaxed);
        }
        return Err(map_sem_err(err));
    }

    // Stage the payload outside any lock. On failure the claimed write
    // token is not returned: the cell stays accounted to this aborted
    // producer until the port is deleted.
    let payload = if len > 0 {
        let mut cbuf = match CBuf::new(len) {
            Some(cbuf) => cbuf,
            None => return Err(PortError::NoMemory),
        };
        match data {
            SourceBuffer::Kernel(src) => cbuf.copy_from_kernel(0, src),
            SourceBuffer::User(ptr, n) => {
                if unsafe { cbuf.copy_from_user(0, ptr, n) }.is_err() {
                    return Err(PortError::BadUserMemory);
                }
            }
        }
        Some(cbuf)
    } else {
        None
    };

    // Publish at the ring head, re-verifying the identity as in read
    let read_sem = with_port(id, PortError::Deleted, |port| {
        let h = port.head;
        assert!(
            h < port.capacity,
            "port {}: head {} out of range {}",
            port.id,
            h,
            port.capacity
        );
        debug_assert!(port.queue[h].payload.is_none());

        port.queue[h].code = code;
        port.queue[h].payload = payload;
        port.queue[h].len = len;
        port.head = (port.head + 1) % port.capacity;
        port.total_count = port.total_count.wrapping_add(1);
        Ok(port.read_sem)
    })?;

    // Hand the message to a reader (may wake and reschedule one)
    let _ = sem::release(read_sem, 1);

    METRICS.writes.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

/// Reassign a port to another owner task
pub fn set_owner(id: PortId, owner: TaskId) -> PortResult<()> {
    with_live_port(id, |port| {
        port.owner = owner;
        Ok(())
    })
}

/// Delete every port owned by `owner`; returns how many were deleted
///
/// Used by task teardown. The table lock is dropped around each delete:
/// delete takes the slot lock itself and does unbounded freeing work.
pub fn delete_owned_ports(owner: TaskId) -> PortResult<usize> {
    let table = table()?;
    let mut count = 0;

    let mut alloc = table.alloc.lock();
    for i in 0..MAX_PORTS {
        let id = {
            let state = table.slots[i].lock();
            match state.as_ref() {
                Some(port) if port.owner == owner => Some(port.id),
                _ => None,
            }
        };

        if let Some(id) = id {
            drop(alloc);
            if delete(id).is_ok() {
                count += 1;
            }
            alloc = table.alloc.lock();
        }
    }
    drop(alloc);

    Ok(count)
}

/// `ports` debugger command: list every live port
fn cmd_dump_port_list(_args: &[&str]) {
    let table = match table() {
        Ok(t) => t,
        Err(_) => {
            kprintln!("port table not active");
            return;
        }
    };

    for slot in table.slots.iter() {
        let state = slot.lock();
        if let Some(port) = state.as_ref() {
            kprintln!(
                "id: {:#x}\tname: '{}'\tdepth: {}",
                port.id,
                port.name,
                port.capacity
            );
        }
    }
}

/// Print one port's fields; caller holds the slot lock
fn dump_one_port(port: &LivePort) {
    kprintln!("PORT: {:#x}", port.id);
    kprintln!("name:  '{}'", port.name);
    kprintln!("owner: {:#x}", port.owner);
    kprintln!("cap:   {}", port.capacity);
    kprintln!("head:  {}", port.head);
    kprintln!("tail:  {}", port.tail);
    kprintln!("read_sem:  {}", sem::get_count(port.read_sem).unwrap_or(-1));
    kprintln!("write_sem: {}", sem::get_count(port.write_sem).unwrap_or(-1));
}

/// `port` debugger command: dump one port by id or name
fn cmd_dump_port_info(args: &[&str]) {
    if args.len() < 2 {
        kprintln!("port: not enough arguments");
        return;
    }
    let table = match table() {
        Ok(t) => t,
        Err(_) => {
            kprintln!("port table not active");
            return;
        }
    };

    // A numeric argument (decimal or 0x hex) is a port id
    let parsed = if let Some(hex) = args[1].strip_prefix("0x") {
        i32::from_str_radix(hex, 16).ok()
    } else {
        args[1].parse::<i32>().ok()
    };

    if let Some(id) = parsed {
        if id >= 0 {
            let state = table.slots[id as usize % MAX_PORTS].lock();
            match state.as_ref() {
                Some(port) if port.id == id => dump_one_port(port),
                _ => kprintln!("port {:#x} doesn't exist!", id),
            }
            return;
        }
    }

    // Otherwise match by name
    for slot in table.slots.iter() {
        let state = slot.lock();
        if let Some(port) = state.as_ref() {
            if port.name == args[1] {
                dump_one_port(port);
                return;
            }
        }
    }
    kprintln!("port '{}' doesn't exist!", args[1]);
}
