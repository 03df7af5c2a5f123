/// Spinlock primitives for short critical sections
///
/// Two variants are provided: a plain `SpinLock` for data only touched from
/// task context, and an `IrqSpinLock` that additionally masks interrupts for
/// the duration of the hold so an interrupt handler taking the same lock
/// cannot deadlock against a preempted holder.
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A mutual exclusion primitive useful for protecting shared data
///
/// Contending CPUs spin with exponential backoff to reduce bus contention.
/// The lock is released when the guard goes out of scope. Holders must not
/// block: no semaphore acquires, no allocation, no user-memory copies under
/// a spinlock.
pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

/// A guard that provides mutable access to the data protected by a SpinLock
///
/// When the guard is dropped, the lock is released.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

unsafe impl<T: Send> Sync for SpinLock<T> {}
unsafe impl<T: Send> Send for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new spinlock wrapping the supplied data
    pub const fn new(data: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires the lock, spinning until it is available
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let mut backoff = 1;
        const MAX_BACKOFF: usize = 256;

        loop {
            if self
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinLockGuard { lock: self };
            }

            // Lock is held by another core, spin with exponential backoff
            for _ in 0..backoff {
                core::hint::spin_loop();
            }

            if backoff < MAX_BACKOFF {
                backoff *= 2;
            }
        }
    }

    /// Attempts to acquire the lock without spinning
    ///
    /// Returns `None` if the lock is currently held.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Consumes the lock and returns the underlying data
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.try_lock() {
            Some(guard) => write!(f, "SpinLock {{ data: {:?} }}", &*guard),
            None => write!(f, "SpinLock {{ <locked> }}"),
        }
    }
}

/// An IRQ-safe spinlock that masks interrupts while the lock is held
///
/// Saves the local interrupt-enable state, disables interrupts, then takes
/// the inner lock; dropping the guard releases the lock and restores the
/// saved state. Required for any lock shared with interrupt context.
pub struct IrqSpinLock<T> {
    inner: SpinLock<T>,
}

/// A guard that provides mutable access to data protected by an IrqSpinLock
///
/// When the guard is dropped, the lock is released and the saved interrupt
/// state is restored.
pub struct IrqSpinLockGuard<'a, T> {
    // ManuallyDrop so Drop can release the lock before the interrupt state
    // comes back; the default order would re-enable interrupts while the
    // lock is still held.
    guard: core::mem::ManuallyDrop<SpinLockGuard<'a, T>>,
    irq_was_enabled: bool,
}

unsafe impl<T: Send> Sync for IrqSpinLock<T> {}
unsafe impl<T: Send> Send for IrqSpinLock<T> {}

impl<T> IrqSpinLock<T> {
    /// Creates a new IRQ-safe spinlock wrapping the supplied data
    pub const fn new(data: T) -> Self {
        IrqSpinLock {
            inner: SpinLock::new(data),
        }
    }

    /// Acquires the lock with interrupts masked
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let irq_was_enabled = local_irq_save();
        let guard = self.inner.lock();

        IrqSpinLockGuard {
            guard: core::mem::ManuallyDrop::new(guard),
            irq_was_enabled,
        }
    }

    /// Attempts to acquire the lock without spinning
    ///
    /// On failure the interrupt state is restored before returning.
    pub fn try_lock(&self) -> Option<IrqSpinLockGuard<'_, T>> {
        let irq_was_enabled = local_irq_save();

        match self.inner.try_lock() {
            Some(guard) => Some(IrqSpinLockGuard {
                guard: core::mem::ManuallyDrop::new(guard),
                irq_was_enabled,
            }),
            None => {
                local_irq_restore(irq_was_enabled);
                None
            }
        }
    }

    /// Consumes the lock and returns the underlying data
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Release the lock first, then restore the interrupt state.
        unsafe { core::mem::ManuallyDrop::drop(&mut self.guard) };
        local_irq_restore(self.irq_was_enabled);
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for IrqSpinLock<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.try_lock() {
            Some(guard) => write!(f, "IrqSpinLock {{ data: {:?} }}", &*guard),
            None => write!(f, "IrqSpinLock {{ <locked> }}"),
        }
    }
}

/// Disable local interrupt delivery, returning whether it was enabled
#[cfg(target_os = "none")]
#[inline]
fn local_irq_save() -> bool {
    let enabled = x86_64::instructions::interrupts::are_enabled();
    x86_64::instructions::interrupts::disable();
    enabled
}

/// Restore local interrupt delivery to a previously saved state
#[cfg(target_os = "none")]
#[inline]
fn local_irq_restore(was_enabled: bool) {
    if was_enabled {
        x86_64::instructions::interrupts::enable();
    }
}

/// Hosted builds have no interrupt flag to manage
#[cfg(not(target_os = "none"))]
#[inline]
fn local_irq_save() -> bool {
    false
}

#[cfg(not(target_os = "none"))]
#[inline]
fn local_irq_restore(_was_enabled: bool) {}
