/// Monotonic time source for blocking deadlines
/// Backed by the TSC on x86_64; semaphore timeouts only need a monotonic
/// microsecond counter, not wall-clock accuracy.

/// Approximate TSC frequency (2.4 GHz typical)
/// This is a rough estimate; real implementation should use calibrated value
#[cfg(target_arch = "x86_64")]
const TSC_PER_US: u64 = 2_400;

/// Current monotonic time in microseconds
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn now_us() -> u64 {
    let tsc = unsafe { core::arch::x86_64::_rdtsc() };
    tsc / TSC_PER_US
}

/// Current monotonic time in microseconds
///
/// Fallback for architectures without a cycle counter binding: a counter
/// bumped on every read. Deadlines still expire, just with no relation to
/// real time.
#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn now_us() -> u64 {
    use core::sync::atomic::{AtomicU64, Ordering};
    static FAKE_US: AtomicU64 = AtomicU64::new(0);
    FAKE_US.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic() {
        let a = now_us();
        let b = now_us();
        assert!(b >= a);
    }
}
