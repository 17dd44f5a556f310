//! The process-wide connection count and its admission policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks live relays against a global cap. Mutated only from accept
/// callbacks (`try_admit`) and relay teardown (`release`); never goes
/// negative.
pub struct Admission {
    count: AtomicUsize,
    max: usize,
}

impl Admission {
    pub fn new(max: usize) -> Self {
        Self { count: AtomicUsize::new(0), max }
    }

    /// Attempt to admit one more connection. Returns `false` if the cap is
    /// already reached, in which case the caller must not construct a relay.
    pub fn try_admit(&self) -> bool {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max).then_some(current + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "admission count released more times than admitted");
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

/// Holds one admitted slot for the lifetime of a relay. Releases it exactly
/// once on drop, whether the relay exits normally, errors, or is cancelled.
pub struct AdmissionGuard {
    admission: Arc<Admission>,
}

impl AdmissionGuard {
    pub fn new(admission: Arc<Admission>) -> Self {
        Self { admission }
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.admission.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_then_saturates() {
        let admission = Admission::new(2);
        assert!(admission.try_admit());
        assert!(admission.try_admit());
        assert!(!admission.try_admit());
        assert_eq!(admission.current(), 2);
    }

    #[test]
    fn guard_release_frees_a_slot() {
        let admission = Arc::new(Admission::new(1));
        assert!(admission.try_admit());
        let guard = AdmissionGuard::new(admission.clone());
        assert!(!admission.try_admit());
        drop(guard);
        assert_eq!(admission.current(), 0);
        assert!(admission.try_admit());
    }

    #[test]
    fn never_goes_negative_across_many_cycles() {
        let admission = Arc::new(Admission::new(300));
        for _ in 0..1000 {
            assert!(admission.try_admit());
            let guard = AdmissionGuard::new(admission.clone());
            drop(guard);
        }
        assert_eq!(admission.current(), 0);
    }
}
