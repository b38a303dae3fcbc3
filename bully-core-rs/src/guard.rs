//! Per-process gate allowing at most one election attempt in flight.

use parking_lot::Mutex;

/// The `electing` flag. Every read-modify-write goes through the mutex.
#[derive(Debug, Default)]
pub struct ElectionGuard {
    electing: Mutex<bool>,
}

impl ElectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag if it is clear.
    ///
    /// Returns `true` when the caller now owns the right to run the single
    /// election task, `false` when one is already in flight.
    pub fn try_set_electing(&self) -> bool {
        let mut electing = self.electing.lock();
        if *electing {
            return false;
        }
        *electing = true;
        true
    }

    /// Release the gate so a later solicitation can start another attempt
    pub fn clear_electing(&self) {
        *self.electing.lock() = false;
    }

    pub fn is_electing(&self) -> bool {
        *self.electing.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_cleared() {
        let guard = ElectionGuard::new();
        assert!(!guard.is_electing());

        assert!(guard.try_set_electing());
        assert!(guard.is_electing());
        assert!(!guard.try_set_electing());

        guard.clear_electing();
        assert!(!guard.is_electing());
        assert!(guard.try_set_electing());
    }

    #[test]
    fn test_clear_is_unconditional() {
        let guard = ElectionGuard::new();
        guard.clear_electing();
        guard.clear_electing();
        assert!(guard.try_set_electing());
    }
}
