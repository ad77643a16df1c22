use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::{MonitorError, MonitorResult};

/// Per-screen `loading` flag. While a guard is alive, further actions on the
/// same screen are refused with `MonitorError::Busy`.
#[derive(Clone, Default)]
pub struct BusyFlag {
    loading: Arc<AtomicBool>,
}

/// Clears the flag on drop, including when the action fails or panics.
pub struct BusyGuard {
    loading: Arc<AtomicBool>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> MonitorResult<BusyGuard> {
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MonitorError::Busy)?;
        Ok(BusyGuard {
            loading: self.loading.clone(),
        })
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.loading.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_while_held() {
        let flag = BusyFlag::new();
        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_loading());
        assert!(matches!(flag.try_acquire(), Err(MonitorError::Busy)));
        drop(guard);
        assert!(!flag.is_loading());
        assert!(flag.try_acquire().is_ok());
    }

    #[test]
    fn clones_share_the_flag() {
        let flag = BusyFlag::new();
        let other = flag.clone();
        let _guard = flag.try_acquire().unwrap();
        assert!(other.is_loading());
    }
}
