//! Re-entrancy guard for submit actions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};

/// Flag shared by every submission of one coordinator
#[derive(Debug, Default, Clone)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag, or fail with `ClientError::InFlight` if a submission
    /// already holds it
    pub fn acquire(&self) -> ClientResult<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::InFlight)?;
        Ok(InFlightGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the flag when dropped, on every exit path
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected_until_release() {
        let flag = InFlight::new();
        let guard = flag.acquire().unwrap();
        assert!(flag.is_busy());
        assert_eq!(flag.acquire().unwrap_err(), ClientError::InFlight);

        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.acquire().is_ok());
    }
}
