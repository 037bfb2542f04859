//! Global stop for the scheduler.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use prizebot_common::AppError;

/// Disables every tick after repeated store authorization failures.
///
/// Other failures neither count nor reset the streak; only a successful tick
/// resets it. Once tripped it stays tripped until the process restarts.
#[derive(Debug)]
pub struct KillSwitch {
    threshold: u32,
    consecutive: AtomicU32,
    tripped: AtomicBool,
}

impl KillSwitch {
    /// A threshold of `0` disables the switch.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: AtomicU32::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    /// Whether the ticks must stop.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Reset the consecutive failure count.
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    /// Count a tick failure. Returns `true` if this call tripped the switch.
    pub fn record_failure(&self, error: &AppError) -> bool {
        if self.threshold == 0 || !error.is_store_auth_failure() {
            return false;
        }

        let count = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.threshold && !self.tripped.swap(true, Ordering::SeqCst) {
            tracing::error!(
                failures = count,
                "Store keeps rejecting credentials, disabling scheduler"
            );
            return true;
        }
        false
    }
}
