//! Output from scene scripts.
//!
//! `print` and `debug` calls inside scripts land here and go out through the
//! `log` facade under the `script` target. A per-frame budget keeps a chatty
//! per-frame script from flooding the output.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const DEFAULT_LOGS_PER_FRAME: u32 = 100;

struct FrameBudget {
    limit: AtomicU32,
    used: AtomicU32,
    overflow_reported: AtomicBool,
}

impl FrameBudget {
    const fn new(limit: u32) -> Self {
        Self {
            limit: AtomicU32::new(limit),
            used: AtomicU32::new(0),
            overflow_reported: AtomicBool::new(false),
        }
    }

    /// Take one message from the budget. The first refusal in a frame is
    /// reported once.
    fn take(&self) -> bool {
        let limit = self.limit.load(Ordering::Relaxed);
        if self.used.fetch_add(1, Ordering::Relaxed) < limit {
            return true;
        }
        if !self.overflow_reported.swap(true, Ordering::Relaxed) {
            log::warn!(
                target: "script",
                "More than {} script messages this frame; the rest are dropped",
                limit
            );
        }
        false
    }

    fn refill(&self) {
        self.used.store(0, Ordering::Relaxed);
        self.overflow_reported.store(false, Ordering::Relaxed);
    }
}

static BUDGET: FrameBudget = FrameBudget::new(DEFAULT_LOGS_PER_FRAME);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

pub fn set_frame_log_limit(limit: u32) {
    BUDGET.limit.store(limit, Ordering::Relaxed);
}

/// Called by the manager at the top of every frame.
pub fn reset_frame_log_count() {
    BUDGET.refill();
}

pub fn script_log(level: LogLevel, script: &str, message: &str) {
    if !BUDGET.take() {
        return;
    }
    let level = log::Level::from(level);
    match script {
        "" => log::log!(target: "script", level, "{}", message),
        name => log::log!(target: "script", level, "[{}] {}", name, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_refuses_after_limit() {
        let budget = FrameBudget::new(3);
        assert!((0..3).all(|_| budget.take()));
        assert!(!budget.take());
        assert!(!budget.take());
        assert!(budget.overflow_reported.load(Ordering::Relaxed));
    }

    #[test]
    fn test_refill_restores_budget() {
        let budget = FrameBudget::new(1);
        assert!(budget.take());
        assert!(!budget.take());
        budget.refill();
        assert!(!budget.overflow_reported.load(Ordering::Relaxed));
        assert!(budget.take());
    }

    #[test]
    fn test_zero_limit_drops_everything() {
        let budget = FrameBudget::new(0);
        assert!(!budget.take());
    }
}
