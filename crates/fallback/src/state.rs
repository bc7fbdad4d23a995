//! Per-provider mutable state and its `READY`/`COOLDOWN`/`DISABLED`
//! derivation, per spec §4.3.

use common::ErrorKind;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderLifecycle {
    Ready,
    Cooldown,
    Disabled,
}

#[derive(Debug)]
pub struct ProviderState {
    pub available: bool,
    pub error_count: u32,
    pub cooldown_until: Option<Instant>,
    pub last_used: bool,
    pub last_error: Option<ErrorKind>,
}

impl ProviderState {
    pub fn new(available: bool) -> Self {
        ProviderState {
            available,
            error_count: 0,
            cooldown_until: None,
            last_used: false,
            last_error: None,
        }
    }

    pub fn lifecycle(&self, now: Instant) -> ProviderLifecycle {
        if !self.available {
            return ProviderLifecycle::Disabled;
        }
        match self.cooldown_until {
            Some(until) if now < until => ProviderLifecycle::Cooldown,
            _ => ProviderLifecycle::Ready,
        }
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        self.lifecycle(now) == ProviderLifecycle::Ready
    }

    /// Transition on a successful call: reset error count, mark as last used.
    pub fn record_success(&mut self) {
        self.error_count = 0;
        self.last_used = true;
        self.last_error = None;
        self.cooldown_until = None;
    }

    /// Transition on a classified failure. Returns whether this failure
    /// entered cooldown (terminal-for-call errors always do; others only
    /// once retries are exhausted).
    pub fn record_failure(&mut self, kind: ErrorKind, base_cooldown: Duration, retries_exhausted: bool) -> bool {
        self.error_count += 1;
        self.last_used = false;
        self.last_error = Some(kind);

        let enters_cooldown = kind.is_terminal_for_call() || retries_exhausted;
        if enters_cooldown {
            let multiplier = 2u32.saturating_pow(self.error_count).min(8);
            self.cooldown_until = Some(Instant::now() + base_cooldown * multiplier);
        }
        enters_cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn disabled_without_key() {
        let state = ProviderState::new(false);
        assert_eq!(state.lifecycle(Instant::now()), ProviderLifecycle::Disabled);
    }

    #[test]
    fn ready_with_no_cooldown() {
        let state = ProviderState::new(true);
        assert_eq!(state.lifecycle(Instant::now()), ProviderLifecycle::Ready);
    }

    #[test]
    fn success_resets_error_count() {
        let mut state = ProviderState::new(true);
        state.error_count = 3;
        state.record_success();
        assert_eq!(state.error_count, 0);
        assert!(state.last_used);
    }

    #[test]
    fn terminal_error_enters_cooldown_immediately() {
        let mut state = ProviderState::new(true);
        let entered = state.record_failure(ErrorKind::RateLimit, Duration::from_secs(30), false);
        assert!(entered);
        assert_eq!(state.lifecycle(Instant::now()), ProviderLifecycle::Cooldown);
    }

    #[test]
    fn non_terminal_error_waits_for_retry_exhaustion() {
        let mut state = ProviderState::new(true);
        let entered = state.record_failure(ErrorKind::Timeout, Duration::from_secs(30), false);
        assert!(!entered);
        assert_eq!(state.lifecycle(Instant::now()), ProviderLifecycle::Ready);

        let entered = state.record_failure(ErrorKind::Timeout, Duration::from_secs(30), true);
        assert!(entered);
        assert_eq!(state.lifecycle(Instant::now()), ProviderLifecycle::Cooldown);
    }

    #[test]
    fn cooldown_duration_scales_with_error_count_capped_at_8x() {
        let mut state = ProviderState::new(true);
        for _ in 0..10 {
            state.record_failure(ErrorKind::RateLimit, Duration::from_secs(1), false);
        }
        let until = state.cooldown_until.unwrap();
        let remaining = until.saturating_duration_since(Instant::now());
        assert!(remaining <= Duration::from_secs(8));
    }
}
