//! Idle detection state machine.
//!
//! Two states:
//! - Active -> Warned (quiet period reached, observed on a poll)
//! - Warned -> Active (any activity, or the user chooses to continue)
//!
//! The monitor never ends a session on its own. It surfaces the warning and
//! waits for the user to pick [`Resolution::Continue`] or
//! [`Resolution::EndSession`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use farma_core::clock::SharedClock;
use farma_core::config::InactivityConfig;

use crate::store::SessionStore;

/// Idle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InactivityState {
    Active,
    /// The quiet period elapsed; the user has been asked whether to continue.
    Warned,
}

impl fmt::Display for InactivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InactivityState::Active => write!(f, "Active"),
            InactivityState::Warned => write!(f, "Warned"),
        }
    }
}

/// The two answers to an idle warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Continue,
    EndSession,
}

/// Clock-driven idle detector.
pub struct InactivityMonitor {
    clock: SharedClock,
    threshold: Duration,
    poll_interval: Duration,
    last_activity_at: DateTime<Utc>,
    state: InactivityState,
}

impl InactivityMonitor {
    pub fn new(clock: SharedClock, config: &InactivityConfig) -> Self {
        let last_activity_at = clock.now();
        Self {
            clock,
            threshold: config.threshold(),
            poll_interval: config.poll_interval(),
            last_activity_at,
            state: InactivityState::Active,
        }
    }

    pub fn state(&self) -> InactivityState {
        self.state
    }

    pub fn is_warned(&self) -> bool {
        self.state == InactivityState::Warned
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// Cadence at which [`InactivityMonitor::poll`] should be called.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Time since the last activity signal.
    pub fn idle_for(&self) -> Duration {
        (self.clock.now() - self.last_activity_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Run one idle check. Returns `true` only on the poll that moves the
    /// monitor from `Active` to `Warned`.
    pub fn poll(&mut self) -> bool {
        if self.state == InactivityState::Warned {
            return false;
        }
        let idle = self.idle_for();
        if idle >= self.threshold {
            info!(idle_secs = idle.as_secs(), "Session idle, warning user");
            self.state = InactivityState::Warned;
            return true;
        }
        false
    }

    /// User typed, sent, or used the camera.
    pub fn record_activity(&mut self) {
        if self.state == InactivityState::Warned {
            debug!("Inactivity state: Warned -> Active");
        }
        self.state = InactivityState::Active;
        self.last_activity_at = self.clock.now();
    }

    /// Apply the user's answer to the idle warning.
    ///
    /// `EndSession` resets the conversation to its greeting. Both answers
    /// restart the idle clock.
    pub fn resolve(&mut self, resolution: Resolution, store: &mut SessionStore) {
        match resolution {
            Resolution::Continue => {
                info!("User continued idle session");
            }
            Resolution::EndSession => {
                info!("User ended idle session");
                store.reset();
            }
        }
        self.record_activity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use farma_core::clock::{Clock, ManualClock};
    use farma_core::types::Origin;

    fn monitor() -> (InactivityMonitor, ManualClock) {
        let clock = ManualClock::default();
        let monitor = InactivityMonitor::new(
            Arc::new(clock.clone()),
            &InactivityConfig {
                threshold_secs: 120,
                poll_interval_secs: 10,
            },
        );
        (monitor, clock)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(InactivityState::Active.to_string(), "Active");
        assert_eq!(InactivityState::Warned.to_string(), "Warned");
    }

    #[test]
    fn test_active_before_threshold_warned_on_first_poll_past_it() {
        let (mut monitor, clock) = monitor();
        let step = monitor.poll_interval();

        // Polls at T+10 .. T+110 stay Active.
        for _ in 0..11 {
            clock.advance(step);
            assert!(!monitor.poll());
            assert_eq!(monitor.state(), InactivityState::Active);
        }

        // Poll at T+120 fires.
        clock.advance(step);
        assert!(monitor.poll());
        assert_eq!(monitor.state(), InactivityState::Warned);

        // Stays warned without firing again.
        clock.advance(step);
        assert!(!monitor.poll());
        assert!(monitor.is_warned());
    }

    #[test]
    fn test_offset_polls_fire_within_one_interval() {
        let (mut monitor, clock) = monitor();
        clock.advance(Duration::from_secs(3));
        let mut fired_at = None;
        for tick in 0..20u64 {
            if monitor.poll() {
                fired_at = Some(3 + tick * 10);
                break;
            }
            clock.advance(Duration::from_secs(10));
        }
        let fired_at = fired_at.unwrap();
        assert!(fired_at >= 120);
        assert!(fired_at < 130);
    }

    #[test]
    fn test_activity_resets_clock() {
        let (mut monitor, clock) = monitor();
        clock.advance(Duration::from_secs(110));
        monitor.record_activity();
        clock.advance(Duration::from_secs(110));
        assert!(!monitor.poll());
        assert_eq!(monitor.idle_for(), Duration::from_secs(110));
    }

    #[test]
    fn test_activity_clears_warning() {
        let (mut monitor, clock) = monitor();
        clock.advance(Duration::from_secs(130));
        assert!(monitor.poll());

        monitor.record_activity();
        assert_eq!(monitor.state(), InactivityState::Active);
        assert_eq!(monitor.last_activity_at(), clock.now());
        assert!(!monitor.poll());
    }

    #[test]
    fn test_continue_keeps_history() {
        let (mut monitor, clock) = monitor();
        let mut store = SessionStore::new("Hola", Arc::new(clock.clone()));
        store.append(Origin::User, "hola", None);

        clock.advance(Duration::from_secs(120));
        assert!(monitor.poll());
        monitor.resolve(Resolution::Continue, &mut store);

        assert_eq!(monitor.state(), InactivityState::Active);
        assert_eq!(monitor.idle_for(), Duration::ZERO);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_end_session_resets_store() {
        let (mut monitor, clock) = monitor();
        let mut store = SessionStore::new("Hola", Arc::new(clock.clone()));
        store.append(Origin::User, "hola", None);
        store.append(Origin::Assistant, "¿En qué puedo ayudarte?", None);

        clock.advance(Duration::from_secs(125));
        assert!(monitor.poll());
        monitor.resolve(Resolution::EndSession, &mut store);

        assert_eq!(monitor.state(), InactivityState::Active);
        assert_eq!(store.len(), 1);
        assert_eq!(store.last().unwrap().text, "Hola");
    }

    #[test]
    fn test_no_automatic_termination() {
        let (mut monitor, clock) = monitor();
        let mut store = SessionStore::new("Hola", Arc::new(clock.clone()));
        store.append(Origin::User, "hola", None);

        for _ in 0..100 {
            clock.advance(Duration::from_secs(10));
            monitor.poll();
        }
        assert!(monitor.is_warned());
        assert_eq!(store.len(), 2);
    }
}
