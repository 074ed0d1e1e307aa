//! Session finite-state machine and the shared last-activity marker

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::auth::{AuthFailure, Credential};
use super::clock::Clock;
use crate::error::{AuthExpired, EndReason};

/// Session state
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No credential held
    Unauthenticated { reason: EndReason },
    /// Credential held, activity recent
    Active { credential: Credential },
    /// Credential held, renewal in flight
    IdlePendingRenewal { credential: Credential },
}

/// What a timer tick should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Renew,
    Expire,
    /// Nothing to do: no session, or a renewal is already in flight
    Skip,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Unauthenticated {
            reason: EndReason::NeverAuthenticated,
        }
    }
}

impl SessionState {
    pub fn authenticated(credential: Credential) -> Self {
        SessionState::Active { credential }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, SessionState::Unauthenticated { .. })
    }

    /// Held credential, or why there is none
    pub fn credential(&self) -> Result<&Credential, AuthExpired> {
        match self {
            SessionState::Active { credential }
            | SessionState::IdlePendingRenewal { credential } => Ok(credential),
            SessionState::Unauthenticated { reason } => Err(AuthExpired { reason: *reason }),
        }
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        match self {
            SessionState::Unauthenticated { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Idle for a full timeout or longer ends the session, regardless of tick punctuality
    pub fn on_tick(
        &self,
        last_activity: DateTime<Utc>,
        now: DateTime<Utc>,
        idle_timeout: Duration,
    ) -> TickDecision {
        match self {
            SessionState::Active { .. } if now - last_activity >= idle_timeout => {
                TickDecision::Expire
            }
            SessionState::Active { .. } => TickDecision::Renew,
            SessionState::IdlePendingRenewal { .. } | SessionState::Unauthenticated { .. } => {
                TickDecision::Skip
            }
        }
    }

    /// Active -> IdlePendingRenewal; returns the credential to present
    pub fn begin_renewal(&mut self) -> Option<Credential> {
        match self {
            SessionState::Active { credential } => {
                let credential = credential.clone();
                *self = SessionState::IdlePendingRenewal {
                    credential: credential.clone(),
                };
                Some(credential)
            }
            _ => None,
        }
    }

    /// Apply a renewal outcome. Ignored unless a renewal is pending (e.g. after logout).
    pub fn finish_renewal(&mut self, outcome: Result<Credential, AuthFailure>) -> bool {
        if !matches!(self, SessionState::IdlePendingRenewal { .. }) {
            return false;
        }
        *self = match outcome {
            Ok(credential) => SessionState::Active { credential },
            Err(_) => SessionState::Unauthenticated {
                reason: EndReason::RenewalFailed,
            },
        };
        true
    }

    /// Any authenticated state -> Unauthenticated
    pub fn end(&mut self, reason: EndReason) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        *self = SessionState::Unauthenticated { reason };
        true
    }
}

/// Last observed user input, shared between input listeners and the timer task.
/// Updates are a single atomic store.
#[derive(Clone)]
pub struct ActivityTracker {
    last_millis: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
}

impl ActivityTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now().timestamp_millis();
        Self {
            last_millis: Arc::new(AtomicI64::new(now)),
            clock,
        }
    }

    /// Pointer movement, key press, click or touch
    pub fn record(&self) {
        self.record_at(self.clock.now());
    }

    pub fn record_at(&self, at: DateTime<Utc>) {
        self.last_millis.store(at.timestamp_millis(), Ordering::Release);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        // An unrepresentable marker reads as "long ago", which expires the session
        DateTime::from_timestamp_millis(self.last_millis.load(Ordering::Acquire))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl fmt::Debug for ActivityTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityTracker")
            .field("last_activity", &self.last_activity())
            .finish()
    }
}
