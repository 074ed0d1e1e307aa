//! Background renewal task and the process-wide session registry

use chrono::Duration as ChronoDuration;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::auth::{AuthFailure, Authorizer, Credential, Identity};
use super::clock::Clock;
use super::state::{ActivityTracker, SessionState, TickDecision};
use crate::config::SessionConfig;
use crate::error::{AuthExpired, EndReason};

/// Handle to one running session. Dropping it does not end the session;
/// call [`logout`](Self::logout).
#[derive(Debug)]
pub struct SessionHandle {
    status: Arc<watch::Sender<SessionState>>,
    shutdown: Arc<Notify>,
    tracker: ActivityTracker,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Start the renewal task for a freshly issued credential.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        credential: Credential,
        authorizer: Arc<dyn Authorizer>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let (status, _) = watch::channel(SessionState::authenticated(credential));
        let status = Arc::new(status);
        let shutdown = Arc::new(Notify::new());
        let tracker = ActivityTracker::new(clock);

        let task = tokio::spawn(run_session(
            Arc::clone(&status),
            Arc::clone(&shutdown),
            tracker.clone(),
            authorizer,
            config,
        ));

        Self {
            status,
            shutdown,
            tracker,
            task,
        }
    }

    /// Tracker for input listeners; cheap to clone across threads
    pub fn activity(&self) -> ActivityTracker {
        self.tracker.clone()
    }

    pub fn record_activity(&self) {
        self.tracker.record();
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().clone()
    }

    pub fn credential(&self) -> Result<Credential, AuthExpired> {
        self.status.borrow().credential().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.status.subscribe()
    }

    /// End the session now, discarding any renewal in flight
    pub fn logout(&self) {
        if self.status.send_if_modified(|state| state.end(EndReason::LoggedOut)) {
            info!("session ended: {}", EndReason::LoggedOut);
        }
        self.shutdown.notify_one();
    }

    /// Wait for the renewal task to exit
    pub async fn closed(self) {
        if let Err(e) = self.task.await {
            warn!("session task did not exit cleanly: {}", e);
        }
    }
}

fn end_session(status: &watch::Sender<SessionState>, reason: EndReason) {
    if status.send_if_modified(|state| state.end(reason)) {
        info!("session ended: {}", reason);
    }
}

async fn run_session(
    status: Arc<watch::Sender<SessionState>>,
    shutdown: Arc<Notify>,
    tracker: ActivityTracker,
    authorizer: Arc<dyn Authorizer>,
    config: SessionConfig,
) {
    let period = config.renewal_interval();
    let idle_timeout = ChronoDuration::from_std(config.idle_timeout())
        .unwrap_or_else(|_| ChronoDuration::weeks(52));

    // First tick one full period after login
    let mut ticker = interval_at(Instant::now() + period, period);
    // Ticks missed while a renewal is in flight are dropped, never queued up
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = ticker.tick() => {}
        }

        let decision = status
            .borrow()
            .on_tick(tracker.last_activity(), tracker.now(), idle_timeout);
        debug!("session tick: {:?}", decision);

        match decision {
            TickDecision::Skip => {
                if !status.borrow().is_authenticated() {
                    break;
                }
            }
            TickDecision::Expire => {
                end_session(&status, EndReason::IdleTimeout);
                break;
            }
            TickDecision::Renew => {
                let mut presented = None;
                status.send_if_modified(|state| {
                    presented = state.begin_renewal();
                    presented.is_some()
                });
                let Some(credential) = presented else {
                    continue;
                };

                let outcome = tokio::select! {
                    _ = shutdown.notified() => break,
                    result = tokio::time::timeout(
                        config.renewal_timeout(),
                        authorizer.renew_credential(&credential),
                    ) => result.unwrap_or(Err(AuthFailure::TimedOut)),
                };

                if let Err(e) = &outcome {
                    warn!("credential renewal failed: {}", e);
                }
                let renewed = outcome.is_ok();
                status.send_if_modified(|state| state.finish_renewal(outcome));

                match status.borrow().end_reason() {
                    Some(reason) => {
                        info!("session ended: {}", reason);
                        break;
                    }
                    None if renewed => debug!("credential renewed"),
                    None => {}
                }
            }
        }
    }
}

/// Owns the single session of this process
pub struct SessionRegistry {
    authorizer: Arc<dyn Authorizer>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    current: Mutex<Option<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            authorizer,
            clock,
            config,
            current: Mutex::new(None),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SessionHandle>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Authenticate and start a session, ending any session already held
    pub async fn login(&self, identity: &Identity) -> Result<Credential, AuthFailure> {
        let credential = self.authorizer.login(identity).await?;
        info!(
            "login succeeded for subject {} ({})",
            credential.claims.subject, credential.claims.role
        );

        let handle = SessionHandle::spawn(
            credential.clone(),
            Arc::clone(&self.authorizer),
            Arc::clone(&self.clock),
            self.config.clone(),
        );

        if let Some(previous) = self.slot().replace(handle) {
            warn!("replacing an existing session");
            previous.logout();
        }
        Ok(credential)
    }

    pub fn logout(&self) {
        if let Some(handle) = self.slot().as_ref() {
            handle.logout();
        }
    }

    /// Credential to authorize the next call with, or [`AuthExpired`]
    pub fn credential(&self) -> Result<Credential, AuthExpired> {
        match self.slot().as_ref() {
            Some(handle) => handle.credential(),
            None => Err(AuthExpired {
                reason: EndReason::NeverAuthenticated,
            }),
        }
    }

    /// Lock-free tracker for the current session, for input listeners.
    ///
    /// The tracker belongs to one session: fetch it again after each login.
    pub fn activity(&self) -> Option<ActivityTracker> {
        self.slot().as_ref().map(SessionHandle::activity)
    }

    /// Takes the registry lock on every call. High-rate input listeners
    /// should hold the tracker from [`SessionRegistry::activity`] instead.
    pub fn record_activity(&self) {
        if let Some(handle) = self.slot().as_ref() {
            handle.record_activity();
        }
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<SessionState>> {
        self.slot().as_ref().map(SessionHandle::subscribe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::auth::{AuthFuture, Claims, Role};
    use crate::session::clock::MonotonicClock;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        Fail,
        Hang,
    }

    struct FakeAuthorizer {
        behaviour: Behaviour,
        renewals: AtomicUsize,
    }

    impl FakeAuthorizer {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                renewals: AtomicUsize::new(0),
            })
        }

        fn issue(token: String) -> Credential {
            Credential {
                token,
                claims: Claims {
                    subject: 7,
                    role: Role::Investor,
                    email: None,
                },
                issued_at: Utc::now(),
            }
        }
    }

    impl Authorizer for FakeAuthorizer {
        fn login<'a>(&'a self, identity: &'a Identity) -> AuthFuture<'a> {
            Box::pin(async move {
                if identity.password == "correct" {
                    Ok(Self::issue("login".into()))
                } else {
                    Err(AuthFailure::Rejected("invalid credentials".into()))
                }
            })
        }

        fn renew_credential<'a>(&'a self, _current: &'a Credential) -> AuthFuture<'a> {
            let n = self.renewals.fetch_add(1, Ordering::SeqCst) + 1;
            let behaviour = self.behaviour;
            Box::pin(async move {
                match behaviour {
                    Behaviour::Succeed => Ok(Self::issue(format!("renewed-{}", n))),
                    Behaviour::Fail => Err(AuthFailure::Rejected("refresh token expired".into())),
                    Behaviour::Hang => std::future::pending().await,
                }
            })
        }
    }

    const MINUTE: Duration = Duration::from_secs(60);

    fn spawn(authorizer: Arc<FakeAuthorizer>) -> SessionHandle {
        SessionHandle::spawn(
            FakeAuthorizer::issue("login".into()),
            authorizer,
            Arc::new(MonotonicClock::new()),
            SessionConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_expires_on_first_tick() {
        let authorizer = FakeAuthorizer::new(Behaviour::Succeed);
        let handle = spawn(Arc::clone(&authorizer));
        let mut rx = handle.subscribe();

        rx.wait_for(|s| !s.is_authenticated()).await.unwrap();

        assert_eq!(
            handle.credential().unwrap_err(),
            AuthExpired { reason: EndReason::IdleTimeout }
        );
        assert_eq!(authorizer.renewals.load(Ordering::SeqCst), 0);
        handle.closed().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_session_renews_then_expires_when_idle() {
        let authorizer = FakeAuthorizer::new(Behaviour::Succeed);
        let handle = spawn(Arc::clone(&authorizer));
        let mut rx = handle.subscribe();

        tokio::time::sleep(4 * MINUTE).await;
        handle.record_activity();

        rx.wait_for(|s| matches!(s.credential(), Ok(c) if c.token == "renewed-1"))
            .await
            .unwrap();
        assert!(matches!(handle.state(), SessionState::Active { .. }));

        // Last activity at 4 min; the tick at 20 min sees 16 min idle
        rx.wait_for(|s| !s.is_authenticated()).await.unwrap();
        assert_eq!(handle.state().end_reason(), Some(EndReason::IdleTimeout));
        assert_eq!(authorizer.renewals.load(Ordering::SeqCst), 1);
        handle.closed().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_failure_ends_session() {
        let handle = spawn(FakeAuthorizer::new(Behaviour::Fail));
        let mut rx = handle.subscribe();

        tokio::time::sleep(9 * MINUTE).await;
        handle.record_activity();

        rx.wait_for(|s| !s.is_authenticated()).await.unwrap();
        assert_eq!(handle.state().end_reason(), Some(EndReason::RenewalFailed));
        handle.closed().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_timeout_ends_session() {
        let handle = spawn(FakeAuthorizer::new(Behaviour::Hang));
        let mut rx = handle.subscribe();

        tokio::time::sleep(5 * MINUTE).await;
        handle.record_activity();

        rx.wait_for(|s| !s.is_authenticated()).await.unwrap();
        assert_eq!(handle.state().end_reason(), Some(EndReason::RenewalFailed));
        handle.closed().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_renewal_wins() {
        let handle = spawn(FakeAuthorizer::new(Behaviour::Hang));
        let mut rx = handle.subscribe();

        tokio::time::sleep(5 * MINUTE).await;
        handle.record_activity();

        rx.wait_for(|s| matches!(s, SessionState::IdlePendingRenewal { .. }))
            .await
            .unwrap();
        handle.logout();

        assert_eq!(handle.state().end_reason(), Some(EndReason::LoggedOut));
        handle.closed().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_single_session() {
        let registry = SessionRegistry::new(
            FakeAuthorizer::new(Behaviour::Succeed),
            Arc::new(MonotonicClock::new()),
            SessionConfig::default(),
        );

        assert_eq!(
            registry.credential().unwrap_err().reason,
            EndReason::NeverAuthenticated
        );

        let wrong = Identity {
            login: "jane".into(),
            password: "wrong".into(),
        };
        assert!(registry.login(&wrong).await.is_err());
        assert!(registry.credential().is_err());

        let right = Identity {
            login: "jane".into(),
            password: "correct".into(),
        };
        let first_rx = {
            registry.login(&right).await.unwrap();
            registry.subscribe().unwrap()
        };
        registry.login(&right).await.unwrap();

        // The replaced session is torn down; the new one is live
        assert_eq!(first_rx.borrow().end_reason(), Some(EndReason::LoggedOut));
        assert_eq!(registry.credential().unwrap().token, "login");

        registry.logout();
        assert_eq!(
            registry.credential().unwrap_err().reason,
            EndReason::LoggedOut
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_tracker_keeps_session_alive() {
        let registry = SessionRegistry::new(
            FakeAuthorizer::new(Behaviour::Succeed),
            Arc::new(MonotonicClock::new()),
            SessionConfig::default(),
        );
        assert!(registry.activity().is_none());

        let right = Identity {
            login: "jane".into(),
            password: "correct".into(),
        };
        registry.login(&right).await.unwrap();
        let tracker = registry.activity().unwrap();
        let mut rx = registry.subscribe().unwrap();

        tokio::time::sleep(4 * MINUTE).await;
        tracker.record();

        rx.wait_for(|s| matches!(s.credential(), Ok(c) if c.token == "renewed-1"))
            .await
            .unwrap();
        assert_eq!(registry.credential().unwrap().token, "renewed-1");

        // A tracker from a replaced session does not touch the new one
        registry.login(&right).await.unwrap();
        let current = registry.activity().unwrap();
        tokio::time::sleep(MINUTE).await;
        tracker.record();
        assert!(current.last_activity() < tracker.last_activity());
    }
}
