//! Session lifecycle: activity tracking, periodic credential renewal and idle teardown
//!
//! ```text
//! Unauthenticated --login--> Active --tick, idle < timeout--> IdlePendingRenewal
//!        ^                     |  ^                                  |
//!        |                     |  +---------- renewal ok ------------+
//!        +-- idle >= timeout --+                                     |
//!        +-- renewal failed / timed out -----------------------------+
//!        +-- logout (from any state)
//! ```
//!
//! Sessions are not coordinated across processes: two processes holding the
//! same account renew and expire independently.

mod auth;
mod clock;
mod manager;
mod state;

pub use auth::{AuthFailure, AuthFuture, Authorizer, Claims, Credential, Identity, Role};
pub use clock::{Clock, MonotonicClock, SystemClock};
pub use manager::{SessionHandle, SessionRegistry};
pub use state::{ActivityTracker, SessionState, TickDecision};
