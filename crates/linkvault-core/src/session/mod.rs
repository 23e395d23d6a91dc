//! Unlocked vault sessions
//!
//! - [`SessionLifecycle`]: the Locked / Unlocked / Stopping state machine
//! - [`SessionStore`]: the decrypted document and its mutations
//! - [`EventSink`]: where session events go
//! - [`spawn_ticker`]: the periodic tick that drives the inactivity timeout
//!
//! All state lives in one `SessionLifecycle` value and every mutation takes
//! `&mut self`, so there is exactly one writer at a time.

pub mod clock;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod store;
pub mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SessionError, SessionResult};
pub use events::{EventSink, SessionEvent};
pub use lifecycle::{NoopHost, SessionHost, SessionLifecycle, SessionState, StopReason};
pub use store::{ImportOptions, ImportSummary, OpenCommand, SessionStore};
pub use ticker::{spawn_ticker, Tick, TickerCommand, TickerHandle};
