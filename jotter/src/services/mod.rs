//! Services module
//!
//! Business logic that coordinates the cache, the backend and the UI.

pub mod home;
pub mod remote;
pub mod settings;
pub mod signals;
pub mod sync;

pub use home::{HomeData, HomeStats};
pub use remote::RemoteService;
pub use settings::{AppSettings, FailurePolicy, SettingsService};
pub use signals::{HomeSignal, SignalReceiver, SignalSender};
pub use sync::{EntityStore, LoadOutcome, MutationOutcome, RetryPolicy, SyncPolicy};
