//! Application configuration constants
//!
//! Central location for the note palette, storage names, and the
//! validation boundaries applied to user settings.

// ===== Entities =====

/// Colours a note may be created with, in picker order
pub const NOTE_COLORS: &[&str] = &["#fff9c4", "#ffecb3", "#ffe0b2", "#ffccbc"];

/// Colour used when none (or an unknown one) is supplied
pub const DEFAULT_NOTE_COLOR: &str = "#fff9c4";

/// Owner recorded on optimistic records when no session user is known
pub const LOCAL_USER_PLACEHOLDER: &str = "current-user";

// ===== Storage =====

/// Cache key holding the serialized note list
pub const NOTES_CACHE_KEY: &str = "@notes";

/// Cache key holding the serialized todo list
pub const TODOS_CACHE_KEY: &str = "@todos";

/// Settings file name inside the data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Default cache database file name inside the data directory
pub const DEFAULT_CACHE_FILE_NAME: &str = "cache.db";

// ===== Sync Settings Limits =====

/// Maximum attempts for a single remote call (first try included)
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Maximum base delay between retries in milliseconds (1 minute)
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Shortest background refresh period in seconds.
/// Anything faster hammers the backend for no visible benefit.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 5;

/// Longest background refresh period in seconds (1 day)
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;

// ===== HTTP =====

/// User agent sent with every backend request
pub const USER_AGENT: &str = concat!("jotter/", env!("CARGO_PKG_VERSION"));
