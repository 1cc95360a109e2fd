//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for HTTP requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default per-request timeout for a single provider call
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
}

/// AI request defaults
pub mod ai {
    /// Default maximum output tokens per completion
    pub const MAX_OUTPUT_TOKENS: usize = 4096;

    /// Default sampling temperature
    pub const TEMPERATURE: f32 = 0.7;
}

/// Retry behavior
pub mod retry {
    use super::*;

    /// Total attempts per provider call (first try included)
    pub const MAX_ATTEMPTS: u32 = 2;

    /// Initial delay before the first retry
    pub const INITIAL_DELAY: Duration = Duration::from_millis(500);

    /// Cap on the backoff delay
    pub const MAX_DELAY: Duration = Duration::from_secs(8);
}

/// Configuration file layout
pub mod config {
    /// Config directory name under the user's home
    pub const CONFIG_DIR_NAME: &str = ".chorus";

    /// Provider configuration file name
    pub const CONFIG_FILE_NAME: &str = "providers.json";
}
