//! Config for the match runner behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive: set them to `"true"` to enable them.
//! Durations are integer milliseconds.
//!
//! - `DUBNIUM_LOG`: Enable logging to a file (default: `false`)
//! - `DUBNIUM_NAME_TIMEOUT_MS`: Time every bot has to report its name (default: `30000`)
//! - `DUBNIUM_TURN_TIMEOUT_MS`: Time every bot has to answer a turn (default: `2000`)
//! - `DUBNIUM_NO_TIMEOUT`: Wait for bots forever, for debugging (default: `false`)
//! - `DUBNIUM_SLEEP_MS`: Minimum wall-clock duration of a turn (default: `0`)
//! - `DUBNIUM_DEBUG_BOT_STDERR`: Forward bot stderr to the log (default: `false`)

use std::time::Duration;

/// Configuration for match runner behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    pub(crate) log: bool,
    pub(crate) name_timeout: Option<Duration>,
    pub(crate) turn_timeout: Option<Duration>,
    pub(crate) min_turn_duration: Duration,
    pub(crate) debug_bot_stderr: bool,
}

impl Configuration {
    /// Default name deadline.
    pub const NAME_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default turn deadline.
    pub const TURN_TIMEOUT: Duration = Duration::from_secs(2);

    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Logging to file is disabled.
    /// - Bots have 30 seconds to send their name and 2 seconds per turn.
    /// - Turns are not paced.
    /// - Bot stderr output is discarded.
    pub fn new() -> Self {
        Self {
            log: false,
            name_timeout: Some(Self::NAME_TIMEOUT),
            turn_timeout: Some(Self::TURN_TIMEOUT),
            min_turn_duration: Duration::ZERO,
            debug_bot_stderr: false,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See the [module documentation](self) for the recognized variables. Unset or malformed
    /// values fall back to the defaults of [`Configuration::new`].
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_millis(var: &str, default: Duration) -> Duration {
            std::env::var(var)
                .ok()
                .and_then(|val| val.trim().parse().ok())
                .map_or(default, Duration::from_millis)
        }

        let config = Self {
            log: get_env_flag("DUBNIUM_LOG", false),
            name_timeout: Some(get_env_millis("DUBNIUM_NAME_TIMEOUT_MS", Self::NAME_TIMEOUT)),
            turn_timeout: Some(get_env_millis("DUBNIUM_TURN_TIMEOUT_MS", Self::TURN_TIMEOUT)),
            min_turn_duration: get_env_millis("DUBNIUM_SLEEP_MS", Duration::ZERO),
            debug_bot_stderr: get_env_flag("DUBNIUM_DEBUG_BOT_STDERR", false),
        };
        config.with_no_timeout(get_env_flag("DUBNIUM_NO_TIMEOUT", false))
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Deadline of the name phase.
    pub fn with_name_timeout(mut self, value: Duration) -> Self {
        self.name_timeout = Some(value);
        self
    }

    /// Deadline of every turn.
    pub fn with_turn_timeout(mut self, value: Duration) -> Self {
        self.turn_timeout = Some(value);
        self
    }

    /// Wait for bots forever (debug purposes only). Disabling restores the default deadlines.
    pub fn with_no_timeout(mut self, value: bool) -> Self {
        if value {
            self.name_timeout = None;
            self.turn_timeout = None;
        } else {
            self.name_timeout = self.name_timeout.or(Some(Self::NAME_TIMEOUT));
            self.turn_timeout = self.turn_timeout.or(Some(Self::TURN_TIMEOUT));
        }
        self
    }

    /// Sleep at the end of a turn that took less than `value`.
    ///
    /// The sleep happens after the answers are collected, it never extends the turn deadline.
    pub fn with_min_turn_duration(mut self, value: Duration) -> Self {
        self.min_turn_duration = value;
        self
    }

    /// Enable or disable bot stderr output in the log (debug purposes only).
    pub fn with_debug_bot_stderr(mut self, value: bool) -> Self {
        self.debug_bot_stderr = value;
        self
    }

    /// Deadline of the name phase, `None` for never.
    pub fn name_timeout(&self) -> Option<Duration> {
        self.name_timeout
    }

    /// Deadline of every turn, `None` for never.
    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_timeout_disables_both_deadlines() {
        let config = Configuration::new().with_no_timeout(true);
        assert_eq!(config.name_timeout(), None);
        assert_eq!(config.turn_timeout(), None);

        let config = config.with_no_timeout(false);
        assert_eq!(config.name_timeout(), Some(Configuration::NAME_TIMEOUT));
        assert_eq!(config.turn_timeout(), Some(Configuration::TURN_TIMEOUT));
    }

    #[test]
    fn setters_chain() {
        let config = Configuration::default()
            .with_turn_timeout(Duration::from_millis(50))
            .with_min_turn_duration(Duration::from_millis(5))
            .with_debug_bot_stderr(true);
        assert_eq!(config.turn_timeout(), Some(Duration::from_millis(50)));
        assert_eq!(config.name_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.min_turn_duration, Duration::from_millis(5));
        assert!(config.debug_bot_stderr);
        assert!(!config.log);
    }
}
