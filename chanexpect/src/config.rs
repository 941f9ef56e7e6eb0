use std::time::Duration;

/// Runtime configuration for an [`Expecter`](crate::Expecter).
///
/// Use the builder methods to customize, or [`Default`] for sensible defaults.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use chanexpect::Config;
///
/// let config = Config::default()
///     .with_verbose(true)                              // Trace every processed message
///     .with_cancel_grace(Duration::from_millis(200))   // Abort sooner after a timeout
///     .with_await_timeout(Duration::from_secs(5));     // Used by await_satisfied_default
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Include debug entries in rendered traces and dump the full trace of
    /// every processed message on failure.
    /// Default: false
    verbose: bool,

    /// How long the consumer may take to stop after cancellation before its
    /// task is aborted.
    /// Default: 1s
    cancel_grace: Duration,

    /// Timeout used by the `*_default` await and assert helpers.
    /// Default: 1s
    await_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbose: false,
            cancel_grace: Duration::from_secs(1),
            await_timeout: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Enable or disable verbose tracing.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Returns whether verbose tracing is enabled.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Set the grace period granted to the consumer after cancellation.
    ///
    /// A message being matched when the timeout fires finishes processing
    /// first; the grace period bounds how long that may take.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Returns the cancellation grace period.
    pub fn cancel_grace(&self) -> Duration {
        self.cancel_grace
    }

    /// Set the timeout used when none is passed explicitly.
    pub fn with_await_timeout(mut self, timeout: Duration) -> Self {
        self.await_timeout = timeout;
        self
    }

    /// Returns the default await timeout.
    pub fn await_timeout(&self) -> Duration {
        self.await_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::default()
            .with_verbose(true)
            .with_cancel_grace(Duration::from_millis(5))
            .with_await_timeout(Duration::from_secs(3));

        assert!(config.verbose());
        assert_eq!(config.cancel_grace(), Duration::from_millis(5));
        assert_eq!(config.await_timeout(), Duration::from_secs(3));
        assert!(!Config::default().verbose());
    }
}
