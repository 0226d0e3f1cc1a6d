//! Runtime configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use uthreads_runtime::config::RuntimeConfig;
//!
//! // Defaults with env overrides
//! let config = RuntimeConfig::from_env();
//!
//! // Or customize programmatically
//! let config = RuntimeConfig::new()
//!     .max_threads(16)
//!     .stack_size(64 * 1024);
//! ```

use uthreads_core::constants::{
    DEFAULT_MAX_THREADS, DEFAULT_STACK_SIZE, MAX_THREADS_LIMIT, MIN_STACK_SIZE,
};
use uthreads_core::env::{env_get, env_get_bool};

/// Runtime configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Thread table capacity, thread 0 included
    pub max_threads: usize,
    /// Usable stack bytes per spawned thread (rounded up to pages)
    pub stack_size: usize,
    /// Raise the log level to debug at init
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeConfig {
    /// Library defaults, no env override.
    pub fn new() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
            debug_logging: false,
        }
    }

    /// Library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `UTHREADS_MAX_THREADS` - Thread table capacity
    /// - `UTHREADS_STACK_SIZE` - Stack bytes per spawned thread
    /// - `UTHREADS_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        Self {
            max_threads: env_get("UTHREADS_MAX_THREADS", DEFAULT_MAX_THREADS),
            stack_size: env_get("UTHREADS_STACK_SIZE", DEFAULT_STACK_SIZE),
            debug_logging: env_get_bool("UTHREADS_DEBUG", false),
        }
    }

    // Builder methods

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_threads == 0 {
            return Err("max_threads must be > 0");
        }
        if self.max_threads > MAX_THREADS_LIMIT {
            return Err("max_threads must be <= 65536");
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err("stack_size must be >= 16KB");
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        uthreads_core::kprintln!("uthreads configuration:");
        uthreads_core::kprintln!("  max_threads:    {}", self.max_threads);
        uthreads_core::kprintln!("  stack_size:     {}", self.stack_size);
        uthreads_core::kprintln!("  debug_logging:  {}", self.debug_logging);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::new();
        assert_eq!(config.max_threads, 100);
        assert_eq!(config.stack_size, 256 * 1024);
        assert!(!config.debug_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .max_threads(8)
            .stack_size(64 * 1024)
            .debug_logging(true);

        assert_eq!(config.max_threads, 8);
        assert_eq!(config.stack_size, 64 * 1024);
        assert!(config.debug_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(RuntimeConfig::new().max_threads(0).validate().is_err());
        assert!(RuntimeConfig::new().stack_size(4096).validate().is_err());
        assert!(RuntimeConfig::new().stack_size(MIN_STACK_SIZE).validate().is_ok());
        assert!(RuntimeConfig::new().max_threads(1).validate().is_ok());
        assert!(RuntimeConfig::new().max_threads(MAX_THREADS_LIMIT).validate().is_ok());
        assert!(RuntimeConfig::new().max_threads(MAX_THREADS_LIMIT + 1).validate().is_err());
    }

    #[test]
    fn test_from_env_is_valid() {
        // No UTHREADS_* variables are set under cargo test
        assert!(RuntimeConfig::from_env().validate().is_ok());
    }
}
