//! Environment variable utilities
//!
//! Used by `RuntimeConfig::from_env` for `UTHREADS_*` overrides.
//!
//! ```ignore
//! use uthreads_core::env::{env_get, env_get_bool};
//!
//! let max: usize = env_get("UTHREADS_MAX_THREADS", 100);
//! let debug: bool = env_get_bool("UTHREADS_DEBUG", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset and unparsable values both fall back to `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__UTHREADS_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        assert!(env_get_bool("__UTHREADS_TEST_UNSET__", true));
        assert_eq!(env_get_opt::<u64>("__UTHREADS_TEST_UNSET__"), None);
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__UTHREADS_TEST_NUM__", " 123 ");
        let val: usize = env_get("__UTHREADS_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__UTHREADS_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__UTHREADS_TEST_BAD__", "lots");
        let val: usize = env_get("__UTHREADS_TEST_BAD__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__UTHREADS_TEST_BAD__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for (raw, expected) in [("1", true), ("TRUE", true), ("on", true), ("0", false), ("nope", false)] {
            std::env::set_var("__UTHREADS_TEST_BOOL__", raw);
            assert_eq!(env_get_bool("__UTHREADS_TEST_BOOL__", !expected), expected, "value {raw}");
        }
        std::env::remove_var("__UTHREADS_TEST_BOOL__");
    }
}
