//! Environment variable loading utilities

use crate::error::{PlanError, Result};
use std::env;
use std::str::FromStr;

/// Load an environment variable as a string
///
/// * `Ok(Some(value))` if the variable exists
/// * `Ok(None)` if it doesn't
/// * `Err` if it exists but is not valid UTF-8
pub fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(PlanError::Configuration(format!(
            "Environment variable {} contains invalid UTF-8",
            key
        ))),
    }
}

/// Load and parse an environment variable
///
/// ```rust
/// use singlerun_core::config::get_env_parse;
///
/// let timeout: Option<u64> = get_env_parse("SINGLERUN_DOC_UNSET_TIMEOUT")?;
/// assert!(timeout.is_none());
/// # Ok::<(), singlerun_core::PlanError>(())
/// ```
pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(val) => {
            let parsed = val.trim().parse::<T>().map_err(|e| {
                PlanError::Configuration(format!(
                    "Failed to parse environment variable {}: {}",
                    key, e
                ))
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Build a prefixed environment variable name
///
/// ```rust
/// use singlerun_core::config::build_env_key;
///
/// assert_eq!(build_env_key("SINGLERUN_", "tenant"), "SINGLERUN_TENANT");
/// ```
pub fn build_env_key(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.to_uppercase())
}
