use std::{env, str::FromStr};

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads `key` from the environment and parses it. Missing variables yield `Ok(None)`, unparseable ones yield the
/// raw string back in the error so that callers can log it before falling back to a default.
pub fn parse_env_var<T: FromStr>(key: &str) -> Result<Option<T>, String> {
    match env::var(key) {
        Ok(s) => s.trim().parse::<T>().map(Some).map_err(|_| s),
        Err(_) => Ok(None),
    }
}

/// Splits a comma-separated list, dropping empty entries.
pub fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}
