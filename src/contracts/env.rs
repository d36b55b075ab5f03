use std::fmt::Display;
use std::str::FromStr;

/// Parses an optional setting, falling back to `default` when it is unset.
/// Unparseable values also fall back, with a warning naming the variable.
pub fn parse_or_default<T>(var: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                var,
                value = %raw,
                default = %default,
                "Ignoring invalid setting, using default"
            );
            default
        }
    }
}
