use std::str::FromStr;

/// Accepts the level names `error`, `warn`, `info`, `debug` and `trace`, plus
/// `verbose` (debug) and `silly` (trace).
pub fn parse_log_level(value: &str) -> Result<log::Level, String> {
    match value.to_ascii_lowercase().as_str() {
        "verbose" => Ok(log::Level::Debug),
        "silly" => Ok(log::Level::Trace),
        other => log::Level::from_str(other).map_err(|_| {
            format!(
                "invalid log level '{value}' (expected error, warn, info, verbose, debug or silly)"
            )
        }),
    }
}
