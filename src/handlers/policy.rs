//! Backpressure policy parsing helpers.
//!
//! Shared by the builder and the INI loader so both accept the same strings.

use std::time::Duration;

use crate::socket_handler::BackpressurePolicy;

use super::HandlerBuildError;

const VALID_POLICIES: &str = "block, drop-oldest, drop-newest, timeout:N";

/// Parses a policy string into a [`BackpressurePolicy`] and optional
/// enqueue timeout.
///
/// # Accepted input formats
/// - "block": Block until space is available.
/// - "drop-oldest": Evict the oldest queued record.
/// - "drop-newest" (or "drop"): Discard the incoming record.
/// - "timeout:N": Block up to N milliseconds, then fail the enqueue.
///
/// Underscores are accepted in place of hyphens and matching ignores case
/// and surrounding whitespace.
///
/// # Errors
/// Returns [`HandlerBuildError::InvalidConfig`] if the input is not a valid
/// policy.
///
/// # Examples
/// ```
/// use logship::{handlers::parse_policy_string, BackpressurePolicy};
/// let (policy, timeout) = parse_policy_string("timeout:250").unwrap();
/// assert_eq!(policy, BackpressurePolicy::Block);
/// assert_eq!(timeout, Some(std::time::Duration::from_millis(250)));
/// ```
pub fn parse_policy_string(
    policy: &str,
) -> Result<(BackpressurePolicy, Option<Duration>), HandlerBuildError> {
    let normalized = policy.trim().to_ascii_lowercase().replace('_', "-");

    if let Some(rest) = normalized.strip_prefix("timeout:") {
        let ms: i64 = rest.trim().parse().map_err(|_| {
            HandlerBuildError::InvalidConfig(
                "timeout must be a positive integer (N in 'timeout:N')".into(),
            )
        })?;
        if ms <= 0 {
            return Err(HandlerBuildError::InvalidConfig(
                "timeout must be greater than zero".into(),
            ));
        }
        return Ok((
            BackpressurePolicy::Block,
            Some(Duration::from_millis(ms.unsigned_abs())),
        ));
    }

    match normalized.as_str() {
        "block" => Ok((BackpressurePolicy::Block, None)),
        "drop-oldest" => Ok((BackpressurePolicy::DropOldest, None)),
        "drop-newest" | "drop" => Ok((BackpressurePolicy::DropNewest, None)),
        "timeout" => Err(HandlerBuildError::InvalidConfig(
            "timeout requires a positive integer N, use 'timeout:N'".into(),
        )),
        _ => Err(HandlerBuildError::InvalidConfig(format!(
            "invalid backpressure policy '{normalized}'. Valid options are: {VALID_POLICIES}"
        ))),
    }
}
