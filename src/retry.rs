//! Retry parameters applied to token-endpoint calls.

// self
use crate::_prelude::*;

/// Retry budget for transient token-endpoint failures.
///
/// Waits grow exponentially from [`min_wait`](Self::min_wait); a larger `Retry-After` hint from
/// the issuer takes precedence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryParams {
	/// Maximum number of retries after the first attempt.
	pub max_retry: u32,
	/// Wait before the first retry.
	#[serde(with = "millis")]
	pub min_wait: StdDuration,
}
impl RetryParams {
	/// Hard ceiling for [`max_retry`](Self::max_retry).
	pub const MAX_RETRY_LIMIT: u32 = 15;
	/// Hard ceiling for a single backoff wait.
	pub const MAX_WAIT: StdDuration = StdDuration::from_secs(120);

	/// Creates parameters with the provided retry count and initial wait.
	pub fn new(max_retry: u32, min_wait: StdDuration) -> Self {
		Self { max_retry: max_retry.min(Self::MAX_RETRY_LIMIT), min_wait }
	}

	/// Parameters that never retry.
	pub fn disabled() -> Self {
		Self { max_retry: 0, ..Self::default() }
	}

	/// Returns the wait before retry number `attempt` (zero-based), honoring `retry_after`.
	pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> StdDuration {
		let factor = 2_u32.saturating_pow(attempt.min(16));
		let exponential = self.min_wait.saturating_mul(factor).min(Self::MAX_WAIT);
		let hinted = retry_after
			.filter(|hint| hint.is_positive())
			.and_then(|hint| StdDuration::try_from(hint).ok())
			.map(|hint| hint.min(Self::MAX_WAIT));

		match hinted {
			Some(hint) if hint > exponential => hint,
			_ => exponential,
		}
	}

	/// Returns `true` when another attempt fits the budget after `attempt` retries.
	pub fn allows(&self, attempt: u32) -> bool {
		attempt < self.max_retry.min(Self::MAX_RETRY_LIMIT)
	}
}
impl Default for RetryParams {
	fn default() -> Self {
		Self { max_retry: 3, min_wait: StdDuration::from_millis(100) }
	}
}

mod millis {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &StdDuration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<StdDuration, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(StdDuration::from_millis(u64::deserialize(deserializer)?))
	}
}
