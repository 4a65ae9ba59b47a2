//! Cancellation and deadline context for token fetches.

// std
use std::time::Instant;
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, error::TransientError};

/// Cancellation token and/or deadline that bound token fetches.
///
/// The context never influences validation or resolution; it is consulted only when the
/// token-refreshing transport calls the token endpoint.
#[derive(Clone, Debug, Default)]
pub struct FetchContext {
	cancellation: Option<CancellationToken>,
	deadline: Option<Instant>,
}
impl FetchContext {
	/// Creates an unbounded context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Aborts token fetches once `token` is cancelled.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = Some(token);

		self
	}

	/// Fails token fetches that have not completed by `deadline`.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Fails token fetches that have not completed `timeout` from now.
	pub fn with_timeout(self, timeout: StdDuration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Returns `true` once the cancellation token fired.
	pub fn is_cancelled(&self) -> bool {
		self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
	}

	/// Deadline applied to token fetches, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Drives `fut` to completion unless the context is cancelled or its deadline elapses.
	pub(crate) async fn run<F, T>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		let bounded = async {
			match self.deadline {
				Some(deadline) => tokio::time::timeout_at(deadline.into(), fut)
					.await
					.map_err(|_| Error::from(TransientError::DeadlineExceeded))?,
				None => fut.await,
			}
		};

		match &self.cancellation {
			Some(token) => token.run_until_cancelled(bounded).await.unwrap_or(Err(Error::Cancelled)),
			None => bounded.await,
		}
	}
}
