// self
use crate::{_prelude::*, obs::OpKind};

/// Future returned by [`OpSpan::instrument`]; the input future itself when `tracing` is off.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; the input future itself when `tracing` is off.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// `fga_credentials.op` span around a resolve, compose, or token-fetch call.
///
/// `method` is the credential method the call runs under (`none`, `api_token`, or
/// `client_credentials`). Without the `tracing` feature the type is zero-sized.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens the span for `kind` under credential `method`.
	pub fn new(kind: OpKind, method: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("fga_credentials.op", op = kind.as_str(), method) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, method);

			Self {}
		}
	}

	/// Enters the span until the guard drops; used by the synchronous resolve and compose calls.
	pub fn entered(self) -> OpSpanGuard {
		#[cfg(feature = "tracing")]
		{
			OpSpanGuard { _guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			OpSpanGuard {}
		}
	}

	/// Attaches the span to a token fetch so it follows the future across polls.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Keeps an [`OpSpan`] entered.
pub struct OpSpanGuard {
	#[cfg(feature = "tracing")]
	_guard: tracing::span::EnteredSpan,
}
impl Debug for OpSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OpSpanGuard(..)")
	}
}
