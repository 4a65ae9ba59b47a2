//! Credential-to-transport composition for relationship-based authorization SDKs.
//!
//! Static API tokens ride along as a default `Authorization` header. OAuth 2.0 client
//! credentials wrap the caller's transport in a token-refreshing layer with a single-flight
//! cache, and the wrapped transport's timeout, redirect policy, and cookie jar carry over.
//!
//! ```no_run
//! use fga_credentials::{
//! 	ApiClient, ClientConfiguration, CredentialConfig, CredentialMethod, Credentials,
//! };
//!
//! # fn main() -> fga_credentials::error::Result<()> {
//! let credentials = Credentials::new(
//! 	CredentialMethod::ClientCredentials,
//! 	CredentialConfig::client_credentials("cid", "sec", "issuer.example")
//! 		.with_audience("https://api.fga.example/"),
//! )?;
//! let client = ApiClient::from_configuration(
//! 	ClientConfiguration::new("https://api.fga.example").with_credentials(credentials),
//! )?;
//!
//! assert_eq!(client.configuration().api_url.as_str(), "https://api.fga.example/");
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod retry;

pub use client::ApiClient;
pub use config::{ClientConfiguration, ResolvedConfiguration};
pub use credentials::{
	CredentialConfig, CredentialMethod, Credentials, FetchContext, HeaderOverride, Resolution,
};
pub use http::{RedirectPolicy, ReqwestTransport, SharedTransport, Transport, TransportSettings};
pub use retry::RetryParams;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
