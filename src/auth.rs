//! Auth-domain building blocks: scope sets, redacted secrets, and cached access tokens.

pub mod scope;
pub mod secret;
pub mod token;

pub use scope::*;
pub use secret::*;
pub use token::*;
