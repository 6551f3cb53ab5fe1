//! HTTP handlers for the OAuth endpoints.
//!
//! - [`authorize_get`] / [`authorize_post`] - `/oauth/authorize`
//! - [`token_handler`] - `/oauth/token`

pub mod authorize;
pub mod templates;
pub mod token;

pub use authorize::{AuthorizeState, ConsentForm, authorize_get, authorize_post};
pub use token::{TokenState, token_handler};
