//! Bearer token issuance and redemption.
//!
//! - [`BearerToken`] - stored access/refresh token pair
//! - [`TokenService`] - authorization code and refresh token exchanges

pub mod bearer;
pub mod service;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

pub use bearer::BearerToken;
pub use service::TokenService;

/// 256 bits from the thread CSPRNG, base64url-encoded (43 characters).
///
/// Used for authorization codes, access tokens and refresh tokens.
#[must_use]
pub fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
