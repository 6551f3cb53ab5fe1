//! OAuth 2.0 authorization code grant with PKCE.
//!
//! - [`authorize`] - authorization endpoint request and redirect types
//! - [`pkce`] - code challenge and verifier handling (`S256` and `plain`)
//! - [`validator`] - per-step request validation
//! - [`service`] - authorization endpoint flow

pub mod authorize;
pub mod code;
pub mod pending;
pub mod pkce;
pub mod service;
pub mod token;
pub mod validator;

pub use authorize::{
    AuthorizationCredentials, AuthorizationError, AuthorizationErrorCode, AuthorizationRequest,
    AuthorizationResponse,
};
pub use code::AuthorizationCode;
pub use pending::PendingAuthorization;
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};
pub use service::{AuthorizationRejection, AuthorizationService, ConsentPrompt};
pub use token::{GrantType, TokenError, TokenErrorCode, TokenRequest, TokenResponse};
pub use validator::{RequestValidator, Validation, ValidationFailure};
