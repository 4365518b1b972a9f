//! # BlockShare Auth
//!
//! Client for the account backend that sits beside the wallet session:
//! login, registration, token verification, and profile changes.
//!
//! Forms are validated locally first; invalid input never reaches the
//! network. A successful login or registration stores the token and account
//! details in the [`ClientStore`](blockshare_core::ClientStore) under the
//! flat `userToken`, `userId`, `userEmail`, and `username` keys.

pub mod client;
pub mod error;
pub mod session;
pub mod validation;

pub use client::{AuthClient, AuthConfig, DEFAULT_AUTH_BASE_URL, VerifiedToken};
pub use error::AuthError;
pub use session::{AuthSession, DEFAULT_USERNAME, TokenClaims};
pub use validation::RegisterForm;
