//! Login flow for the Scratch accounts endpoints.
//!
//! Produces the identity the cloud session connects with: a CSRF
//! token is fetched, the login POST exchanges credentials for a session
//! cookie and API token, and the stored [`Authorisation`] backs the
//! [`CredentialProvider`](scratchkit_core::CredentialProvider) contract.
//!
//! Resource APIs (users, projects, studios, comments) are deliberately
//! not wrapped here; this crate only deals in identity.

pub mod client;
pub mod errors;
pub mod types;

pub use client::AuthClient;
pub use errors::AuthError;
pub use types::{Authorisation, SessionUser};
