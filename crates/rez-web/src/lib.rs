// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Outbound HTTPS on behalf of tools.
//!
//! Nothing in this crate touches the network before the URL guard has
//! passed: https only, allowlisted host, no literal IPs, and no hostname
//! that resolves into private, loopback, link-local, or metadata address
//! space.  Redirects are followed manually so every hop is re-guarded.

mod error;
mod executor;
mod guard;
mod jwt;
mod oauth;
mod secrets;

pub use error::WebError;
pub use executor::{HttpOutcome, WebActionExecutor, WebRequest};
pub use guard::UrlGuard;
pub use jwt::{verify as verify_jwt, Jwk, Jwks, JwksCache, VerifiedClaims, JWKS_TTL};
pub use oauth::{OAuthCredentials, TokenCache};
pub use secrets::{SecretCache, SecretSource, StaticSecrets, SECRET_TTL};
