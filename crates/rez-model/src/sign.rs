// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! SigV4 request signing, implemented locally on `sha2` + `hex` so the
//! inference client does not pull in the platform SDK.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            access_key: std::env::var("AWS_ACCESS_KEY_ID")
                .map_err(|_| anyhow::anyhow!("AWS_ACCESS_KEY_ID not set"))?,
            secret_key: std::env::var("AWS_SECRET_ACCESS_KEY")
                .map_err(|_| anyhow::anyhow!("AWS_SECRET_ACCESS_KEY not set"))?,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

/// A signed set of headers for one POST request.
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
}

/// Sign a POST with a JSON body for `service` in `region`.
///
/// `path` must already be percent-encoded the way it will be sent.
pub fn sign_post(
    creds: &Credentials,
    service: &str,
    region: &str,
    host: &str,
    path: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = &amz_date[..8];

    let mut headers: Vec<(&str, &str)> = vec![
        ("content-type", "application/json"),
        ("host", host),
        ("x-amz-date", amz_date.as_str()),
    ];
    if let Some(token) = &creds.session_token {
        headers.push(("x-amz-security-token", token.as_str()));
    }
    headers.sort_by_key(|&(name, _)| name);

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_header_names = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "POST\n{path}\n\n{canonical_headers}\n{signed_header_names}\n{}",
        hex_digest(body)
    );
    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex_digest(canonical_request.as_bytes())
    );

    let key = signing_key(creds.secret_key.as_bytes(), date, region, service);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope},SignedHeaders={signed_header_names},Signature={signature}",
            creds.access_key
        ),
        amz_date,
        security_token: creds.session_token.clone(),
    }
}

/// Percent-encode a URL path segment, keeping the unreserved set and `/`.
pub fn encode_path(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn hex_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// HMAC-SHA256 on the raw hash primitive; key sizes here never exceed one
/// block after the initial hash.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    const BLOCK: usize = 64;
    let key = if key.len() > BLOCK {
        Sha256::digest(key).to_vec()
    } else {
        key.to_vec()
    };
    let mut block = [0u8; BLOCK];
    block[..key.len()].copy_from_slice(&key);

    let mut inner = Sha256::new();
    inner.update(block.map(|b| b ^ 0x36));
    inner.update(data);
    let inner = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(block.map(|b| b ^ 0x5c));
    outer.update(inner);
    outer.finalize().to_vec()
}

fn signing_key(secret: &[u8], date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(&[b"AWS4", secret].concat(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
