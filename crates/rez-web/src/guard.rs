// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The SSRF guard.  Every outbound URL passes here before any socket is
//! opened, and again on every redirect hop.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use reqwest::Url;
use tracing::warn;

use crate::error::WebError;

/// Static allowlist plus address-class checks.
#[derive(Debug, Clone)]
pub struct UrlGuard {
    allowed_hosts: Vec<String>,
}

impl UrlGuard {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Full guard: syntactic checks, then resolve the hostname and reject
    /// if any resolved address is off-limits.
    pub async fn check(&self, raw: &str) -> Result<Url, WebError> {
        let url = self.check_static(raw)?;
        let host = url.host_str().expect("checked in static pass").to_string();
        let port = url.port_or_known_default().unwrap_or(443);

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| WebError::Transient(format!("dns lookup for {host}: {e}")))?
            .collect();
        self.check_resolved(&url, addrs.iter().map(|a| a.ip()))
    }

    /// Everything that can be checked without touching the resolver.
    pub fn check_static(&self, raw: &str) -> Result<Url, WebError> {
        let url =
            Url::parse(raw).map_err(|e| WebError::Forbidden(format!("unparseable url: {e}")))?;

        if url.scheme() != "https" {
            return Err(WebError::Forbidden(format!(
                "scheme {:?} not allowed, https only",
                url.scheme()
            )));
        }

        // `domain()` is None for both literal-IP hosts and host-less URLs;
        // split the two for a precise error.
        let host = match url.domain() {
            Some(domain) => domain.to_ascii_lowercase(),
            None if url.host_str().is_some() => {
                return Err(WebError::Forbidden("literal IP addresses not allowed".into()));
            }
            None => return Err(WebError::Forbidden("url has no host".into())),
        };

        if !self.allowed_hosts.iter().any(|allowed| *allowed == host) {
            warn!(%host, "host not in allowlist");
            return Err(WebError::Forbidden(format!("host {host:?} not in allowlist")));
        }

        Ok(url)
    }

    /// Reject a URL whose hostname resolved into forbidden address space.
    pub fn check_resolved(
        &self,
        url: &Url,
        addrs: impl IntoIterator<Item = IpAddr>,
    ) -> Result<Url, WebError> {
        let mut any = false;
        for addr in addrs {
            any = true;
            if is_forbidden_addr(addr) {
                warn!(host = url.host_str().unwrap_or(""), %addr, "host resolves to forbidden address");
                return Err(WebError::Forbidden(format!(
                    "host resolves to forbidden address {addr}"
                )));
            }
        }
        if !any {
            return Err(WebError::Transient("hostname resolved to no addresses".into()));
        }
        Ok(url.clone())
    }
}

/// Private, loopback, link-local (which covers the 169.254.169.254 metadata
/// endpoint), and their v6 equivalents, plus the v6 metadata address.
fn is_forbidden_addr(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // 100.64.0.0/10 carrier-grade NAT space
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_forbidden_addr(IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                // fe80::/10 link-local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fd00:ec2::254 cloud metadata
                || v6 == "fd00:ec2::254".parse::<std::net::Ipv6Addr>().unwrap()
        }
    }
}

/// The classic cloud metadata endpoint, for tests and documentation.
#[allow(dead_code)]
const METADATA_V4: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> UrlGuard {
        UrlGuard::new(vec![
            "birdsfoot.cps.golf".into(),
            "api.weather.gov".into(),
        ])
    }

    // ── Static checks ─────────────────────────────────────────────────────────

    #[test]
    fn allowlisted_https_url_passes() {
        assert!(guard()
            .check_static("https://birdsfoot.cps.golf/api/SearchTeeTimes")
            .is_ok());
    }

    #[test]
    fn http_scheme_rejected() {
        let err = guard()
            .check_static("http://birdsfoot.cps.golf/api")
            .unwrap_err();
        assert!(matches!(err, WebError::Forbidden(_)));
    }

    #[test]
    fn unknown_host_rejected() {
        let err = guard().check_static("https://attacker.example/").unwrap_err();
        assert!(matches!(err, WebError::Forbidden(ref m) if m.contains("allowlist")));
    }

    #[test]
    fn literal_ipv4_rejected_even_if_allowlisted() {
        let g = UrlGuard::new(vec!["8.8.8.8".into()]);
        let err = g.check_static("https://8.8.8.8/x").unwrap_err();
        assert!(matches!(err, WebError::Forbidden(ref m) if m.contains("literal IP")));
    }

    #[test]
    fn literal_ipv6_rejected() {
        let err = guard().check_static("https://[::1]/x").unwrap_err();
        assert!(matches!(err, WebError::Forbidden(_)));
    }

    #[test]
    fn host_match_is_case_insensitive() {
        assert!(guard().check_static("https://BIRDSFOOT.cps.golf/api").is_ok());
    }

    #[test]
    fn subdomain_of_allowlisted_host_rejected() {
        let err = guard()
            .check_static("https://evil.birdsfoot.cps.golf/")
            .unwrap_err();
        assert!(matches!(err, WebError::Forbidden(_)));
    }

    #[test]
    fn garbage_url_rejected() {
        assert!(matches!(
            guard().check_static("not a url").unwrap_err(),
            WebError::Forbidden(_)
        ));
    }

    // ── Address classes ───────────────────────────────────────────────────────

    #[test]
    fn public_addresses_pass() {
        for a in ["93.184.216.34", "2606:2800:220:1:248:1893:25c8:1946"] {
            assert!(!is_forbidden_addr(a.parse().unwrap()), "{a}");
        }
    }

    #[test]
    fn private_ranges_forbidden() {
        for a in ["10.0.0.1", "172.16.5.5", "192.168.1.1", "100.64.0.1"] {
            assert!(is_forbidden_addr(a.parse().unwrap()), "{a}");
        }
    }

    #[test]
    fn loopback_forbidden() {
        assert!(is_forbidden_addr("127.0.0.1".parse().unwrap()));
        assert!(is_forbidden_addr("::1".parse().unwrap()));
    }

    #[test]
    fn metadata_endpoints_forbidden() {
        assert!(is_forbidden_addr(IpAddr::V4(METADATA_V4)));
        assert!(is_forbidden_addr("fd00:ec2::254".parse().unwrap()));
    }

    #[test]
    fn link_local_forbidden() {
        assert!(is_forbidden_addr("169.254.0.7".parse().unwrap()));
        assert!(is_forbidden_addr("fe80::1".parse().unwrap()));
    }

    #[test]
    fn v4_mapped_v6_unwraps_to_v4_rules() {
        assert!(is_forbidden_addr("::ffff:192.168.0.1".parse().unwrap()));
        assert!(!is_forbidden_addr("::ffff:93.184.216.34".parse().unwrap()));
    }

    // ── Resolved checks ───────────────────────────────────────────────────────

    #[test]
    fn resolved_private_address_rejected() {
        let g = guard();
        let url = g.check_static("https://birdsfoot.cps.golf/").unwrap();
        let err = g
            .check_resolved(&url, ["10.0.0.9".parse::<IpAddr>().unwrap()])
            .unwrap_err();
        assert!(matches!(err, WebError::Forbidden(_)));
    }

    #[test]
    fn one_bad_address_among_good_rejects() {
        let g = guard();
        let url = g.check_static("https://birdsfoot.cps.golf/").unwrap();
        let addrs: Vec<IpAddr> = vec![
            "93.184.216.34".parse().unwrap(),
            "169.254.169.254".parse().unwrap(),
        ];
        assert!(g.check_resolved(&url, addrs).is_err());
    }

    #[test]
    fn all_public_addresses_pass_resolution() {
        let g = guard();
        let url = g.check_static("https://birdsfoot.cps.golf/").unwrap();
        let addrs: Vec<IpAddr> = vec!["93.184.216.34".parse().unwrap()];
        assert!(g.check_resolved(&url, addrs).is_ok());
    }

    #[test]
    fn empty_resolution_is_transient() {
        let g = guard();
        let url = g.check_static("https://birdsfoot.cps.golf/").unwrap();
        assert!(matches!(
            g.check_resolved(&url, Vec::<IpAddr>::new()).unwrap_err(),
            WebError::Transient(_)
        ));
    }
}
