//! Validation of connection targets.
//!
//! Before any socket is opened the target URL must parse, use one of the
//! transport's schemes, and point at a public host. Loopback, private,
//! link-local and similar internal addresses are refused unless the caller
//! explicitly allows local targets.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

use crate::error::TransportError;

/// Schemes accepted by the WebSocket transport.
pub const WEBSOCKET_SCHEMES: &[&str] = &["ws", "wss"];

/// Schemes accepted by the HTTP transport.
pub const HTTP_SCHEMES: &[&str] = &["http", "https"];

/// Parse and check `raw` against `schemes`.
///
/// With `allow_local` set, only the URL shape and scheme are checked.
pub fn validate_target(raw: &str, schemes: &[&str], allow_local: bool) -> Result<Url, TransportError> {
    let url = Url::parse(raw).map_err(|e| TransportError::invalid_target(raw, e.to_string()))?;

    if !schemes.contains(&url.scheme()) {
        return Err(TransportError::invalid_target(
            raw,
            format!(
                "scheme '{}' not allowed, expected one of {}",
                url.scheme(),
                schemes.join(", ")
            ),
        ));
    }

    let Some(host) = url.host() else {
        return Err(TransportError::invalid_target(raw, "missing host"));
    };

    if allow_local {
        return Ok(url);
    }

    let internal = match host {
        Host::Domain(domain) => is_internal_domain(domain),
        Host::Ipv4(ip) => is_internal_v4(ip),
        Host::Ipv6(ip) => is_internal_v6(ip),
    };
    if internal {
        return Err(TransportError::invalid_target(
            raw,
            "loopback and internal-network targets are not allowed",
        ));
    }

    Ok(url)
}

/// Whether `ip` belongs to a loopback, private or otherwise internal range.
#[must_use]
pub fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => is_internal_v6(v6),
    }
}

fn is_internal_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    domain == "localhost"
        || domain.ends_with(".localhost")
        || domain.ends_with(".local")
        || domain.ends_with(".internal")
        || domain.ends_with(".localdomain")
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        // 100.64.0.0/10 shared address space
        || (a == 100 && (64..128).contains(&b))
        // 0.0.0.0/8
        || a == 0
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_internal_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_public_targets() {
        assert!(validate_target("wss://mcp.example.com/ws", WEBSOCKET_SCHEMES, false).is_ok());
        assert!(validate_target("https://93.184.216.34/mcp", HTTP_SCHEMES, false).is_ok());
        assert!(validate_target("ws://[2606:4700::1111]:8080", WEBSOCKET_SCHEMES, false).is_ok());
    }

    #[test]
    fn test_rejects_malformed_and_wrong_scheme() {
        assert!(validate_target("not a url", WEBSOCKET_SCHEMES, false).is_err());
        assert!(validate_target("https://example.com", WEBSOCKET_SCHEMES, false).is_err());
        assert!(validate_target("ftp://example.com", HTTP_SCHEMES, true).is_err());
        assert!(validate_target("wss://example.com", HTTP_SCHEMES, false).is_err());
    }

    #[test]
    fn test_rejects_internal_targets() {
        for raw in [
            "ws://localhost:8080",
            "ws://api.localhost",
            "ws://127.0.0.1:9000",
            "ws://10.1.2.3",
            "ws://172.16.0.1",
            "ws://192.168.1.10",
            "ws://169.254.169.254/latest",
            "ws://0.0.0.0",
            "ws://100.64.0.1",
            "ws://[::1]:8080",
            "ws://[fd00::1]",
            "ws://[fe80::1]",
            "ws://[::ffff:127.0.0.1]",
            "ws://metadata.google.internal",
            "ws://printer.local",
        ] {
            let err = validate_target(raw, WEBSOCKET_SCHEMES, false).unwrap_err();
            assert!(
                matches!(err, TransportError::InvalidTarget { .. }),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_allow_local_bypasses_host_checks() {
        assert!(validate_target("ws://127.0.0.1:9000", WEBSOCKET_SCHEMES, true).is_ok());
        assert!(validate_target("http://localhost:3000/mcp", HTTP_SCHEMES, true).is_ok());
    }
}
