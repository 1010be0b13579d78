use axum::http::HeaderMap;

/// Placeholder returned when no proxy header names the client.
pub const UNKNOWN_IP: &str = "unknown";

/// Extract the client IP from proxy headers.
///
/// Precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// literal `"unknown"`. An IPv4-mapped IPv6 prefix (`::ffff:`) is stripped.
/// The value is not validated; downstream code treats it as opaque.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .map(strip_ipv4_mapped_prefix)
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

fn strip_ipv4_mapped_prefix(ip: &str) -> String {
    const PREFIX: &str = "::ffff:";
    match ip.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => ip[PREFIX.len()..].to_string(),
        _ => ip.to_string(),
    }
}
