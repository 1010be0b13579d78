//! Normalised geolocation record and IP classification.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::OnceLock;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// Country value reported for loopback and private-network clients.
pub const LOCAL_COUNTRY: &str = "Local";

/// Provider name stamped on the Local sentinel.
pub const LOCAL_PROVIDER: &str = "local";

/// A resolved location. Every field is optional: providers disagree on what
/// they return, and a failed resolution is simply an all-`None` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    /// Name of the provider that produced this record.
    pub provider: Option<String>,
}

impl Location {
    /// The fixed sentinel returned for private and loopback addresses.
    pub fn local() -> Self {
        Self {
            country: Some(LOCAL_COUNTRY.to_string()),
            provider: Some(LOCAL_PROVIDER.to_string()),
            ..Self::default()
        }
    }

    /// `true` when at least one of country / region / city is known.
    pub fn has_geo(&self) -> bool {
        self.country.is_some() || self.region.is_some() || self.city.is_some()
    }
}

/// How an IP string should be treated by the geolocation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpClass {
    /// Loopback, RFC 1918, link-local, unique-local or unspecified.
    Local,
    /// Routable address worth asking a provider about.
    Public(IpAddr),
    /// Not an IP address at all (e.g. the `"unknown"` placeholder).
    Invalid,
}

fn local_networks() -> &'static [IpNet] {
    static NETS: OnceLock<Vec<IpNet>> = OnceLock::new();
    NETS.get_or_init(|| {
        [
            "0.0.0.0/32",
            "10.0.0.0/8",
            "127.0.0.0/8",
            "169.254.0.0/16",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "::/128",
            "::1/128",
            "fc00::/7",
            "fe80::/10",
        ]
        .iter()
        .filter_map(|cidr| IpNet::from_str(cidr).ok())
        .collect()
    })
}

/// Classify `ip` for geolocation purposes.
///
/// IPv4-mapped IPv6 addresses are classified by their embedded IPv4 address.
pub fn classify_ip(ip: &str) -> IpClass {
    let Ok(addr) = IpAddr::from_str(ip.trim()) else {
        return IpClass::Invalid;
    };
    let addr = addr.to_canonical();
    if local_networks().iter().any(|net| net.contains(&addr)) {
        IpClass::Local
    } else {
        IpClass::Public(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_and_private_ranges_are_local() {
        for ip in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.9",
            "172.31.255.255",
            "192.168.1.20",
            "169.254.10.10",
            "::1",
            "fd12:3456::1",
            "fe80::1",
            "::ffff:192.168.0.1",
        ] {
            assert_eq!(classify_ip(ip), IpClass::Local, "{ip} should be local");
        }
    }

    #[test]
    fn routable_addresses_are_public() {
        assert!(matches!(classify_ip("203.0.113.5"), IpClass::Public(_)));
        assert!(matches!(classify_ip("172.32.0.1"), IpClass::Public(_)));
        assert!(matches!(
            classify_ip("2001:4860:4860::8888"),
            IpClass::Public(_)
        ));
    }

    #[test]
    fn placeholder_is_invalid() {
        assert_eq!(classify_ip("unknown"), IpClass::Invalid);
        assert_eq!(classify_ip(""), IpClass::Invalid);
    }

    #[test]
    fn local_sentinel_has_only_country() {
        let local = Location::local();
        assert_eq!(local.country.as_deref(), Some("Local"));
        assert!(local.region.is_none());
        assert!(local.city.is_none());
        assert!(local.has_geo());
        assert!(!Location::default().has_geo());
    }
}
