//! Geolocation provider adapters.
//!
//! Every adapter turns an IP into a normalized [`Location`]. HTTP adapters
//! share one `reqwest::Client` and differ only in URL, headers and the
//! function that reads their JSON shape.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use folio_core::config::Config;
use folio_core::location::Location;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("response carried no location")]
    NoData,

    #[error("provider refused lookup: {0}")]
    Rejected(String),

    #[error("database lookup failed: {0}")]
    Database(String),
}

#[async_trait]
pub trait GeoProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, ip: IpAddr, timeout: Duration) -> Result<Location, GeoError>;
}

type ParseFn = fn(&Value) -> Result<Location, GeoError>;

/// A JSON-over-HTTP geolocation service.
pub struct HttpProvider {
    name: String,
    /// URL with an `{ip}` placeholder.
    url_template: String,
    headers: Vec<(String, String)>,
    parse: ParseFn,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        parse: ParseFn,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            headers: Vec::new(),
            parse,
            client,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn ip_api(client: reqwest::Client) -> Self {
        Self::new("ip-api", "http://ip-api.com/json/{ip}", parse_ip_api, client)
    }

    pub fn ipapi_co(client: reqwest::Client) -> Self {
        Self::new("ipapi.co", "https://ipapi.co/{ip}/json/", parse_ipapi_co, client)
    }

    pub fn ipinfo(client: reqwest::Client, token: Option<&str>) -> Self {
        let provider = Self::new("ipinfo", "https://ipinfo.io/{ip}/json", parse_ipinfo, client);
        match token {
            Some(token) => provider.with_header("Authorization", format!("Bearer {token}")),
            None => provider,
        }
    }

    pub fn ipwho_is(client: reqwest::Client) -> Self {
        Self::new("ipwho.is", "https://ipwho.is/{ip}", parse_ipwho_is, client)
    }

    fn url_for(&self, ip: IpAddr) -> String {
        self.url_template.replace("{ip}", &ip.to_string())
    }
}

#[async_trait]
impl GeoProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, ip: IpAddr, timeout: Duration) -> Result<Location, GeoError> {
        let mut request = self.client.get(self.url_for(ip)).timeout(timeout);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GeoError::Timeout
            } else {
                GeoError::Parse(e.to_string())
            }
        })?;

        let mut location = (self.parse)(&body)?;
        if !location.has_geo() {
            return Err(GeoError::NoData);
        }
        location.provider = Some(self.name.clone());
        Ok(location)
    }
}

fn from_reqwest(e: reqwest::Error) -> GeoError {
    if e.is_timeout() {
        GeoError::Timeout
    } else {
        GeoError::Http(e)
    }
}

/// Non-empty string field, trimmed.
fn text(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(body: &Value, key: &str) -> Option<f64> {
    body.get(key).and_then(Value::as_f64)
}

/// Country display name, keyed on the ISO 3166-1 alpha-2 code when one is
/// present so every provider reports the same country the same way.
fn country_name(code: Option<&str>, name: Option<String>) -> Option<String> {
    code.map(str::trim)
        .and_then(|code| celes::Country::from_alpha2(&code.to_ascii_uppercase()).ok())
        .map(|country| country.long_name.to_string())
        .or(name)
}

fn ensure_object(body: &Value) -> Result<(), GeoError> {
    if body.is_object() {
        Ok(())
    } else {
        Err(GeoError::Parse("expected a JSON object".to_string()))
    }
}

/// `{"status":"success","country":..,"countryCode":..,"regionName":..,"city":..,
/// "lat":..,"lon":..}`
pub fn parse_ip_api(body: &Value) -> Result<Location, GeoError> {
    ensure_object(body)?;
    if body.get("status").and_then(Value::as_str) != Some("success") {
        let reason = text(body, "message").unwrap_or_else(|| "status not success".to_string());
        return Err(GeoError::Rejected(reason));
    }
    Ok(Location {
        country: country_name(text(body, "countryCode").as_deref(), text(body, "country")),
        region: text(body, "regionName"),
        city: text(body, "city"),
        latitude: number(body, "lat"),
        longitude: number(body, "lon"),
        timezone: text(body, "timezone"),
        isp: text(body, "isp"),
        provider: None,
    })
}

/// `{"country_code":..,"country_name":..,"region":..,"city":..,"latitude":..}` or
/// `{"error":true,"reason":..}`.
pub fn parse_ipapi_co(body: &Value) -> Result<Location, GeoError> {
    ensure_object(body)?;
    if body.get("error").and_then(Value::as_bool) == Some(true) {
        let reason = text(body, "reason").unwrap_or_else(|| "error".to_string());
        return Err(GeoError::Rejected(reason));
    }
    Ok(Location {
        country: country_name(
            text(body, "country_code").as_deref(),
            text(body, "country_name"),
        ),
        region: text(body, "region"),
        city: text(body, "city"),
        latitude: number(body, "latitude"),
        longitude: number(body, "longitude"),
        timezone: text(body, "timezone"),
        isp: text(body, "org"),
        provider: None,
    })
}

/// `{"country":"PL","region":..,"city":..,"loc":"lat,lon","org":..}`; the
/// country is an ISO code only.
/// Reserved ranges come back as `{"bogon":true}`.
pub fn parse_ipinfo(body: &Value) -> Result<Location, GeoError> {
    ensure_object(body)?;
    if body.get("bogon").and_then(Value::as_bool) == Some(true) {
        return Err(GeoError::Rejected("bogon address".to_string()));
    }
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(GeoError::Rejected(message.to_string()));
    }

    let (latitude, longitude) = text(body, "loc")
        .and_then(|loc| {
            let (lat, lon) = loc.split_once(',')?;
            Some((lat.trim().parse::<f64>().ok()?, lon.trim().parse::<f64>().ok()?))
        })
        .map_or((None, None), |(lat, lon)| (Some(lat), Some(lon)));

    Ok(Location {
        country: country_name(text(body, "country").as_deref(), None),
        region: text(body, "region"),
        city: text(body, "city"),
        latitude,
        longitude,
        timezone: text(body, "timezone"),
        isp: text(body, "org"),
        provider: None,
    })
}

/// `{"success":true,"country":..,"country_code":..,"region":..,"city":..,
/// "timezone":{"id":..},"connection":{"isp":..}}`.
pub fn parse_ipwho_is(body: &Value) -> Result<Location, GeoError> {
    ensure_object(body)?;
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        let reason = text(body, "message").unwrap_or_else(|| "success=false".to_string());
        return Err(GeoError::Rejected(reason));
    }
    let nested = |pointer: &str| {
        body.pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Ok(Location {
        country: country_name(text(body, "country_code").as_deref(), text(body, "country")),
        region: text(body, "region"),
        city: text(body, "city"),
        latitude: number(body, "latitude"),
        longitude: number(body, "longitude"),
        timezone: nested("/timezone/id"),
        isp: nested("/connection/isp"),
        provider: None,
    })
}

/// Lookups against a local MaxMind city database.
pub struct MaxMindProvider {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindProvider {
    pub fn open(path: &Path) -> Result<Self, GeoError> {
        let reader = maxminddb::Reader::open_readfile(path)
            .map_err(|e| GeoError::Database(e.to_string()))?;
        Ok(Self { reader })
    }

    fn lookup_city(&self, ip: IpAddr) -> Result<Location, GeoError> {
        let record: maxminddb::geoip2::City = self
            .reader
            .lookup(ip)
            .map_err(|e| GeoError::Database(e.to_string()))?;

        let country = record.country.as_ref().and_then(|c| {
            let name = c
                .names
                .as_ref()
                .and_then(|names| names.get("en"))
                .map(|s| s.to_string());
            country_name(c.iso_code, name)
        });

        let region = record
            .subdivisions
            .as_ref()
            .and_then(|subs| subs.first())
            .and_then(|sub| sub.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string());

        let city = record
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .map(|s| s.to_string());

        let location = record.location.as_ref();

        Ok(Location {
            country,
            region,
            city,
            latitude: location.and_then(|l| l.latitude),
            longitude: location.and_then(|l| l.longitude),
            timezone: location.and_then(|l| l.time_zone).map(|s| s.to_string()),
            isp: None,
            provider: Some("maxmind".to_string()),
        })
    }
}

#[async_trait]
impl GeoProvider for MaxMindProvider {
    fn name(&self) -> &str {
        "maxmind"
    }

    async fn lookup(&self, ip: IpAddr, _timeout: Duration) -> Result<Location, GeoError> {
        let location = self.lookup_city(ip)?;
        if location.has_geo() {
            Ok(location)
        } else {
            Err(GeoError::NoData)
        }
    }
}

/// The standard provider chain: local database first when present, then
/// the public HTTP services.
pub fn default_providers(config: &Config, client: reqwest::Client) -> Vec<Box<dyn GeoProvider>> {
    let mut providers: Vec<Box<dyn GeoProvider>> = Vec::new();

    let path = Path::new(&config.geo.geoip_path);
    if path.exists() {
        match MaxMindProvider::open(path) {
            Ok(provider) => {
                info!(path = %config.geo.geoip_path, "GeoIP database loaded");
                providers.push(Box::new(provider));
            }
            Err(e) => warn!(path = %config.geo.geoip_path, error = %e, "GeoIP database unreadable"),
        }
    } else {
        warn!(
            path = %config.geo.geoip_path,
            "GeoIP database not found; using HTTP providers only"
        );
    }

    providers.push(Box::new(HttpProvider::ip_api(client.clone())));
    providers.push(Box::new(HttpProvider::ipapi_co(client.clone())));
    providers.push(Box::new(HttpProvider::ipinfo(
        client.clone(),
        config.geo.ipinfo_token.as_deref(),
    )));
    providers.push(Box::new(HttpProvider::ipwho_is(client)));
    providers
}
