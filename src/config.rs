use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Turns the local label of a query into the alias name looked up in the
/// registry, e.g. `foo` -> `4973foo` for `.hype`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AliasTransform {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl AliasTransform {
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: String::new(),
        }
    }

    pub fn apply(&self, label: &str) -> String {
        format!("{}{}{}", self.prefix, label, self.suffix)
    }
}

/// Supported top-level domains and their alias transforms. Keys are stored
/// lower-case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TldTable {
    entries: HashMap<String, AliasTransform>,
}

impl TldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tld: &str, transform: AliasTransform) -> Self {
        self.insert(tld, transform);
        self
    }

    pub fn insert(&mut self, tld: &str, transform: AliasTransform) {
        self.entries.insert(tld.to_ascii_lowercase(), transform);
    }

    /// Looks up a lower-cased TLD given as raw label octets. A TLD that is
    /// not UTF-8 is never served.
    pub fn get(&self, tld: impl AsRef<[u8]>) -> Option<&AliasTransform> {
        std::str::from_utf8(tld.as_ref())
            .ok()
            .and_then(|tld| self.entries.get(tld))
    }

    pub fn supports(&self, tld: impl AsRef<[u8]>) -> bool {
        self.get(tld).is_some()
    }

    /// Alias name for `label` under `tld`, if the TLD is served. Label
    /// octets that are not UTF-8 become U+FFFD in the alias name.
    pub fn alias_for(&self, tld: impl AsRef<[u8]>, label: impl AsRef<[u8]>) -> Option<String> {
        self.get(tld)
            .map(|transform| transform.apply(&String::from_utf8_lossy(label.as_ref())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tlds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Parses `hype=4973,bit=` style lists, the value being the alias prefix.
    pub fn parse_list(list: &str) -> Result<Self, ConfigError> {
        let mut table = TldTable::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (tld, prefix) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidTld(format!("expected tld=prefix, got {}", entry)))?;
            table.insert(tld.trim(), AliasTransform::prefixed(prefix.trim()));
        }
        Ok(table)
    }
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry API endpoint the lookups are POSTed to
    pub url: String,

    /// HTTP attempts per lookup while the registry does not answer 200
    pub http_attempts: usize,

    /// Lookups per question while the registry reply is malformed
    pub malformed_attempts: usize,

    /// Timeout of a single HTTP request
    pub request_timeout: Duration,

    /// Max registry lookups in flight across all sessions
    pub max_concurrent_lookups: usize,
}

impl RegistryConfig {
    /// Worst-case number of HTTP requests one question can cause.
    pub fn call_budget(&self) -> usize {
        self.http_attempts * self.malformed_attempts
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7876/nxt".to_string(),
            http_attempts: 3,
            malformed_attempts: 3,
            request_timeout: Duration::from_secs(5),
            max_concurrent_lookups: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address both the UDP and TCP listeners bind to
    pub bind_addr: SocketAddr,

    /// TTL of synthesized records, also the SOA timer value
    pub ttl: u32,

    /// Idle time after which an incomplete TCP request is dropped
    pub tcp_idle_timeout: Duration,

    pub registry: RegistryConfig,

    pub tlds: TldTable,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 1053)),
            ttl: 60 * 60 * 24 * 7,
            tcp_idle_timeout: Duration::from_secs(5),
            registry: RegistryConfig::default(),
            tlds: TldTable::new().with("hype", AliasTransform::prefixed("4973")),
        }
    }
}

/// On-disk layout; every field is optional and overrides the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    ttl: Option<u32>,
    #[serde(default)]
    server: FileServerSection,
    #[serde(default)]
    registry: FileRegistrySection,
    tlds: Option<HashMap<String, AliasTransform>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileServerSection {
    bind_addr: Option<String>,
    tcp_idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRegistrySection {
    url: Option<String>,
    http_attempts: Option<usize>,
    malformed_attempts: Option<usize>,
    request_timeout_secs: Option<u64>,
    max_concurrent_lookups: Option<usize>,
}

impl ServerConfig {
    /// Defaults, then the optional TOML file, then `NXTDNS_*` environment
    /// variables. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::load_sources(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Same layering as [`ServerConfig::load`] without the final validation,
    /// for callers that apply further overrides first.
    pub fn load_sources(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            config.apply_toml(&text)?;
        }
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_toml(text)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_toml(&mut self, text: &str) -> Result<(), ConfigError> {
        let file: FileConfig =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(ttl) = file.ttl {
            self.ttl = ttl;
        }
        if let Some(bind_addr) = file.server.bind_addr {
            self.bind_addr = bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress(bind_addr))?;
        }
        if let Some(secs) = file.server.tcp_idle_timeout_secs {
            self.tcp_idle_timeout = Duration::from_secs(secs);
        }
        if let Some(url) = file.registry.url {
            self.registry.url = url;
        }
        if let Some(attempts) = file.registry.http_attempts {
            self.registry.http_attempts = attempts;
        }
        if let Some(attempts) = file.registry.malformed_attempts {
            self.registry.malformed_attempts = attempts;
        }
        if let Some(secs) = file.registry.request_timeout_secs {
            self.registry.request_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = file.registry.max_concurrent_lookups {
            self.registry.max_concurrent_lookups = max;
        }
        if let Some(tlds) = file.tlds {
            let mut table = TldTable::new();
            for (tld, transform) in tlds {
                table.insert(&tld, transform);
            }
            self.tlds = table;
        }
        Ok(())
    }

    /// Applies environment overrides through `lookup`, which maps a variable
    /// name to its value.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_addr) = lookup("NXTDNS_BIND_ADDR") {
            self.bind_addr = bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress(bind_addr))?;
        }

        if let Some(ttl) = lookup("NXTDNS_TTL") {
            self.ttl = ttl.parse().map_err(|_| ConfigError::InvalidTtl(ttl))?;
        }

        if let Some(timeout) = lookup("NXTDNS_TCP_IDLE_TIMEOUT") {
            self.tcp_idle_timeout = parse_secs(&timeout)?;
        }

        if let Some(url) = lookup("NXTDNS_REGISTRY_URL") {
            self.registry.url = url;
        }

        if let Some(attempts) = lookup("NXTDNS_HTTP_ATTEMPTS") {
            self.registry.http_attempts = attempts
                .parse()
                .map_err(|_| ConfigError::InvalidAttempts(attempts))?;
        }

        if let Some(attempts) = lookup("NXTDNS_MALFORMED_ATTEMPTS") {
            self.registry.malformed_attempts = attempts
                .parse()
                .map_err(|_| ConfigError::InvalidAttempts(attempts))?;
        }

        if let Some(timeout) = lookup("NXTDNS_REQUEST_TIMEOUT") {
            self.registry.request_timeout = parse_secs(&timeout)?;
        }

        if let Some(max) = lookup("NXTDNS_MAX_CONCURRENT_LOOKUPS") {
            self.registry.max_concurrent_lookups = max.parse().map_err(|_| {
                ConfigError::ParseError(format!("Invalid max concurrent lookups: {}", max))
            })?;
        }

        if let Some(tlds) = lookup("NXTDNS_TLDS") {
            self.tlds = TldTable::parse_list(&tlds)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl == 0 {
            return Err(ConfigError::InvalidTtl("TTL must be greater than 0".to_string()));
        }

        for (name, timeout) in [
            ("TCP idle timeout", self.tcp_idle_timeout),
            ("registry request timeout", self.registry.request_timeout),
        ] {
            if timeout.is_zero() || timeout.as_secs() > 300 {
                return Err(ConfigError::InvalidTimeout(format!(
                    "{} must be between 1 and 300 seconds",
                    name
                )));
            }
        }

        for (name, attempts) in [
            ("HTTP attempts", self.registry.http_attempts),
            ("malformed reply attempts", self.registry.malformed_attempts),
        ] {
            if !(1..=10).contains(&attempts) {
                return Err(ConfigError::InvalidAttempts(format!(
                    "{} must be between 1 and 10, got {}",
                    name, attempts
                )));
            }
        }

        if self.registry.max_concurrent_lookups == 0 {
            return Err(ConfigError::ParseError(
                "Max concurrent lookups must be greater than 0".to_string(),
            ));
        }

        let url = reqwest::Url::parse(&self.registry.url)
            .map_err(|e| ConfigError::InvalidRegistryUrl(format!("{}: {}", self.registry.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidRegistryUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }

        if self.tlds.is_empty() {
            return Err(ConfigError::InvalidTld("at least one TLD is required".to_string()));
        }
        for tld in self.tlds.tlds() {
            if tld.is_empty() || tld.contains('.') || tld.len() > 63 {
                return Err(ConfigError::InvalidTld(format!(
                    "{:?} is not a single DNS label",
                    tld
                )));
            }
        }

        Ok(())
    }
}

fn parse_secs(value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidTimeout(value.to_string()))
}
