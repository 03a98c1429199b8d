use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DnsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid DNS header")]
    InvalidHeader,

    #[error("Invalid DNS label")]
    InvalidLabel,

    #[error("Invalid label length: {0}")]
    InvalidLabelLength(usize),

    #[error("DNS name too long")]
    NameTooLong,

    #[error("Compression pointer loop in DNS name")]
    CompressionLoop,

    #[error("Invalid record data for {rtype}: {reason}")]
    InvalidRdata { rtype: u16, reason: String },

    #[error("Too many records in section: {0}")]
    SectionTooLarge(usize),
}

impl From<std::io::Error> for DnsError {
    fn from(err: std::io::Error) -> Self {
        DnsError::Io(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid registry URL: {0}")]
    InvalidRegistryUrl(String),

    #[error("Invalid TTL: {0}")]
    InvalidTtl(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid attempt count: {0}")]
    InvalidAttempts(String),

    #[error("Invalid TLD table: {0}")]
    InvalidTld(String),

    #[error("Failed to read config file {path}: {reason}")]
    ReadFile { path: String, reason: String },

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Failures talking to the alias registry. These never reach a DNS client
/// directly; the registry client folds them into a lookup result.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned status {0}")]
    Status(u16),
}

/// A question that cannot be answered at all; aborts the whole response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Question name {name:?} cannot be carried in an answer record")]
    InvalidName { name: String },
}

pub type Result<T> = std::result::Result<T, DnsError>;
