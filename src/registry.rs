//! Alias registry client
//!
//! Looks up alias names over the registry's HTTP API and classifies the reply
//! into an [`AliasLookupResult`].

use async_trait::async_trait;
use serde::Deserialize;
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::RegistryError;

/// `errorCode` the registry uses for an alias that does not exist
pub const ALIAS_NOT_FOUND: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasLookupResult {
    Found(Ipv6Addr),
    NotFound,
    /// Unexpected reply shape or an `aliasURI` that is not an IPv6 literal
    Malformed,
    /// The registry never answered with a success status
    TransportFailure,
}

/// Anything that can resolve an alias name. The query resolver depends on
/// this rather than on the HTTP client.
#[async_trait]
pub trait AliasLookup: Send + Sync {
    async fn resolve(&self, alias: &str) -> AliasLookupResult;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetAliasReply {
    error_code: Option<serde_json::Value>,
    #[serde(rename = "aliasURI")]
    alias_uri: Option<serde_json::Value>,
}

impl GetAliasReply {
    fn classify(&self, alias: &str) -> AliasLookupResult {
        if self
            .error_code
            .as_ref()
            .and_then(serde_json::Value::as_i64)
            == Some(ALIAS_NOT_FOUND)
        {
            return AliasLookupResult::NotFound;
        }

        match &self.alias_uri {
            Some(serde_json::Value::String(uri)) => match uri.parse::<Ipv6Addr>() {
                Ok(addr) => AliasLookupResult::Found(addr),
                Err(_) => {
                    warn!("Alias {} maps to malformed IPv6 address {:?}", alias, uri);
                    AliasLookupResult::Malformed
                }
            },
            Some(other) => {
                warn!("Alias {} has non-string aliasURI {}", alias, other);
                AliasLookupResult::Malformed
            }
            None => {
                debug!("Registry reply for {} has neither aliasURI nor known errorCode", alias);
                AliasLookupResult::Malformed
            }
        }
    }
}

/// Classifies a registry body; a body that is not a JSON object is malformed.
pub fn classify_reply(alias: &str, body: &[u8]) -> AliasLookupResult {
    match serde_json::from_slice::<GetAliasReply>(body) {
        Ok(reply) => reply.classify(alias),
        Err(e) => {
            warn!("Registry reply for {} is not usable JSON: {}", alias, e);
            AliasLookupResult::Malformed
        }
    }
}

/// HTTP client for the registry `getAlias` request
#[derive(Debug, Clone)]
pub struct AliasResolver {
    client: reqwest::Client,
    url: String,
    http_attempts: usize,
    lookup_permits: Arc<Semaphore>,
}

impl AliasResolver {
    pub fn new(config: &RegistryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("nxtdns/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: config.url.clone(),
            http_attempts: config.http_attempts.max(1),
            lookup_permits: Arc::new(Semaphore::new(config.max_concurrent_lookups.max(1))),
        }
    }

    /// One POST; any status other than 200 is an error.
    async fn post_get_alias(&self, alias: &str) -> Result<bytes::Bytes, RegistryError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("requestType", "getAlias"), ("aliasName", alias)])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(RegistryError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl AliasLookup for AliasResolver {
    async fn resolve(&self, alias: &str) -> AliasLookupResult {
        // Closed only if the semaphore is dropped, which cannot happen while
        // `self` is alive.
        let Ok(_permit) = self.lookup_permits.acquire().await else {
            return AliasLookupResult::TransportFailure;
        };

        let retries = FixedInterval::new(Duration::ZERO).take(self.http_attempts - 1);
        let body = RetryIf::spawn(
            retries,
            || self.post_get_alias(alias),
            |e: &RegistryError| {
                debug!("Registry request for {} failed, retrying: {}", alias, e);
                true
            },
        )
        .await;

        match body {
            Ok(body) => classify_reply(alias, &body),
            Err(e) => {
                warn!(
                    "Registry lookup for {} failed after {} attempts: {}",
                    alias, self.http_attempts, e
                );
                AliasLookupResult::TransportFailure
            }
        }
    }
}
