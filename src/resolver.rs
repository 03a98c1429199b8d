//! Per-question resolution
//!
//! Maps one question to a [`ResolutionOutcome`] by turning its name into a
//! registry alias and looking it up.

use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::dns::common::validate_labels;
use crate::dns::enums::ResponseCode;
use crate::dns::question::DNSQuestion;
use crate::dns::resource::DNSResource;
use crate::error::ResolveError;
use crate::registry::{AliasLookup, AliasLookupResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Answer(DNSResource),
    NoAnswer,
    Error(ResponseCode),
}

impl ResolutionOutcome {
    /// Response code this outcome contributes to the message
    pub fn code(&self) -> ResponseCode {
        match self {
            ResolutionOutcome::Answer(_) | ResolutionOutcome::NoAnswer => ResponseCode::NoError,
            ResolutionOutcome::Error(code) => *code,
        }
    }
}

/// Registry reply classes that end the retry loop
enum Settled {
    Found(std::net::Ipv6Addr),
    NotFound,
    TransportFailure,
}

struct MalformedReply;

pub struct QueryResolver {
    config: Arc<ServerConfig>,
    registry: Arc<dyn AliasLookup>,
}

impl QueryResolver {
    pub fn new(config: Arc<ServerConfig>, registry: Arc<dyn AliasLookup>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn resolve_query(
        &self,
        question: &DNSQuestion,
    ) -> Result<ResolutionOutcome, ResolveError> {
        let labels = question.lowercase_labels();
        if labels.len() < 2 {
            debug!("Question {:?} has fewer than two labels", question.name());
            return Ok(ResolutionOutcome::Error(ResponseCode::ServerFailure));
        }

        let tld = &labels[labels.len() - 1];
        // Deeper labels are ignored: every subdomain resolves like its parent.
        let local_label = &labels[labels.len() - 2];

        let Some(alias) = self.config.tlds.alias_for(tld, local_label) else {
            debug!("TLD {:?} is not served", String::from_utf8_lossy(tld));
            return Ok(ResolutionOutcome::Error(ResponseCode::Refused));
        };

        if validate_labels(&question.labels).is_err() {
            return Err(ResolveError::InvalidName {
                name: question.name(),
            });
        }

        let attempts = self.config.registry.malformed_attempts.max(1);
        let retries = FixedInterval::new(Duration::ZERO).take(attempts - 1);
        let settled = RetryIf::spawn(
            retries,
            || self.lookup_once(&alias),
            |_: &MalformedReply| {
                debug!("Malformed registry reply for {}, retrying", alias);
                true
            },
        )
        .await;

        let outcome = match settled {
            Ok(Settled::Found(addr)) => {
                debug!("{} -> {}", question.name(), addr);
                ResolutionOutcome::Answer(DNSResource::aaaa(
                    question.labels.clone(),
                    question.qclass,
                    self.config.ttl,
                    addr,
                ))
            }
            Ok(Settled::NotFound) => ResolutionOutcome::Error(ResponseCode::NameError),
            Ok(Settled::TransportFailure) => ResolutionOutcome::Error(ResponseCode::ServerFailure),
            Err(MalformedReply) => {
                warn!(
                    "Registry replies for alias {} stayed malformed after {} attempts",
                    alias, attempts
                );
                ResolutionOutcome::Error(ResponseCode::ServerFailure)
            }
        };

        Ok(outcome)
    }

    async fn lookup_once(&self, alias: &str) -> Result<Settled, MalformedReply> {
        match self.registry.resolve(alias).await {
            AliasLookupResult::Found(addr) => Ok(Settled::Found(addr)),
            AliasLookupResult::NotFound => Ok(Settled::NotFound),
            AliasLookupResult::TransportFailure => Ok(Settled::TransportFailure),
            AliasLookupResult::Malformed => Err(MalformedReply),
        }
    }
}
