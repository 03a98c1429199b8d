//! Response assembly
//!
//! Resolves every question of a request, folds the per-question codes into
//! the message response code and attaches one synthesized SOA per queried
//! TLD.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::dns::enums::{DNSResourceClass, ResponseCode};
use crate::dns::header::{DNSHeader, Z_AUTHENTIC_DATA};
use crate::dns::resource::{DNSResource, SoaData};
use crate::dns::{DNSPacket, MessageCodec};
use crate::error::Result;
use crate::resolver::{QueryResolver, ResolutionOutcome};

pub struct ResponseAssembler {
    resolver: QueryResolver,
    codec: Arc<dyn MessageCodec>,
}

impl ResponseAssembler {
    pub fn new(resolver: QueryResolver, codec: Arc<dyn MessageCodec>) -> Self {
        Self { resolver, codec }
    }

    fn config(&self) -> &ServerConfig {
        self.resolver.config()
    }

    pub async fn build_response(&self, query: &DNSPacket) -> DNSPacket {
        let mut response = DNSPacket {
            header: response_header(&query.header),
            questions: query.questions.clone(),
            ..Default::default()
        };

        let tlds = &self.config().tlds;
        let single_question = query.questions.len() < 2;
        let mut rcode = ResponseCode::NoError;
        // Lower-cased TLDs in first-seen order
        let mut seen_tlds: Vec<Bytes> = Vec::new();
        // Every SOA carries the class of the last question processed
        let mut soa_class = DNSResourceClass::IN;

        for question in &query.questions {
            soa_class = question.qclass;
            let tld = question.tld();
            if !tlds.supports(&tld) && rcode != ResponseCode::ServerFailure {
                rcode = ResponseCode::Refused;
            }
            if !seen_tlds.contains(&tld) {
                seen_tlds.push(tld);
            }

            if !question.qtype.wants_address() {
                continue;
            }

            let outcome = match self.resolver.resolve_query(question).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Aborting response {}: {}", query.header.id, e);
                    rcode = ResponseCode::ServerFailure;
                    response.answers.clear();
                    seen_tlds.clear();
                    break;
                }
            };

            let code = outcome.code();
            if code != ResponseCode::NoError {
                debug!("{} {:?}: {}", question.name(), question.qtype, code);
            }
            rcode = if single_question {
                code
            } else {
                merge_rcode(rcode, code)
            };

            if let ResolutionOutcome::Answer(record) = outcome {
                response.answers.push(record);
            }
        }

        let serial = soa_serial(chrono::Utc::now().timestamp(), self.config().ttl);
        for tld in seen_tlds {
            response.authorities.push(self.soa_record(tld, soa_class, serial));
        }

        response.header.rcode = rcode.to_u8();
        response
    }

    /// Decodes `request`, builds the response and encodes it.
    ///
    /// Returns `None` when not even a header can be read; an undecodable body
    /// is answered with a bare SERVFAIL.
    pub async fn respond(&self, request: &[u8]) -> Option<Vec<u8>> {
        let response = match self.codec.decode(request) {
            Ok(query) => self.build_response(&query).await,
            Err(e) => match DNSHeader::peek(request) {
                Ok(header) => {
                    debug!("Undecodable message {}: {}", header.id, e);
                    failure_response(&header)
                }
                Err(_) => {
                    debug!("Dropping {} byte message without a header: {}", request.len(), e);
                    return None;
                }
            },
        };

        match self.encode(&response) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Failed to encode response {}: {}", response.header.id, e);
                self.encode(&failure_response(&response.header)).ok()
            }
        }
    }

    pub fn encode(&self, response: &DNSPacket) -> Result<Vec<u8>> {
        self.codec.encode(response)
    }

    fn soa_record(&self, tld: Bytes, class: DNSResourceClass, serial: u32) -> DNSResource {
        let ttl = self.config().ttl;
        let zone: Vec<Bytes> = if tld.is_empty() { Vec::new() } else { vec![tld] };
        DNSResource::soa(
            zone.clone(),
            class,
            ttl,
            SoaData {
                mname: zone,
                rname: Vec::new(),
                serial,
                refresh: ttl,
                retry: ttl,
                expire: ttl,
                minimum: ttl,
            },
        )
    }
}

/// Folds one question's code into the running message code for requests
/// with several questions: SERVFAIL > REFUSED > NXDOMAIN, and NOERROR never
/// overrides what is already there.
pub fn merge_rcode(current: ResponseCode, next: ResponseCode) -> ResponseCode {
    use crate::dns::enums::ResponseCode::*;

    if next == NoError {
        return current;
    }
    match (current, next) {
        (ServerFailure, _) | (_, ServerFailure) => ServerFailure,
        (Refused, _) | (_, Refused) => Refused,
        (NameError, _) | (_, NameError) => NameError,
        (current, next) => {
            warn!("Unexpected response code merge {} + {}", current, next);
            ServerFailure
        }
    }
}

/// SOA serial: whole TTL periods since the epoch.
pub fn soa_serial(now_secs: i64, ttl: u32) -> u32 {
    if ttl == 0 || now_secs <= 0 {
        return 0;
    }
    (now_secs / i64::from(ttl)) as u32
}

fn response_header(query: &DNSHeader) -> DNSHeader {
    DNSHeader {
        id: query.id,
        qr: true,
        opcode: query.opcode,
        aa: true,
        tc: false,
        rd: true,
        ra: true,
        z: Z_AUTHENTIC_DATA,
        rcode: ResponseCode::NoError.to_u8(),
        ..Default::default()
    }
}

fn failure_response(query: &DNSHeader) -> DNSPacket {
    let mut header = response_header(query);
    header.rcode = ResponseCode::ServerFailure.to_u8();
    DNSPacket {
        header,
        ..Default::default()
    }
}
