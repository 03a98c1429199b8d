//! Shared helpers for the integration tests: query builders, an in-memory
//! registry and a mock HTTP registry.

#![allow(dead_code)] // Each test binary uses a different subset

use async_trait::async_trait;
use axum::{Form, Router, extract::State, http::StatusCode, routing::post};
use nxtdns::{
    config::{AliasTransform, ServerConfig, TldTable},
    dns::{
        DNSPacket,
        enums::{DNSResourceClass, DNSResourceType},
        header::DNSHeader,
        question::DNSQuestion,
    },
    registry::{AliasLookup, AliasLookupResult},
    server::DnsServer,
};
use std::collections::{HashMap, VecDeque};
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

pub const TEST_TTL: u32 = 3600;

/// Query with one question per `(name, type)` pair
pub fn create_query(id: u16, questions: &[(&str, DNSResourceType)]) -> DNSPacket {
    DNSPacket {
        header: DNSHeader {
            id,
            rd: true,
            qdcount: questions.len() as u16,
            ..Default::default()
        },
        questions: questions
            .iter()
            .map(|(name, qtype)| DNSQuestion::new(name, *qtype))
            .collect(),
        ..Default::default()
    }
}

pub fn create_aaaa_query(id: u16, name: &str) -> DNSPacket {
    create_query(id, &[(name, DNSResourceType::AAAA)])
}

/// Hand-built wire bytes for a single-question query
pub fn create_query_bytes(id: u16, domain: &str, qtype: u16) -> Vec<u8> {
    let mut packet = Vec::new();
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00]); // RD
    packet.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
    packet.extend_from_slice(&[0x00; 6]);

    for label in domain.split('.').filter(|l| !l.is_empty()) {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);
    packet.extend_from_slice(&qtype.to_be_bytes());
    packet.extend_from_slice(&u16::from(DNSResourceClass::IN).to_be_bytes());
    packet
}

/// `hype` plus a second TLD so multi-zone behaviour can be exercised
pub fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        ttl: TEST_TTL,
        tlds: TldTable::new()
            .with("hype", AliasTransform::prefixed("4973"))
            .with("bit", AliasTransform::prefixed("bit-")),
        ..Default::default()
    }
}

/// In-memory registry keyed by alias name. Unknown aliases are not found.
#[derive(Default)]
pub struct StaticRegistry {
    entries: Mutex<HashMap<String, VecDeque<AliasLookupResult>>>,
    calls: Mutex<Vec<String>>,
}

impl StaticRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_address(self: Arc<Self>, alias: &str, addr: &str) -> Arc<Self> {
        let addr: Ipv6Addr = addr.parse().unwrap();
        self.with_results(alias, vec![AliasLookupResult::Found(addr)])
    }

    /// Results handed out in order; the last one repeats.
    pub fn with_results(self: Arc<Self>, alias: &str, results: Vec<AliasLookupResult>) -> Arc<Self> {
        self.entries
            .lock()
            .unwrap()
            .insert(alias.to_string(), results.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AliasLookup for StaticRegistry {
    async fn resolve(&self, alias: &str) -> AliasLookupResult {
        self.calls.lock().unwrap().push(alias.to_string());
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(alias) {
            Some(results) if results.len() > 1 => results.pop_front().unwrap(),
            Some(results) => results
                .front()
                .cloned()
                .unwrap_or(AliasLookupResult::NotFound),
            None => AliasLookupResult::NotFound,
        }
    }
}

pub fn test_server(registry: Arc<StaticRegistry>) -> DnsServer {
    DnsServer::with_registry(test_config(), registry)
}

/// Canned HTTP reply of the mock registry
#[derive(Clone, Debug)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
}

impl MockReply {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<MockReply>>,
    forms: Mutex<Vec<HashMap<String, String>>>,
    hits: AtomicUsize,
}

/// HTTP registry on a loopback port that replays scripted replies. Once the
/// script runs out the last reply repeats.
pub struct MockRegistry {
    pub url: String,
    state: Arc<MockState>,
    server: tokio::task::JoinHandle<()>,
}

impl MockRegistry {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = Arc::new(MockState {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        });

        let app = Router::new()
            .route("/nxt", post(mock_get_alias))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/nxt", addr),
            state,
            server,
        }
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Form fields of every request received so far
    pub fn forms(&self) -> Vec<HashMap<String, String>> {
        self.state.forms.lock().unwrap().clone()
    }
}

impl Drop for MockRegistry {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn mock_get_alias(
    State(state): State<Arc<MockState>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.forms.lock().unwrap().push(form);

    let reply = {
        let mut replies = state.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap_or(MockReply::status(500))
        }
    };
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, reply.body)
}
