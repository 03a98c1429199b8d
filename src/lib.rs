pub mod config;
pub mod dns;
pub mod error;
pub mod graceful_shutdown;
pub mod protocol;
pub mod registry;
pub mod resolver;
pub mod responder;
pub mod server;

pub use dns::DNSPacket;
pub use server::DnsServer;
