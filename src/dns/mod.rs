pub mod common;
pub mod enums;
pub mod header;
pub mod question;
pub mod resource;

use std::io::Cursor;

use bitstream_io::{BigEndian, BitReader, BitWriter};
use common::PacketComponent;
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;
use tracing::{debug, trace};

use crate::error::{DnsError, Result};

pub use enums::{DNSResourceClass, DNSResourceType, ResponseCode};

pub const HEADER_LEN: usize = 12;

pub type WireReader<'a> = BitReader<Cursor<&'a [u8]>, BigEndian>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

/// Converts between wire bytes and [`DNSPacket`].
///
/// The responder only depends on this trait, so the wire format can be
/// swapped without touching resolution logic.
pub trait MessageCodec: Send + Sync {
    fn decode(&self, buf: &[u8]) -> Result<DNSPacket>;
    fn encode(&self, packet: &DNSPacket) -> Result<Vec<u8>>;
}

/// RFC 1035 wire format codec
#[derive(Clone, Copy, Debug, Default)]
pub struct WireCodec;

impl MessageCodec for WireCodec {
    fn decode(&self, buf: &[u8]) -> Result<DNSPacket> {
        DNSPacket::parse(buf)
    }

    fn encode(&self, packet: &DNSPacket) -> Result<Vec<u8>> {
        packet.serialize()
    }
}

impl DNSPacket {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        if buf.len() < HEADER_LEN {
            return Err(DnsError::InvalidHeader);
        }
        let mut reader = WireReader::new(Cursor::new(buf));
        let mut packet = DNSPacket::default();
        packet.header.read(&mut reader, buf)?;
        debug!(
            "Parsed DNS header: id={}, qr={}, opcode={}, questions={}",
            packet.header.id, packet.header.qr, packet.header.opcode, packet.header.qdcount
        );

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read(&mut reader, buf)?;
            packet.questions.push(question);
        }
        packet.answers = read_section(&mut reader, buf, packet.header.ancount)?;
        packet.authorities = read_section(&mut reader, buf, packet.header.nscount)?;
        packet.resources = read_section(&mut reader, buf, packet.header.arcount)?;

        Ok(packet)
    }

    /// Serializes the packet. Section counts in the header are taken from
    /// the sections themselves.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(512);
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        let mut header = self.header.clone();
        header.qdcount = section_count(self.questions.len())?;
        header.ancount = section_count(self.answers.len())?;
        header.nscount = section_count(self.authorities.len())?;
        header.arcount = section_count(self.resources.len())?;
        header.write(&mut writer)?;

        for question in &self.questions {
            question.write(&mut writer)?;
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.resources)
        {
            record.write(&mut writer)?;
        }

        Ok(buf)
    }

    pub fn response_code(&self) -> ResponseCode {
        self.header.response_code()
    }
}

fn read_section(reader: &mut WireReader<'_>, buf: &[u8], count: u16) -> Result<Vec<DNSResource>> {
    let mut records = Vec::with_capacity(count.min(32) as usize);
    for _ in 0..count {
        let mut record = DNSResource::default();
        record.read(reader, buf)?;
        records.push(record);
    }
    Ok(records)
}

fn section_count(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| DnsError::SectionTooLarge(len))
}
