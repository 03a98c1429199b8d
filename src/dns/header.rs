use bitstream_io::{BitRead, BitWrite, BitWriter, Endianness};

use super::{
    HEADER_LEN, WireReader,
    common::PacketComponent,
    enums::ResponseCode,
};
use crate::error::{DnsError, Result};

/// Authenticated Data, the middle bit of the 3-bit Z field (RFC 4035)
pub const Z_AUTHENTIC_DATA: u8 = 0b010;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSHeader {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DNSHeader {
    /// Reads only the fixed 12-byte header, leaving the body untouched.
    pub fn peek(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(DnsError::InvalidHeader);
        }
        let mut reader = WireReader::new(std::io::Cursor::new(&buf[..HEADER_LEN]));
        let mut header = DNSHeader::default();
        header.read(&mut reader, buf)?;
        Ok(header)
    }

    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::from_u8(self.rcode)
    }

    pub fn authentic_data(&self) -> bool {
        self.z & Z_AUTHENTIC_DATA != 0
    }
}

impl PacketComponent for DNSHeader {
    fn write<E: Endianness>(&self, writer: &mut BitWriter<&mut Vec<u8>, E>) -> Result<()> {
        writer.write_var::<u16>(16, self.id)?;
        writer.write_var::<u8>(1, self.qr as u8)?;
        writer.write_var::<u8>(4, self.opcode)?;
        writer.write_var::<u8>(1, self.aa as u8)?;
        writer.write_var::<u8>(1, self.tc as u8)?;
        writer.write_var::<u8>(1, self.rd as u8)?;
        writer.write_var::<u8>(1, self.ra as u8)?;
        writer.write_var::<u8>(3, self.z)?;
        writer.write_var::<u8>(4, self.rcode)?;
        writer.write_var::<u16>(16, self.qdcount)?;
        writer.write_var::<u16>(16, self.ancount)?;
        writer.write_var::<u16>(16, self.nscount)?;
        writer.write_var::<u16>(16, self.arcount)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader<'_>, _packet: &[u8]) -> Result<()> {
        self.id = reader.read_var::<u16>(16)?;
        self.qr = reader.read_var::<u8>(1)? == 1;
        self.opcode = reader.read_var::<u8>(4)?;
        self.aa = reader.read_var::<u8>(1)? == 1;
        self.tc = reader.read_var::<u8>(1)? == 1;
        self.rd = reader.read_var::<u8>(1)? == 1;
        self.ra = reader.read_var::<u8>(1)? == 1;
        self.z = reader.read_var::<u8>(3)?;
        self.rcode = reader.read_var::<u8>(4)?;
        self.qdcount = reader.read_var::<u16>(16)?;
        self.ancount = reader.read_var::<u16>(16)?;
        self.nscount = reader.read_var::<u16>(16)?;
        self.arcount = reader.read_var::<u16>(16)?;
        Ok(())
    }
}
