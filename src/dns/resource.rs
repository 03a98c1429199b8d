use std::net::Ipv6Addr;

use bitstream_io::{BigEndian, BitRead, BitWrite, BitWriter, Endianness};
use bytes::Bytes;

use super::{
    WireReader,
    common::{PacketComponent, display_name},
    enums::{DNSResourceClass, DNSResourceType},
};
use crate::error::{DnsError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<Bytes>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: DNSResourceData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoaData {
    pub mname: Vec<Bytes>,
    pub rname: Vec<Bytes>,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DNSResourceData {
    #[default]
    Empty,
    AAAA(Ipv6Addr),
    SOA(SoaData),
    /// Record data of types this server never interprets
    Raw(Vec<u8>),
}

impl DNSResource {
    pub fn aaaa(labels: Vec<Bytes>, rclass: DNSResourceClass, ttl: u32, addr: Ipv6Addr) -> Self {
        Self {
            labels,
            rtype: DNSResourceType::AAAA,
            rclass,
            ttl,
            rdata: DNSResourceData::AAAA(addr),
        }
    }

    pub fn soa(labels: Vec<Bytes>, rclass: DNSResourceClass, ttl: u32, soa: SoaData) -> Self {
        Self {
            labels,
            rtype: DNSResourceType::SOA,
            rclass,
            ttl,
            rdata: DNSResourceData::SOA(soa),
        }
    }

    pub fn name(&self) -> String {
        display_name(&self.labels)
    }

    fn rdata_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);
        match &self.rdata {
            DNSResourceData::Empty => {}
            DNSResourceData::AAAA(addr) => writer.write_bytes(&addr.octets())?,
            DNSResourceData::SOA(soa) => {
                self.write_labels(&mut writer, &soa.mname)?;
                self.write_labels(&mut writer, &soa.rname)?;
                for value in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum] {
                    writer.write_var::<u32>(32, value)?;
                }
            }
            DNSResourceData::Raw(bytes) => writer.write_bytes(bytes)?,
        }
        Ok(buf)
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(&self, writer: &mut BitWriter<&mut Vec<u8>, E>) -> Result<()> {
        let rdata = self.rdata_bytes()?;
        let rdlength = u16::try_from(rdata.len()).map_err(|_| DnsError::InvalidRdata {
            rtype: self.rtype.into(),
            reason: format!("{} bytes of record data", rdata.len()),
        })?;
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, rdlength)?;
        writer.write_bytes(&rdata)?;
        Ok(())
    }

    fn read(&mut self, reader: &mut WireReader<'_>, packet: &[u8]) -> Result<()> {
        self.labels = self.read_labels(reader, packet)?;
        self.rtype = reader.read_var::<u16>(16)?.into();
        self.rclass = reader.read_var::<u16>(16)?.into();
        self.ttl = reader.read_var::<u32>(32)?;
        let rdlength = reader.read_var::<u16>(16)? as usize;
        let start = (reader.position_in_bits()? / 8) as usize;

        self.rdata = match self.rtype {
            DNSResourceType::AAAA => {
                if rdlength != 16 {
                    return Err(DnsError::InvalidRdata {
                        rtype: self.rtype.into(),
                        reason: format!("AAAA rdlength {}", rdlength),
                    });
                }
                let mut octets = [0u8; 16];
                reader.read_bytes(&mut octets)?;
                DNSResourceData::AAAA(Ipv6Addr::from(octets))
            }
            DNSResourceType::SOA => {
                let mname = self.read_labels(reader, packet)?;
                let rname = self.read_labels(reader, packet)?;
                let mut timers = [0u32; 5];
                for value in timers.iter_mut() {
                    *value = reader.read_var::<u32>(32)?;
                }
                let consumed = (reader.position_in_bits()? / 8) as usize - start;
                if consumed != rdlength {
                    return Err(DnsError::InvalidRdata {
                        rtype: self.rtype.into(),
                        reason: format!("SOA consumed {} of {} bytes", consumed, rdlength),
                    });
                }
                let [serial, refresh, retry, expire, minimum] = timers;
                DNSResourceData::SOA(SoaData {
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                })
            }
            _ if rdlength == 0 => DNSResourceData::Empty,
            _ => DNSResourceData::Raw(reader.read_to_vec(rdlength)?),
        };

        Ok(())
    }
}
