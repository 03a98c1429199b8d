use nxtdns::dns::{
    DNSPacket,
    enums::{DNSResourceClass, DNSResourceType, ResponseCode},
    resource::DNSResourceData,
};
use nxtdns::error::DnsError;

// AAAA query for foo.hype as sent by `dig @127.0.0.1 -p 1053 foo.hype AAAA`
const FOO_HYPE_QUERY: &[u8] = &[
    0x12, 0x34, // Transaction ID
    0x01, 0x00, // Flags: Standard query, RD
    0x00, 0x01, // Questions: 1
    0x00, 0x00, // Answer RRs: 0
    0x00, 0x00, // Authority RRs: 0
    0x00, 0x00, // Additional RRs: 0
    // Question section
    0x03, b'f', b'o', b'o', // "foo"
    0x04, b'h', b'y', b'p', b'e', // "hype"
    0x00, // Root label
    0x00, 0x1c, // Type: AAAA
    0x00, 0x01, // Class: IN
];

// Response to the query above with a compressed answer owner name
const FOO_HYPE_RESPONSE: &[u8] = &[
    0x12, 0x34, // Transaction ID
    0x85, 0x80, // Flags: QR, AA, RD, RA
    0x00, 0x01, // Questions: 1
    0x00, 0x01, // Answer RRs: 1
    0x00, 0x00, // Authority RRs: 0
    0x00, 0x00, // Additional RRs: 0
    0x03, b'f', b'o', b'o', 0x04, b'h', b'y', b'p', b'e', 0x00, //
    0x00, 0x1c, 0x00, 0x01, //
    // Answer: pointer to offset 12
    0xc0, 0x0c, //
    0x00, 0x1c, // Type: AAAA
    0x00, 0x01, // Class: IN
    0x00, 0x00, 0x0e, 0x10, // TTL: 3600
    0x00, 0x10, // RDLENGTH: 16
    0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // 2001:db8::1
];

#[test]
fn test_parse_dns_header() {
    let packet = DNSPacket::parse(FOO_HYPE_QUERY).expect("Failed to parse packet");

    assert_eq!(packet.header.id, 0x1234);
    assert!(!packet.header.qr); // Query
    assert_eq!(packet.header.opcode, 0);
    assert!(!packet.header.aa);
    assert!(packet.header.rd);
    assert_eq!(packet.header.z, 0);
    assert_eq!(packet.header.qdcount, 1);
    assert_eq!(packet.header.ancount, 0);
}

#[test]
fn test_parse_dns_question() {
    let packet = DNSPacket::parse(FOO_HYPE_QUERY).expect("Failed to parse packet");

    assert_eq!(packet.questions.len(), 1);
    let question = &packet.questions[0];
    assert_eq!(question.labels, vec!["foo", "hype"]);
    assert_eq!(question.qtype, DNSResourceType::AAAA);
    assert_eq!(question.qclass, DNSResourceClass::IN);
    assert_eq!(question.tld(), "hype");
}

#[test]
fn test_parse_compressed_answer() {
    let packet = DNSPacket::parse(FOO_HYPE_RESPONSE).expect("Failed to parse packet");

    assert!(packet.header.qr && packet.header.aa && packet.header.ra);
    assert_eq!(packet.response_code(), ResponseCode::NoError);
    assert_eq!(packet.answers.len(), 1);

    let answer = &packet.answers[0];
    assert_eq!(answer.name(), "foo.hype");
    assert_eq!(answer.ttl, 3600);
    assert_eq!(
        answer.rdata,
        DNSResourceData::AAAA("2001:db8::1".parse().unwrap())
    );
}

#[test]
fn test_serialize_matches_uncompressed_wire_form() {
    let query = DNSPacket::parse(FOO_HYPE_QUERY).unwrap();
    assert_eq!(query.serialize().unwrap(), FOO_HYPE_QUERY);

    // The codec writes names uncompressed, so the answer owner is spelled out
    let response = DNSPacket::parse(FOO_HYPE_RESPONSE).unwrap();
    let serialized = response.serialize().unwrap();
    assert_eq!(serialized.len(), FOO_HYPE_RESPONSE.len() - 2 + 10);
    assert_eq!(DNSPacket::parse(&serialized).unwrap(), response);
}

#[test]
fn test_header_counts_follow_sections() {
    let mut packet = DNSPacket::parse(FOO_HYPE_QUERY).unwrap();
    packet.header.qdcount = 9;
    packet.header.ancount = 4;

    let serialized = packet.serialize().unwrap();
    assert_eq!(&serialized[4..12], &[0, 1, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_truncated_packets_are_rejected() {
    assert!(matches!(
        DNSPacket::parse(&FOO_HYPE_QUERY[..8]),
        Err(DnsError::InvalidHeader)
    ));
    for cut in [14, 21, 24] {
        assert!(
            DNSPacket::parse(&FOO_HYPE_QUERY[..cut]).is_err(),
            "accepted packet cut at {}",
            cut
        );
    }
}

#[test]
fn test_bad_aaaa_length_is_rejected() {
    let mut packet = FOO_HYPE_RESPONSE.to_vec();
    packet[37] = 0x04; // RDLENGTH
    packet.truncate(42);
    assert!(matches!(
        DNSPacket::parse(&packet),
        Err(DnsError::InvalidRdata { rtype: 28, .. })
    ));
}

#[test]
fn test_reserved_label_type_is_rejected() {
    let mut packet = FOO_HYPE_QUERY.to_vec();
    packet[12] = 0x43;
    assert!(matches!(
        DNSPacket::parse(&packet),
        Err(DnsError::InvalidLabelLength(0x43))
    ));
}
