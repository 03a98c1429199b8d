// Server integration tests
//
// These start the UDP and TCP listeners on loopback ports picked by the OS
// and talk to them over real sockets. The registry is in-memory.

mod common;

use common::{StaticRegistry, create_query, create_query_bytes, test_server};
use nxtdns::dns::{
    DNSPacket,
    enums::{DNSResourceType, ResponseCode},
};
use nxtdns::graceful_shutdown::GracefulShutdown;
use nxtdns::protocol::frame_message;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, UdpSocket},
    task::JoinHandle,
    time::timeout,
};

struct RunningServer {
    udp_addr: SocketAddr,
    tcp_addr: SocketAddr,
    shutdown: GracefulShutdown,
    handle: JoinHandle<nxtdns::error::Result<()>>,
}

async fn start_test_server() -> RunningServer {
    let registry = StaticRegistry::new()
        .with_address("4973foo", "2001:db8::1")
        .with_address("4973bar", "2001:db8::2");
    let server = test_server(registry).bind().await.unwrap();
    let udp_addr = server.udp_addr().unwrap();
    let tcp_addr = server.tcp_addr().unwrap();

    let shutdown = GracefulShutdown::new();
    let handle = tokio::spawn(server.run(&shutdown));

    RunningServer {
        udp_addr,
        tcp_addr,
        shutdown,
        handle,
    }
}

async fn udp_exchange(server: SocketAddr, request: &[u8]) -> DNSPacket {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(request, server).await.unwrap();

    let mut buf = vec![0u8; 65_535];
    let (len, from) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
        .await
        .expect("no UDP response")
        .unwrap();
    assert_eq!(from, server);
    DNSPacket::parse(&buf[..len]).unwrap()
}

#[tokio::test]
async fn test_udp_query() {
    let server = start_test_server().await;

    let response = udp_exchange(server.udp_addr, &create_query_bytes(0x1234, "foo.hype", 28)).await;

    assert_eq!(response.header.id, 0x1234);
    assert!(response.header.qr);
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(response.answers.len(), 1);
    assert_eq!(response.authorities.len(), 1);

    server.shutdown.trigger();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_udp_datagram_larger_than_4k_is_read_whole() {
    let server = start_test_server().await;
    let names: Vec<(&str, DNSResourceType)> = vec![("a.hype", DNSResourceType::A); 400];
    let request = create_query(0x4242, &names).serialize().unwrap();
    assert!(request.len() > 4096);

    let response = udp_exchange(server.udp_addr, &request).await;

    assert_eq!(response.header.id, 0x4242);
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(response.questions.len(), 400);
    assert_eq!(response.authorities.len(), 1);

    server.shutdown.trigger();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_udp_socket_survives_bad_datagrams() {
    let server = start_test_server().await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // Too short to carry a header: silently dropped
    socket.send_to(&[0x01, 0x02], server.udp_addr).await.unwrap();

    let response = udp_exchange(server.udp_addr, &create_query_bytes(9, "bar.hype", 28)).await;
    assert_eq!(response.header.id, 9);
    assert_eq!(response.answers.len(), 1);

    server.shutdown.trigger();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_udp_concurrent_clients() {
    let server = start_test_server().await;

    let clients: Vec<_> = (0..8u16)
        .map(|id| {
            let addr = server.udp_addr;
            tokio::spawn(async move {
                let name = if id % 2 == 0 { "foo.hype" } else { "nope.hype" };
                let response = udp_exchange(addr, &create_query_bytes(id, name, 28)).await;
                (id, response)
            })
        })
        .collect();

    for client in clients {
        let (id, response) = client.await.unwrap();
        assert_eq!(response.header.id, id);
        let expected = if id % 2 == 0 {
            ResponseCode::NoError
        } else {
            ResponseCode::NameError
        };
        assert_eq!(response.response_code(), expected);
    }

    server.shutdown.trigger();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_tcp_query() {
    let server = start_test_server().await;

    let mut stream = TcpStream::connect(server.tcp_addr).await.unwrap();
    let request = frame_message(&create_query_bytes(0x4321, "foo.unsupportedtld", 28)).unwrap();
    stream.write_all(&request).await.unwrap();

    let len = timeout(Duration::from_secs(5), stream.read_u16())
        .await
        .expect("no TCP response")
        .unwrap() as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.unwrap();
    let response = DNSPacket::parse(&body).unwrap();

    assert_eq!(response.header.id, 0x4321);
    assert_eq!(response.response_code(), ResponseCode::Refused);
    assert!(response.answers.is_empty());
    assert_eq!(response.authorities[0].name(), "unsupportedtld");

    // Server closes after one response
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    server.shutdown.trigger();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_listeners() {
    let server = start_test_server().await;

    server.shutdown.trigger();
    timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    assert!(TcpStream::connect(server.tcp_addr).await.is_err());
}
