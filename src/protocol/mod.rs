pub mod tcp;
pub mod udp;

pub use tcp::{SessionEnd, TcpProtocolHandler, TcpSession, complete_frame, frame_message};
pub use udp::UdpProtocolHandler;
