//! A reliable byte-stream endpoint core: the pieces of a TCP-like protocol that turn a bounded
//! byte queue into a stream of segments and back, independent of any wire format or network
//! transport.
//!
//! Four components compose into a full endpoint:
//! - [`byte_stream::ByteStream`]: a bounded, in-order byte queue.
//! - [`reassembler::Reassembler`]: turns out-of-order byte fragments into an in-order
//!   `ByteStream`.
//! - [`wrap32::Wrap32`]: 32-bit wire sequence numbers, and the arithmetic to wrap/unwrap them
//!   against a 64-bit absolute index.
//! - [`tcp_receiver::TCPReceiver`] / [`tcp_sender::TCPSender`]: the receiving and sending halves
//!   of a connection, built on the above.

pub mod byte_stream;
pub mod reassembler;
pub mod segment;
pub mod tcp_receiver;
pub mod tcp_sender;
pub mod wrap32;

pub use byte_stream::ByteStream;
pub use reassembler::Reassembler;
pub use segment::{ReceiverMessage, SegmentFlags, TcpSegment};
pub use tcp_receiver::TCPReceiver;
pub use tcp_sender::{TCPSender, MAX_PAYLOAD_SIZE};
pub use wrap32::Wrap32;
