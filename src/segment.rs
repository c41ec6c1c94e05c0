use bitflags::bitflags;

use crate::wrap32::Wrap32;

bitflags! {
    /// Control flags carried by a [`TcpSegment`]. Unlike a wire TCP header, there's no ACK bit
    /// here: acknowledgement info travels the other way, in a [`ReceiverMessage`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SegmentFlags: u8 {
        const SYN = 1 << 0;
        const FIN = 1 << 1;
        const RST = 1 << 2;
    }
}

/// A logical segment exchanged between a `TCPSender` and a `TCPReceiver`. Wire framing and
/// checksumming are left to an external collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct TcpSegment {
    pub seqno: Wrap32,
    pub flags: SegmentFlags,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    pub fn new(seqno: Wrap32, flags: SegmentFlags, payload: Vec<u8>) -> Self {
        TcpSegment {
            seqno,
            flags,
            payload,
        }
    }

    pub fn syn(&self) -> bool {
        self.flags.contains(SegmentFlags::SYN)
    }

    pub fn fin(&self) -> bool {
        self.flags.contains(SegmentFlags::FIN)
    }

    pub fn rst(&self) -> bool {
        self.flags.contains(SegmentFlags::RST)
    }

    /// SYN + payload length + FIN: the amount by which this segment advances the sequence space.
    pub fn sequence_length(&self) -> u64 {
        self.payload.len() as u64 + u64::from(self.syn()) + u64::from(self.fin())
    }
}

/// What a `TCPReceiver` reports back to the peer's sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverMessage {
    pub ackno: Option<Wrap32>,
    pub window_size: u16,
    pub rst: bool,
}
