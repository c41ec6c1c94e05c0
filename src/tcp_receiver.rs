use crate::reassembler::Reassembler;
use crate::segment::{ReceiverMessage, TcpSegment};
use crate::wrap32::Wrap32;

/// Turns incoming segments into bytes (via a [`Reassembler`]) and summarizes receiver state for
/// the peer's sender.
#[derive(Debug)]
pub struct TCPReceiver {
    reassembler: Reassembler,
    isn: Option<Wrap32>,
    // Last known absolute seqno, used as the unwrap checkpoint for the next segment.
    checkpoint: u64,
    fin_seen: bool,
}

impl TCPReceiver {
    pub fn new(reassembler: Reassembler) -> Self {
        TCPReceiver {
            reassembler,
            isn: None,
            checkpoint: 0,
            fin_seen: false,
        }
    }

    pub fn receive(&mut self, segment: TcpSegment) {
        if segment.rst() {
            self.reassembler.set_error();
            return;
        }

        if self.isn.is_none() {
            if !segment.syn() {
                // Can't make sense of anything before the connection starts.
                return;
            }
            self.isn = Some(segment.seqno);
        }
        let isn = self.isn.unwrap();

        if segment.fin() {
            self.fin_seen = true;
        }

        let abs_seqno = segment.seqno.unwrap(isn, self.checkpoint);
        let stream_index = if segment.syn() { 0 } else { abs_seqno - 1 };
        let fin = segment.fin();
        let payload_len = segment.payload.len() as u64;

        self.reassembler.insert(stream_index, segment.payload, fin);

        self.checkpoint = abs_seqno + payload_len;
    }

    pub fn send(&self) -> ReceiverMessage {
        let ackno = self.isn.map(|isn| {
            let mut abs = self.reassembler.bytes_pushed() + 1;
            if self.fin_seen && self.reassembler.is_closed() {
                abs += 1;
            }
            Wrap32::wrap(abs, isn)
        });

        let window_size = self
            .reassembler
            .available_capacity()
            .min(u16::MAX as usize) as u16;

        ReceiverMessage {
            ackno,
            window_size,
            rst: self.reassembler.has_error(),
        }
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    pub fn reassembler_mut(&mut self) -> &mut Reassembler {
        &mut self.reassembler
    }
}
