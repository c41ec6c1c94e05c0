use std::collections::BTreeMap;

use crate::byte_stream::ByteStream;
use crate::segment::{ReceiverMessage, SegmentFlags, TcpSegment};
use crate::wrap32::Wrap32;

/// Largest payload a single outgoing segment will carry.
pub const MAX_PAYLOAD_SIZE: usize = 1000;

/// A retransmission timer with TCP-style exponential backoff. Backoff is suspended while the
/// peer's advertised window is zero, so a stalled receiver doesn't also inflate the RTO.
#[derive(Debug)]
struct RetransmissionTimer {
    initial_rto_ms: u64,
    current_rto_ms: u64,
    elapsed_ms: u64,
    running: bool,
}

impl RetransmissionTimer {
    fn new(initial_rto_ms: u64) -> Self {
        RetransmissionTimer {
            initial_rto_ms,
            current_rto_ms: initial_rto_ms,
            elapsed_ms: 0,
            running: false,
        }
    }

    fn start(&mut self) {
        self.elapsed_ms = 0;
        self.running = true;
    }

    fn reset(&mut self) {
        self.current_rto_ms = self.initial_rto_ms;
        self.start();
    }

    fn stop(&mut self) {
        self.running = false;
        self.elapsed_ms = 0;
    }

    fn double(&mut self) {
        self.current_rto_ms *= 2;
    }

    fn tick(&mut self, ms_elapsed: u64) {
        if self.running {
            self.elapsed_ms += ms_elapsed;
        }
    }

    fn expired(&self) -> bool {
        self.running && self.elapsed_ms >= self.current_rto_ms
    }
}

/// Turns outgoing bytes (from a [`ByteStream`]) into segments, and tracks outstanding segments
/// for retransmission until the peer acknowledges them.
#[derive(Debug)]
pub struct TCPSender {
    input: ByteStream,
    isn: Wrap32,
    timer: RetransmissionTimer,
    // Outstanding segments keyed by their absolute starting sequence number.
    outstanding: BTreeMap<u64, TcpSegment>,
    next_seqno: u64,
    last_ackno: u64,
    receiver_window: u16,
    consecutive_retransmissions: u64,
    syn_sent: bool,
    fin_sent: bool,
}

impl TCPSender {
    pub fn new(input: ByteStream, isn: Wrap32, initial_rto_ms: u64) -> Self {
        TCPSender {
            input,
            isn,
            timer: RetransmissionTimer::new(initial_rto_ms),
            outstanding: BTreeMap::new(),
            next_seqno: 0,
            last_ackno: 0,
            receiver_window: 1,
            consecutive_retransmissions: 0,
            syn_sent: false,
            fin_sent: false,
        }
    }

    /// Fill the window with as many new segments as the peer's advertised window (or, if it's
    /// reported as zero, a one-byte probe) and the available input bytes allow. `send` is called
    /// once per segment generated.
    pub fn push(&mut self, mut send: impl FnMut(TcpSegment)) {
        if !self.syn_sent {
            self.transmit(0, SegmentFlags::SYN, Vec::new(), &mut send);
            self.syn_sent = true;
            return;
        }

        loop {
            if self.fin_sent {
                break;
            }

            // Treat a zero window as a window of one, so we still probe.
            let effective_window = if self.receiver_window == 0 {
                1
            } else {
                self.receiver_window as u64
            };
            let in_flight = self.sequence_numbers_in_flight();
            if in_flight >= effective_window {
                break;
            }

            let budget = (effective_window - in_flight) as usize;
            let payload_len = budget.min(MAX_PAYLOAD_SIZE).min(self.input.bytes_buffered());
            let payload = self.take_input(payload_len);

            let can_send_fin =
                self.input.is_closed() && self.input.bytes_buffered() == 0 && payload.len() < budget;

            if payload.is_empty() && !can_send_fin {
                break;
            }

            let mut flags = SegmentFlags::empty();
            if can_send_fin {
                flags |= SegmentFlags::FIN;
            }

            let abs_seqno = self.next_seqno;
            self.transmit(abs_seqno, flags, payload, &mut send);

            if can_send_fin {
                self.fin_sent = true;
            }
        }
    }

    /// Pop up to `n` bytes off the input stream, handling the case where the ring buffer's
    /// contiguous `peek()` prefix is shorter than what's actually buffered.
    fn take_input(&mut self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let chunk_len = (n - out.len()).min(self.input.peek().len());
            if chunk_len == 0 {
                break;
            }
            out.extend_from_slice(&self.input.peek()[..chunk_len]);
            self.input.pop(chunk_len);
        }
        out
    }

    fn transmit(
        &mut self,
        abs_seqno: u64,
        flags: SegmentFlags,
        payload: Vec<u8>,
        send: &mut impl FnMut(TcpSegment),
    ) {
        let segment = TcpSegment::new(Wrap32::wrap(abs_seqno, self.isn), flags, payload);
        let seq_len = segment.sequence_length();
        if seq_len == 0 {
            return;
        }

        send(segment.clone());
        self.outstanding.insert(abs_seqno, segment);
        self.next_seqno += seq_len;

        if !self.timer.running {
            self.timer.start();
        }
    }

    /// Process an incoming [`ReceiverMessage`], clearing acknowledged segments and resetting
    /// backoff state.
    pub fn receive(&mut self, msg: ReceiverMessage) {
        if msg.rst {
            self.input.set_error();
            return;
        }

        self.receiver_window = msg.window_size;

        let Some(ackno) = msg.ackno else {
            return;
        };
        let abs_ackno = ackno.unwrap(self.isn, self.last_ackno);

        // An ack for something we haven't sent yet is bogus; ignore it.
        if abs_ackno > self.next_seqno {
            return;
        }
        if abs_ackno <= self.last_ackno {
            return;
        }
        self.last_ackno = abs_ackno;

        let acked: Vec<u64> = self
            .outstanding
            .iter()
            .filter(|(&seqno, seg)| seqno + seg.sequence_length() <= abs_ackno)
            .map(|(&seqno, _)| seqno)
            .collect();
        for seqno in acked {
            self.outstanding.remove(&seqno);
        }

        self.consecutive_retransmissions = 0;
        self.timer.reset();
        if self.outstanding.is_empty() {
            self.timer.stop();
        }
    }

    /// Advance internal time by `ms_elapsed`, retransmitting the earliest outstanding segment and
    /// backing off if the RTO has expired.
    pub fn tick(&mut self, ms_elapsed: u64, mut send: impl FnMut(TcpSegment)) {
        self.timer.tick(ms_elapsed);
        if !self.timer.expired() {
            return;
        }

        if let Some((_, segment)) = self.outstanding.iter().next() {
            send(segment.clone());
        }

        if self.receiver_window > 0 {
            self.consecutive_retransmissions += 1;
            self.timer.double();
        }
        self.timer.start();
    }

    /// A zero-length segment reflecting current sequence-number state, used to keep the
    /// connection alive or to assert `RST`.
    pub fn make_empty_message(&self) -> TcpSegment {
        TcpSegment::new(Wrap32::wrap(self.next_seqno, self.isn), SegmentFlags::empty(), Vec::new())
    }

    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.next_seqno - self.last_ackno
    }

    pub fn consecutive_retransmissions(&self) -> u64 {
        self.consecutive_retransmissions
    }

    pub fn input(&self) -> &ByteStream {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut ByteStream {
        &mut self.input
    }
}
