use std::collections::VecDeque;

/// A bounded, in-order, single-producer/single-consumer byte queue with end-of-stream and error
/// signalling.
#[derive(Debug)]
pub struct ByteStream {
    buffer: VecDeque<u8>,
    capacity: usize,
    bytes_pushed: u64,
    bytes_popped: u64,
    closed: bool,
    error: bool,
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        ByteStream {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            bytes_pushed: 0,
            bytes_popped: 0,
            closed: false,
            error: false,
        }
    }

    // -- writer side --

    /// Append as many leading bytes of `data` as fit in the available capacity. Any suffix that
    /// doesn't fit is dropped. Returns the number of bytes actually accepted.
    pub fn push(&mut self, data: &[u8]) -> usize {
        if self.closed {
            return 0;
        }
        let to_push = data.len().min(self.available_capacity());
        self.buffer.extend(&data[..to_push]);
        self.bytes_pushed += to_push as u64;
        to_push
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn available_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.bytes_pushed
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn set_error(&mut self) {
        self.error = true;
    }

    // -- reader side --

    /// A contiguous prefix of the buffered bytes. May be shorter than `bytes_buffered()` if the
    /// ring buffer has wrapped; call repeatedly (after popping) to see the rest.
    pub fn peek(&self) -> &[u8] {
        self.buffer.as_slices().0
    }

    /// Discard up to `n` buffered bytes from the front. Returns the number actually discarded.
    pub fn pop(&mut self, n: usize) -> usize {
        let to_pop = n.min(self.buffer.len());
        self.buffer.drain(..to_pop);
        self.bytes_popped += to_pop as u64;
        to_pop
    }

    pub fn is_finished(&self) -> bool {
        self.closed && self.buffer.is_empty()
    }

    pub fn bytes_buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn bytes_popped(&self) -> u64 {
        self.bytes_popped
    }
}
