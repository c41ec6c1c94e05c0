use std::ops::Add;

/// A 32-bit wire sequence number, wrapped modulo 2^32 relative to some per-connection ISN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wrap32 {
    value: u32,
}

impl Wrap32 {
    const WRAP_SIZE: u64 = 1 << 32;
    const HALF_WRAP: u64 = 1 << 31;

    pub fn new(value: u32) -> Self {
        Wrap32 { value }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Wrap an absolute 64-bit index about `isn`.
    pub fn wrap(n: u64, isn: Wrap32) -> Self {
        Wrap32::new((n.wrapping_add(isn.value as u64)) as u32)
    }

    /// Unwrap to the absolute 64-bit index closest to `checkpoint`, ties broken toward the
    /// smaller value.
    pub fn unwrap(&self, isn: Wrap32, checkpoint: u64) -> u64 {
        let relative = self.value.wrapping_sub(isn.value) as u64;

        // number of 2^32 wraps needed to land the candidate nearest checkpoint
        let k = checkpoint.saturating_add(Self::HALF_WRAP).saturating_sub(relative) >> 32;

        relative + k * Self::WRAP_SIZE
    }
}

impl Add for Wrap32 {
    type Output = Wrap32;

    fn add(self, other: Wrap32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(other.value))
    }
}

impl std::fmt::Display for Wrap32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}
