//! Growable scratch buffer shared by encode and decode paths
//!
//! The buffer is sized to the largest record seen so far. When a request
//! exceeds the current capacity the buffer is replaced by one twice the
//! requested size; it never shrinks.

/// Reusable byte buffer
#[derive(Debug)]
pub struct ScratchBuffer {
    bytes: Vec<u8>,
}

impl ScratchBuffer {
    /// Create a buffer with an initial capacity in bytes
    pub fn with_capacity(capacity: usize) -> Self {
        ScratchBuffer {
            bytes: vec![0u8; capacity],
        }
    }

    /// Borrow a writable window of exactly `len` bytes
    ///
    /// Contents of the window are unspecified; callers overwrite or fill it.
    pub fn prepare(&mut self, len: usize) -> &mut [u8] {
        if self.bytes.len() < len {
            self.bytes = vec![0u8; len.saturating_mul(2)];
        }
        &mut self.bytes[..len]
    }

    /// Current capacity in bytes
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }
}
