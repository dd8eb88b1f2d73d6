// SPDX-License-Identifier: MPL-2.0

//! A bounded byte FIFO ring buffer.
//!
//! This is the concrete backing store used by `pipe::Pipe`: a fixed-capacity,
//! first-in-first-out byte queue with wrap-around indices. It never blocks: `put`/`get`
//! transfer as many bytes as currently fit and return the count transferred, leaving any
//! blocking/wake-up behavior to the caller.
//!
//! # Example
//!
//! ```
//! use ring_buffer::RingBuffer;
//!
//! let mut rb = RingBuffer::new(4);
//! assert_eq!(rb.put(b"HELLO"), 4);
//! let mut buf = [0; 4];
//! assert_eq!(rb.get(&mut buf), 4);
//! assert_eq!(&buf, b"HELL");
//! ```

use std::num::Wrapping;

/// A bounded, owned byte ring buffer.
///
/// Unlike a page-backed ring buffer meant to be mapped into an address space, this one
/// is just a boxed byte slice: the pipe built on top of it owns the storage outright and
/// never shares it with anything else. A `capacity` of zero is legal and yields a ring
/// buffer that is always both empty and full.
pub struct RingBuffer {
    storage: Box<[u8]>,
    capacity: usize,
    head: Wrapping<usize>,
    tail: Wrapping<usize>,
}

impl RingBuffer {
    /// Creates a new `RingBuffer` with the given capacity.
    ///
    /// `capacity` need not be a power of two; zero is permitted.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            capacity,
            head: Wrapping(0),
            tail: Wrapping(0),
        }
    }

    /// Gets the capacity of the `RingBuffer`.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Gets the number of bytes currently stored.
    pub fn len(&self) -> usize {
        (self.tail - self.head).0
    }

    /// Checks if the `RingBuffer` is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if the `RingBuffer` is full.
    pub fn is_full(&self) -> bool {
        self.space() == 0
    }

    /// Gets the number of free bytes, i.e. how many more bytes `put` could accept.
    pub fn space(&self) -> usize {
        self.capacity - self.len()
    }

    /// Copies as many bytes from `src` as currently fit, returning the count copied.
    ///
    /// Never copies more than `src.len()` bytes, and never more than [`Self::space`]
    /// had available at the start of the call.
    pub fn put(&mut self, src: &[u8]) -> usize {
        if self.capacity == 0 {
            return 0;
        }

        let n = src.len().min(self.space());
        let tail_offset = self.tail.0 % self.capacity;

        if tail_offset + n > self.capacity {
            let first = self.capacity - tail_offset;
            self.storage[tail_offset..].copy_from_slice(&src[..first]);
            self.storage[..n - first].copy_from_slice(&src[first..n]);
        } else {
            self.storage[tail_offset..tail_offset + n].copy_from_slice(&src[..n]);
        }

        self.tail += n;
        n
    }

    /// Copies as many bytes into `dst` as are currently stored, returning the count copied.
    ///
    /// Never copies more than `dst.len()` bytes, and never more than [`Self::len`] had
    /// available at the start of the call.
    pub fn get(&mut self, dst: &mut [u8]) -> usize {
        if self.capacity == 0 {
            return 0;
        }

        let n = dst.len().min(self.len());
        let head_offset = self.head.0 % self.capacity;

        if head_offset + n > self.capacity {
            let first = self.capacity - head_offset;
            dst[..first].copy_from_slice(&self.storage[head_offset..]);
            dst[first..n].copy_from_slice(&self.storage[..n - first]);
        } else {
            dst[..n].copy_from_slice(&self.storage[head_offset..head_offset + n]);
        }

        self.head += n;
        n
    }

    /// Discards all buffered bytes, resetting occupancy to zero.
    pub fn reset(&mut self) {
        self.head = Wrapping(0);
        self.tail = Wrapping(0);
    }
}
