// SPDX-License-Identifier: MPL-2.0

//! A bounded, blocking, resettable byte pipe for cooperating threads.
//!
//! [`Pipe`] couples a bounded [`RingBuffer`] with two FIFO wait queues (one for "data
//! available", one for "space available"), a lifecycle flag pair (`open`/`reset`), and a
//! single spinlock serializing every operation. It is the kind of primitive a kernel uses
//! to back an anonymous pipe between two threads; this crate keeps that shape but runs on
//! top of a real OS thread scheduler instead of a bare-metal one.
//!
//! Three things set it apart from a channel like [`std::sync::mpsc`]:
//!
//! - [`Pipe::write`] and [`Pipe::read`] transfer a contiguous prefix of bytes, not whole
//!   messages: a call may return fewer bytes than requested without blocking further.
//! - [`Pipe::reset`] cancels every thread currently blocked on the pipe with a distinct
//!   `ECANCELED` error and discards buffered bytes, without closing the pipe.
//! - [`Pipe::close`] is a one-shot, idempotent-checked shutdown: readers drain whatever
//!   bytes remain and then see end-of-file; writers see `EPIPE` immediately.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use pipe::{Pipe, Timeout};
//!
//! let pipe = Arc::new(Pipe::new(16));
//!
//! let reader = {
//!     let pipe = pipe.clone();
//!     thread::spawn(move || {
//!         let mut buf = [0u8; 5];
//!         let n = pipe.read(&mut buf, Timeout::Forever).unwrap();
//!         (n, buf)
//!     })
//! };
//!
//! pipe.write(b"HELLO", Timeout::Forever).unwrap();
//! let (n, buf) = reader.join().unwrap();
//! assert_eq!(&buf[..n], b"HELLO");
//! ```

mod error;
mod sync;
mod timeout;

pub use error::{Errno, Error, Result};
pub use ring_buffer::RingBuffer;
pub use timeout::Timeout;

use error::return_errno_with_message;
use sync::{SpinLock, Waiter, WaitQueue};

/// A bounded, blocking, resettable byte pipe.
///
/// See the [module-level documentation](self) for an overview. Every operation
/// serializes on a single internal spinlock; see [`Pipe::write`]/[`Pipe::read`] for the
/// per-operation contract and [`Pipe::reset`]/[`Pipe::close`] for the lifecycle contract.
pub struct Pipe {
    inner: SpinLock<Inner>,
    /// Threads blocked in [`Pipe::read`] waiting for the buffer to become non-empty.
    data_waitq: WaitQueue,
    /// Threads blocked in [`Pipe::write`] waiting for the buffer to become non-full.
    space_waitq: WaitQueue,
}

struct Inner {
    buffer: RingBuffer,
    open: bool,
    reset: bool,
    /// Number of threads currently suspended on either wait queue. The handshake that
    /// lets `reset` auto-clear: the *last* waiter to depart (not the `reset` caller)
    /// clears the flag, because clearing it on the caller's side would race with a
    /// waiter that is woken later and would then misclassify its wake as a timeout.
    waiting: usize,
}

/// The outcome of a suspend-and-recheck cycle on one of the pipe's wait queues.
enum Wake {
    /// The predicate we were waiting on no longer holds; re-enter the fast path.
    Ready,
    /// Woken by timeout (or no-wait), and the predicate still holds.
    TryAgain,
    /// Woken because the pipe was closed while we were blocked.
    Broken,
    /// Woken because the pipe was reset while we were blocked.
    Canceled,
}

impl Pipe {
    /// Creates a new, open pipe backed by a freshly allocated ring buffer of the given
    /// capacity.
    ///
    /// `capacity == 0` is legal: every write then blocks (or returns `EAGAIN` under a
    /// non-blocking timeout) and every read behaves the same way, since the buffer is
    /// always simultaneously empty and full.
    pub fn new(capacity: usize) -> Self {
        Self::with_buffer(RingBuffer::new(capacity))
    }

    /// Creates a new, open pipe backed by a caller-supplied [`RingBuffer`].
    ///
    /// Binds the given storage, and sets `open = true`, `reset = false`, `waiting = 0`.
    /// Re-initializing a pipe that already has live waiters is a caller error; there is
    /// no idempotency guarantee for that case (mirroring the distilled spec's `init`).
    pub fn with_buffer(buffer: RingBuffer) -> Self {
        Self {
            inner: SpinLock::new(Inner {
                buffer,
                open: true,
                reset: false,
                waiting: 0,
            }),
            data_waitq: WaitQueue::new(),
            space_waitq: WaitQueue::new(),
        }
    }

    /// Returns the pipe's fixed buffer capacity.
    pub fn capacity(&self) -> usize {
        self.inner.lock().buffer.capacity()
    }

    /// Returns the number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    /// Returns whether the buffer currently holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().buffer.is_empty()
    }

    /// Returns whether the pipe is still open (neither endpoint has called [`Pipe::close`]).
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Writes as many bytes of `src` as currently fit, blocking per `timeout` if the
    /// buffer is full.
    ///
    /// Returns the number of bytes actually copied, which may be less than `src.len()`
    /// (including zero for a zero-length `src`). A partial transfer is returned
    /// immediately; this method never writes some bytes and then blocks for the rest —
    /// callers that need the full `src` written must re-issue the call themselves.
    ///
    /// # Errors
    ///
    /// - [`Errno::EAGAIN`] if `timeout` is [`Timeout::None`] and the buffer is full, or a
    ///   finite timeout elapsed while still full.
    /// - [`Errno::EPIPE`] if the pipe has been (or is, while blocked, concurrently) closed.
    /// - [`Errno::ECANCELED`] if [`Pipe::reset`] woke this call while it was blocked.
    pub fn write(&self, src: &[u8], timeout: Timeout) -> Result<usize> {
        if src.is_empty() {
            return Ok(0);
        }

        loop {
            let mut guard = self.inner.lock();

            if !guard.open {
                return_errno_with_message!(Errno::EPIPE, "the pipe has been closed");
            }

            if guard.buffer.is_full() {
                drop(guard);
                match self.wait(&self.space_waitq, timeout, |inner| inner.buffer.is_full()) {
                    Wake::Ready => continue,
                    Wake::TryAgain => {
                        return_errno_with_message!(Errno::EAGAIN, "the pipe is full")
                    }
                    Wake::Broken => {
                        return_errno_with_message!(Errno::EPIPE, "the pipe has been closed")
                    }
                    Wake::Canceled => {
                        return_errno_with_message!(Errno::ECANCELED, "the pipe was reset")
                    }
                }
            }

            // A racing writer may have refilled the buffer between our check above and
            // taking the lock for real; in that case there is nothing to copy yet, so
            // fall back to waiting again rather than returning a spurious zero.
            let transferred = guard.buffer.put(src);
            if transferred == 0 {
                drop(guard);
                continue;
            }

            drop(guard);
            self.data_waitq.wake_one();
            return Ok(transferred);
        }
    }

    /// Reads as many bytes into `dst` as are currently buffered, blocking per `timeout`
    /// if the buffer is empty and the pipe is still open.
    ///
    /// Returns the number of bytes actually copied, which may be less than `dst.len()`
    /// (including zero for a zero-length `dst`).
    ///
    /// If the pipe is closed while this call is blocked, any bytes deposited before the
    /// close are still drained and returned; only once the buffer is observed empty does
    /// this return `EPIPE`. A closed, already-drained pipe returns `EPIPE` on every
    /// subsequent call.
    ///
    /// # Errors
    ///
    /// - [`Errno::EAGAIN`] if `timeout` is [`Timeout::None`] and the buffer is empty, or
    ///   a finite timeout elapsed while still empty.
    /// - [`Errno::EPIPE`] if the buffer is empty and the pipe has been closed.
    /// - [`Errno::ECANCELED`] if [`Pipe::reset`] woke this call while it was blocked.
    pub fn read(&self, dst: &mut [u8], timeout: Timeout) -> Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }

        loop {
            let mut guard = self.inner.lock();

            if guard.buffer.is_empty() && guard.open {
                drop(guard);
                match self.wait(&self.data_waitq, timeout, |inner| inner.buffer.is_empty()) {
                    Wake::Ready => continue,
                    Wake::TryAgain => {
                        return_errno_with_message!(Errno::EAGAIN, "the pipe is empty")
                    }
                    // The pipe was closed while we were blocked: fall through to drain
                    // whatever was deposited before the close, rather than failing
                    // outright. Only an empty buffer on a closed pipe is EOF.
                    Wake::Broken => {
                        guard = self.inner.lock();
                    }
                    Wake::Canceled => {
                        return_errno_with_message!(Errno::ECANCELED, "the pipe was reset")
                    }
                }
            }

            if guard.buffer.is_empty() && !guard.open {
                return_errno_with_message!(Errno::EPIPE, "the pipe has been closed");
            }

            let transferred = guard.buffer.get(dst);
            drop(guard);

            if transferred > 0 {
                self.space_waitq.wake_one();
            }
            return Ok(transferred);
        }
    }

    /// Discards all buffered bytes and cancels every thread currently blocked in
    /// [`Pipe::read`] or [`Pipe::write`] with [`Errno::ECANCELED`], without closing the
    /// pipe.
    ///
    /// The `reset` flag this sets is cleared automatically once the last cancelled
    /// waiter has observed it (see [`Pipe::wait`]); callers of `reset` never clear it
    /// themselves. A `reset` with no waiters returns immediately and leaves the pipe
    /// ready for use with an empty buffer.
    pub fn reset(&self) {
        {
            let mut guard = self.inner.lock();
            guard.buffer.reset();
            guard.reset = true;
        }
        log::debug!("pipe reset, cancelling waiters");
        self.data_waitq.wake_all();
        self.space_waitq.wake_all();
    }

    /// Permanently disables the pipe.
    ///
    /// Idempotent-checked: a pipe that is already closed returns [`Errno::EALREADY`]
    /// rather than silently succeeding again. Every thread blocked in [`Pipe::read`] or
    /// [`Pipe::write`] is woken; readers drain any remaining buffered bytes before
    /// observing `EPIPE`, writers observe it immediately.
    pub fn close(&self) -> Result<()> {
        {
            let mut guard = self.inner.lock();
            if !guard.open {
                return_errno_with_message!(Errno::EALREADY, "the pipe is already closed");
            }
            guard.open = false;
            guard.reset = false;
        }
        log::debug!("pipe closed");
        self.data_waitq.wake_all();
        self.space_waitq.wake_all();
        Ok(())
    }

    /// Suspends the current thread on `queue` until the given predicate (still
    /// evaluated as "is the original condition blocking") clears, the pipe is reset or
    /// closed, or `timeout` elapses.
    ///
    /// `still_blocking` is re-evaluated against fresh pipe state after every wake,
    /// including spurious wakes: a wake must be validated against the actual condition,
    /// not the reason it fired, since a concurrent operation may have changed the state
    /// between the wake and this thread re-acquiring the lock.
    fn wait(
        &self,
        queue: &WaitQueue,
        timeout: Timeout,
        still_blocking: impl Fn(&Inner) -> bool,
    ) -> Wake {
        if !timeout.is_blocking() {
            return Wake::TryAgain;
        }

        let (waiter, waker) = Waiter::new_pair();
        {
            let mut guard = self.inner.lock();
            if guard.reset {
                return Wake::TryAgain;
            }
            // Re-check here, under this lock hold, before enqueueing: the caller's
            // own check happened under a separate, already-released acquisition, and
            // a wake between that check and this one would otherwise be lost (the
            // waker isn't enqueued yet for it to find).
            if !still_blocking(&guard) {
                return Wake::Ready;
            }
            guard.waiting += 1;
            queue.enqueue(waker);
        }

        match timeout {
            Timeout::Forever => waiter.wait(),
            Timeout::After(duration) => waiter.wait_timeout(duration),
            Timeout::None => unreachable!("no-wait short-circuits above"),
        }

        let mut guard = self.inner.lock();
        guard.waiting -= 1;

        if !guard.open {
            return Wake::Broken;
        }
        if guard.reset {
            if guard.waiting == 0 {
                guard.reset = false;
            }
            return Wake::Canceled;
        }
        if !still_blocking(&guard) {
            return Wake::Ready;
        }
        Wake::TryAgain
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn basic_fifo() {
        let pipe = Pipe::new(16);
        assert_eq!(pipe.write(b"HELLO", Timeout::None).unwrap(), 5);

        let mut buf = [0u8; 5];
        assert_eq!(pipe.read(&mut buf, Timeout::None).unwrap(), 5);
        assert_eq!(&buf, b"HELLO");
    }

    #[test]
    fn zero_length_io_never_blocks() {
        let pipe = Pipe::new(0);
        assert_eq!(pipe.write(&[], Timeout::Forever).unwrap(), 0);
        assert_eq!(pipe.read(&mut [], Timeout::Forever).unwrap(), 0);
    }

    #[test]
    fn zero_capacity_pipe_always_blocks() {
        let pipe = Pipe::new(0);
        assert_eq!(
            pipe.write(b"x", Timeout::None).unwrap_err().errno(),
            Errno::EAGAIN
        );
        assert_eq!(
            pipe.read(&mut [0u8; 1], Timeout::None).unwrap_err().errno(),
            Errno::EAGAIN
        );
    }

    #[test]
    fn write_longer_than_capacity_saturates() {
        let pipe = Pipe::new(4);
        assert_eq!(pipe.write(b"HELLO", Timeout::None).unwrap(), 4);
        let mut buf = [0u8; 4];
        assert_eq!(pipe.read(&mut buf, Timeout::None).unwrap(), 4);
        assert_eq!(&buf, b"HELL");
    }

    #[test]
    fn no_wait_semantics() {
        let pipe = Pipe::new(1);
        assert_eq!(pipe.write(b"x", Timeout::None).unwrap(), 1);
        assert_eq!(
            pipe.write(b"y", Timeout::None).unwrap_err().errno(),
            Errno::EAGAIN
        );

        let empty = Pipe::new(4);
        assert_eq!(
            empty
                .read(&mut [0u8; 1], Timeout::None)
                .unwrap_err()
                .errno(),
            Errno::EAGAIN
        );
    }

    #[test]
    fn blocked_reader_unblocked_by_writer() {
        let pipe = Arc::new(Pipe::new(16));
        let reader_pipe = pipe.clone();
        let reader = thread::spawn(move || {
            let mut buf = [0u8; 1];
            let n = reader_pipe.read(&mut buf, Timeout::Forever).unwrap();
            (n, buf)
        });

        // Give the reader a moment to actually block before writing.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(pipe.write(b"X", Timeout::Forever).unwrap(), 1);

        let (n, buf) = reader.join().unwrap();
        assert_eq!(n, 1);
        assert_eq!(&buf[..1], b"X");
    }

    #[test]
    fn blocked_writer_released_by_reader() {
        let pipe = Arc::new(Pipe::new(4));
        pipe.write(b"ABCD", Timeout::None).unwrap();

        let writer_pipe = pipe.clone();
        let writer = thread::spawn(move || writer_pipe.write(b"Y", Timeout::Forever).unwrap());

        thread::sleep(Duration::from_millis(50));
        let mut buf = [0u8; 1];
        assert_eq!(pipe.read(&mut buf, Timeout::None).unwrap(), 1);

        assert_eq!(writer.join().unwrap(), 1);
    }

    #[test]
    fn reset_cancels_waiters_and_self_clears() {
        let _ = env_logger::try_init();
        let pipe = Arc::new(Pipe::new(4));

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let pipe = pipe.clone();
                thread::spawn(move || {
                    pipe.read(&mut [0u8; 1], Timeout::Forever)
                        .unwrap_err()
                        .errno()
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        pipe.reset();

        for reader in readers {
            assert_eq!(reader.join().unwrap(), Errno::ECANCELED);
        }

        // The reset flag must have self-cleared once both waiters departed.
        assert_eq!(pipe.write(b"Z", Timeout::None).unwrap(), 1);
    }

    #[test]
    fn reset_with_no_waiters_is_immediate() {
        let pipe = Pipe::new(4);
        pipe.write(b"abc", Timeout::None).unwrap();
        pipe.reset();
        assert!(pipe.is_empty());
        assert_eq!(pipe.write(b"d", Timeout::None).unwrap(), 1);
    }

    #[test]
    fn close_drains_then_reports_eof() {
        let pipe = Pipe::new(8);
        pipe.write(b"ABC", Timeout::None).unwrap();
        pipe.close().unwrap();

        let mut buf = [0u8; 10];
        assert_eq!(pipe.read(&mut buf, Timeout::None).unwrap(), 3);
        assert_eq!(&buf[..3], b"ABC");

        assert_eq!(
            pipe.read(&mut buf, Timeout::None).unwrap_err().errno(),
            Errno::EPIPE
        );
        assert_eq!(
            pipe.write(b"x", Timeout::None).unwrap_err().errno(),
            Errno::EPIPE
        );
    }

    #[test]
    fn close_twice_is_ealready() {
        let pipe = Pipe::new(4);
        assert!(pipe.close().is_ok());
        assert_eq!(pipe.close().unwrap_err().errno(), Errno::EALREADY);
    }

    #[test]
    fn blocked_reader_drains_on_close() {
        let pipe = Arc::new(Pipe::new(4));
        pipe.write(b"Q", Timeout::None).unwrap();

        let reader_pipe = pipe.clone();
        let reader = thread::spawn(move || {
            let mut first = [0u8; 1];
            let n1 = reader_pipe.read(&mut first, Timeout::Forever).unwrap();
            let err = reader_pipe
                .read(&mut [0u8; 1], Timeout::Forever)
                .unwrap_err()
                .errno();
            (n1, first, err)
        });

        thread::sleep(Duration::from_millis(50));

        // There's one byte already buffered, so this read doesn't actually need to
        // block; close a second blocked reader waiting on an empty buffer instead.
        let second_pipe = pipe.clone();
        let second = thread::spawn(move || {
            second_pipe
                .read(&mut [0u8; 1], Timeout::Forever)
                .unwrap_err()
                .errno()
        });
        thread::sleep(Duration::from_millis(50));
        pipe.close().unwrap();

        let (n1, first, err) = reader.join().unwrap();
        assert_eq!(n1, 1);
        assert_eq!(&first, b"Q");
        assert_eq!(err, Errno::EPIPE);
        assert_eq!(second.join().unwrap(), Errno::EPIPE);
    }

    #[test]
    fn finite_timeout_expires() {
        let pipe = Pipe::new(4);
        let err = pipe
            .read(&mut [0u8; 1], Timeout::After(Duration::from_millis(20)))
            .unwrap_err();
        assert_eq!(err.errno(), Errno::EAGAIN);
    }

    #[test]
    fn finite_timeout_succeeds_if_woken_in_time() {
        let pipe = Arc::new(Pipe::new(4));
        let writer_pipe = pipe.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer_pipe.write(b"z", Timeout::Forever).unwrap();
        });

        let mut buf = [0u8; 1];
        let n = pipe
            .read(&mut buf, Timeout::After(Duration::from_millis(500)))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(&buf, b"z");
    }
}
