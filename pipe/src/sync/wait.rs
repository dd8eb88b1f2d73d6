// SPDX-License-Identifier: MPL-2.0

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::{Duration, Instant};

use super::spin::SpinLock;

/// A wait queue.
///
/// One may wait on a wait queue to put its executing thread to sleep.
/// Multiple threads may be the waiters of a wait queue.
/// Other threads may invoke the `wake`-family methods of a wait queue to
/// wake up one or many waiter threads.
///
/// Unlike the in-kernel original, the thread this suspends is a real OS thread parked via
/// [`std::thread::park`]/[`std::thread::Thread::unpark`] rather than a scheduler-managed
/// kernel task; the FIFO queue discipline and the wake-one/wake-all/timeout semantics are
/// otherwise unchanged.
pub struct WaitQueue {
    // A copy of `wakers.len()`, used for the lock-free fast path in `wake_one` and `wake_all`.
    num_wakers: AtomicU32,
    wakers: SpinLock<VecDeque<Arc<Waker>>>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        WaitQueue {
            num_wakers: AtomicU32::new(0),
            wakers: SpinLock::new(VecDeque::new()),
        }
    }

    /// Waits until some condition becomes true, or the cancel condition becomes true.
    ///
    /// Returns `Some(_)` if the condition returns `Some(_)` first, or the condition test
    /// result (possibly `None`) once the cancel condition becomes true. The wait has no
    /// timeout; use [`Self::wait_until_or_timeout`] for a bounded wait.
    pub fn wait_until_or_cancelled<F, R, FCancel>(
        &self,
        mut cond: F,
        cancel_cond: FCancel,
    ) -> Option<R>
    where
        F: FnMut() -> Option<R>,
        FCancel: Fn() -> bool,
    {
        if let Some(res) = cond() {
            return Some(res);
        }

        let (waiter, waker) = Waiter::new_pair();

        loop {
            // Enqueue the waker before checking `cond()` to avoid races.
            self.enqueue(waker.clone());

            if let Some(res) = cond() {
                return Some(res);
            }

            if cancel_cond() {
                // Drop the waiter and check again to avoid missing a wake event.
                drop(waiter);
                return cond();
            }

            waiter.wait();
        }
    }

    /// Like [`Self::wait_until_or_cancelled`], but also gives up once `timeout` has
    /// elapsed since the call began, in which case the condition's last value (possibly
    /// `None`) is returned.
    pub fn wait_until_or_timeout<F, R, FCancel>(
        &self,
        mut cond: F,
        cancel_cond: FCancel,
        timeout: Duration,
    ) -> Option<R>
    where
        F: FnMut() -> Option<R>,
        FCancel: Fn() -> bool,
    {
        if let Some(res) = cond() {
            return Some(res);
        }

        let (waiter, waker) = Waiter::new_pair();
        let deadline = Instant::now() + timeout;

        loop {
            self.enqueue(waker.clone());

            if let Some(res) = cond() {
                return Some(res);
            }

            if cancel_cond() {
                drop(waiter);
                return cond();
            }

            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                drop(waiter);
                return cond();
            };

            waiter.wait_timeout(remaining);
        }
    }

    /// Wakes up one waiting thread.
    pub fn wake_one(&self) {
        // Fast path.
        if self.is_empty() {
            return;
        }

        loop {
            let mut wakers = self.wakers.lock();
            let Some(waker) = wakers.pop_front() else {
                break;
            };
            self.num_wakers.fetch_sub(1, Ordering::Release);
            // Avoid holding the lock when calling `wake_up`.
            drop(wakers);

            if waker.wake_up() {
                return;
            }
        }
    }

    /// Wakes up all waiting threads.
    pub fn wake_all(&self) {
        // Fast path.
        if self.is_empty() {
            return;
        }

        loop {
            let mut wakers = self.wakers.lock();
            let Some(waker) = wakers.pop_front() else {
                break;
            };
            self.num_wakers.fetch_sub(1, Ordering::Release);
            drop(wakers);

            waker.wake_up();
        }
    }

    /// Returns whether the current wait queue is empty.
    pub fn is_empty(&self) -> bool {
        self.num_wakers.load(Ordering::Acquire) == 0
    }

    pub(crate) fn enqueue(&self, waker: Arc<Waker>) {
        let mut wakers = self.wakers.lock();
        wakers.push_back(waker);
        self.num_wakers.fetch_add(1, Ordering::Release);
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A waiter that can put the current thread to sleep until it is woken up by the
/// associated [`Waker`], or until a timeout elapses.
///
/// By definition, a waiter belongs to the current thread, so it cannot be sent to another
/// thread and its reference cannot be shared between threads.
pub struct Waiter {
    waker: Arc<Waker>,
}

/// A waker that can wake up the associated [`Waiter`].
///
/// A waker can be created by calling [`Waiter::new_pair`]. The resulting `Arc<Waker>` can
/// be shared across threads (it is enqueued on a [`WaitQueue`] by value).
pub struct Waker {
    has_woken: AtomicBool,
    thread: Thread,
}

impl Waiter {
    /// Creates a waiter and its associated [`Waker`], bound to the current thread.
    pub fn new_pair() -> (Self, Arc<Waker>) {
        let waker = Arc::new(Waker {
            has_woken: AtomicBool::new(false),
            thread: std::thread::current(),
        });
        let waiter = Self {
            waker: waker.clone(),
        };
        (waiter, waker)
    }

    /// Waits until the waiter is woken up by calling [`Waker::wake_up`].
    ///
    /// Returns immediately if the waiter has already been woken since it was created or
    /// since the last call to this method.
    pub fn wait(&self) {
        self.waker.do_wait();
    }

    /// Like [`Self::wait`], but gives up after `timeout` if no wake-up arrives.
    pub fn wait_timeout(&self, timeout: Duration) {
        self.waker.do_wait_timeout(timeout);
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        // Close the waker so that any wake-up racing with this drop becomes a no-op,
        // rather than unparking a thread that is no longer waiting on this waker.
        self.waker.close();
    }
}

impl Waker {
    /// Wakes up the associated [`Waiter`].
    ///
    /// Returns `true` if the waiter is woken by this call. Returns `false` if the waiter
    /// has already been woken by a previous call, or has already been dropped.
    pub fn wake_up(&self) -> bool {
        if self.has_woken.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.thread.unpark();
        true
    }

    fn do_wait(&self) {
        while !self.has_woken.load(Ordering::Acquire) {
            std::thread::park();
        }
        self.has_woken.store(false, Ordering::Release);
    }

    fn do_wait_timeout(&self, timeout: Duration) {
        if !self.has_woken.load(Ordering::Acquire) {
            std::thread::park_timeout(timeout);
        }
        self.has_woken.store(false, Ordering::Release);
    }

    fn close(&self) {
        self.has_woken.store(true, Ordering::Release);
    }
}
