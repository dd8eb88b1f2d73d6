// SPDX-License-Identifier: MPL-2.0

//! The two low-level synchronization primitives [`Pipe`](crate::Pipe) is built from: a
//! busy-wait [`SpinLock`] serializing pipe state, and a FIFO [`WaitQueue`] for the data
//! and space wait queues.

mod spin;
mod wait;

pub use spin::{SpinLock, SpinLockGuard};
pub use wait::{Waiter, WaitQueue, Waker};
