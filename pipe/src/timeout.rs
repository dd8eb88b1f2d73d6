// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

/// How long a blocking [`Pipe`](crate::Pipe) operation is willing to wait.
///
/// The distilled spec only names the two extremes a blocking syscall boundary cares
/// about ("no-wait" and "forever"); [`Timeout::After`] is added because the teacher's own
/// wait-queue collaborator (`WaitQueue::wait_until_or_timeout`) supports a finite bound,
/// and a blocking IPC primitive without one would not be representative of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Fail immediately with [`Errno::EAGAIN`](crate::error::Errno::EAGAIN) rather than block.
    None,
    /// Block for at most the given duration, then return `EAGAIN` if the wait condition
    /// still holds.
    After(Duration),
    /// Block indefinitely until the wait condition clears or the pipe is reset/closed.
    Forever,
}

impl Timeout {
    /// Returns whether this timeout permits blocking at all.
    pub const fn is_blocking(&self) -> bool {
        !matches!(self, Timeout::None)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}
