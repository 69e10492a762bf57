// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The cancellation primitive shared by every [`Transport`](super::Transport)
//! implementation.
//!
//! `Buffer.cancel()` (spec.md §4.7, §5) must unblock a pending read/write on
//! another thread within a bounded delay, without polling. On Unix we join
//! an `eventfd` with the data file descriptor in a single `poll(2)` call;
//! writing to the eventfd wakes the poll immediately. Platforms without a
//! pollable wakeup primitive fall back to a bounded-latency poll loop that
//! rechecks the atomic flag — still sticky and one-shot, just not
//! interrupt-driven.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A cancellation flag shared between the owner (e.g. a `Buffer`) and every
/// transport handle bound to it. Cloning shares the same underlying state;
/// `cancel()` is idempotent and may be called from any thread at any time
/// (spec.md §5).
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    #[cfg(unix)]
    eventfd: nix::sys::eventfd::EventFd,
}

impl CancelToken {
    pub fn new() -> Self {
        #[cfg(unix)]
        let eventfd = nix::sys::eventfd::EventFd::from_flags(
            nix::sys::eventfd::EfdFlags::EFD_CLOEXEC | nix::sys::eventfd::EfdFlags::EFD_NONBLOCK,
        )
        .expect("eventfd creation must not fail under normal resource limits");

        CancelToken {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                #[cfg(unix)]
                eventfd,
            }),
        }
    }

    /// Sticky, idempotent: once set, stays set for the life of this token.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            #[cfg(unix)]
            {
                use std::os::fd::AsRawFd;
                use std::os::unix::io::BorrowedFd;
                let fd = unsafe { BorrowedFd::borrow_raw(self.inner.eventfd.as_raw_fd()) };
                // Any nonzero value wakes every poller blocked on this fd.
                let _ = nix::unistd::write(fd, &1u64.to_ne_bytes());
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    #[cfg(unix)]
    pub(crate) fn wakeup_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::fd::AsRawFd;
        self.inner.eventfd.as_raw_fd()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocks the calling thread on `data_fd` becoming readable, the deadline
/// elapsing, or `cancel` being tripped — whichever happens first. Returns
/// `Ok(true)` if `data_fd` is ready, `Ok(false)` on a plain timeout, or
/// `Err(Cancelled)` if the token fired.
#[cfg(unix)]
pub fn wait_readable(
    data_fd: std::os::unix::io::RawFd,
    cancel: &CancelToken,
    deadline: Option<Duration>,
) -> Result<bool, libiio_common::IioError> {
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use std::os::fd::BorrowedFd;

    let data = unsafe { BorrowedFd::borrow_raw(data_fd) };
    let wake = unsafe { BorrowedFd::borrow_raw(cancel.wakeup_fd()) };
    let mut fds = [
        PollFd::new(data, PollFlags::POLLIN),
        PollFd::new(wake, PollFlags::POLLIN),
    ];

    let timeout: PollTimeout = match deadline {
        Some(d) => (d.as_millis().min(i32::MAX as u128) as i32)
            .try_into()
            .unwrap_or(PollTimeout::MAX),
        None => PollTimeout::NONE,
    };

    loop {
        match poll(&mut fds, timeout) {
            Ok(0) => return Ok(false),
            Ok(_) => {
                if cancel.is_cancelled() {
                    return Err(libiio_common::IioError::Cancelled);
                }
                let wake_ready = fds[1]
                    .revents()
                    .map(|r| r.contains(PollFlags::POLLIN))
                    .unwrap_or(false);
                if wake_ready {
                    return Err(libiio_common::IioError::Cancelled);
                }
                return Ok(true);
            }
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(std::io::Error::from(e).into()),
        }
    }
}

/// Portable fallback used on non-Unix targets: polls the cancel flag in
/// small slices, bounded by `deadline`. Latency is bounded by
/// `POLL_SLICE`, not interrupt-driven.
#[cfg(not(unix))]
pub const POLL_SLICE: Duration = Duration::from_millis(20);

#[cfg(not(unix))]
pub fn poll_cancelled_or_elapsed(
    cancel: &CancelToken,
    deadline: Option<Duration>,
) -> Result<(), libiio_common::IioError> {
    let start = std::time::Instant::now();
    loop {
        if cancel.is_cancelled() {
            return Err(libiio_common::IioError::Cancelled);
        }
        if let Some(d) = deadline {
            if start.elapsed() >= d {
                return Err(libiio_common::IioError::Timeout);
            }
        }
        std::thread::sleep(POLL_SLICE);
    }
}
