// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Byte-stream transport abstraction (spec.md §4.1 / C1).
//!
//! A [`Transport`] presents any backend's wire as a plain `(reader, writer)`
//! pair plus a third, orthogonal channel: cancellation, which can unblock a
//! pending read or write from any other thread. Concrete implementations
//! (TCP, serial, USB bulk, loopback) live beside this trait or in the
//! backend crates that own the underlying file descriptor.

pub mod cancel;
pub mod loopback;
pub mod tcp;

pub use cancel::CancelToken;

use libiio_common::IioError;
use std::time::Duration;

/// Byte-stream transport over TCP / USB bulk / serial / loopback, with
/// cancellation. Every operation is blocking by default; `deadline` bounds
/// the wait (`None` = the transport's configured timeout, which may itself
/// be infinite per `set_timeout(0)`).
pub trait Transport: Send {
    /// Reads at least one byte into `buf`, returning the number read.
    /// Partial reads are allowed. Returns `Cancelled` if `cancel()` fires
    /// before data arrives, `Timeout` if the deadline elapses first.
    fn read(&mut self, buf: &mut [u8], deadline: Option<Duration>) -> Result<usize, IioError>;

    /// Writes at least one byte from `buf`, returning the number written.
    /// Partial writes are allowed.
    fn write(&mut self, buf: &[u8], deadline: Option<Duration>) -> Result<usize, IioError>;

    /// Reads `buf.len()` bytes, retrying short reads and transparently
    /// retrying on `Interrupted` (§7 propagation policy), but passing
    /// through `Timeout`/`Cancelled`/`PeerClosed` immediately.
    fn read_exact(&mut self, mut buf: &mut [u8], deadline: Option<Duration>) -> Result<(), IioError> {
        while !buf.is_empty() {
            match self.read(buf, deadline) {
                Ok(0) => return Err(IioError::PeerClosed),
                Ok(n) => buf = &mut buf[n..],
                Err(IioError::Io(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Writes the entirety of `buf`, retrying short writes.
    fn write_all(&mut self, mut buf: &[u8], deadline: Option<Duration>) -> Result<(), IioError> {
        while !buf.is_empty() {
            match self.write(buf, deadline) {
                Ok(0) => return Err(IioError::PeerClosed),
                Ok(n) => buf = &buf[n..],
                Err(IioError::Io(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Idempotent; wakes any in-flight read/write on this handle (and any
    /// clone of its [`CancelToken`]) with `Cancelled`. Safe from any thread.
    fn cancel(&self);

    /// `None` means infinite (ms=0 in the wire sense).
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Idempotent; implies `cancel()`.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::loopback::LoopbackTransport;
    use super::*;

    #[test]
    fn read_exact_assembles_partial_reads() {
        let (mut a, mut b) = LoopbackTransport::pair();
        let writer = std::thread::spawn(move || {
            b.write_all(b"hello world", None).unwrap();
        });
        let mut buf = [0u8; 11];
        a.read_exact(&mut buf, Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(&buf, b"hello world");
        writer.join().unwrap();
    }
}
