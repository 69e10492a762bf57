// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! An in-process, in-memory transport used by the protocol test suite and
//! by `libiio-core`'s own tests that need a deterministic backend without a
//! real socket, serial port, or USB device.

use super::{CancelToken, Transport};
use libiio_common::IioError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const POLL_SLICE: Duration = Duration::from_millis(1);

#[derive(Default)]
struct Pipe {
    buf: Mutex<VecDeque<u8>>,
}

/// One end of an in-memory duplex pipe. `pair()` returns two ends wired to
/// each other: writes on one are visible to reads on the other.
pub struct LoopbackTransport {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl LoopbackTransport {
    pub fn pair() -> (LoopbackTransport, LoopbackTransport) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());
        let a = LoopbackTransport {
            rx: b_to_a.clone(),
            tx: a_to_b.clone(),
            cancel: CancelToken::new(),
            timeout: None,
        };
        let b = LoopbackTransport {
            rx: a_to_b,
            tx: b_to_a,
            cancel: CancelToken::new(),
            timeout: None,
        };
        (a, b)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl Transport for LoopbackTransport {
    fn read(&mut self, buf: &mut [u8], deadline: Option<Duration>) -> Result<usize, IioError> {
        let effective = deadline.or(self.timeout);
        let start = Instant::now();
        loop {
            if self.cancel.is_cancelled() {
                return Err(IioError::Cancelled);
            }
            {
                let mut q = self.rx.buf.lock().unwrap();
                if !q.is_empty() {
                    let n = q.len().min(buf.len());
                    for b in buf.iter_mut().take(n) {
                        *b = q.pop_front().unwrap();
                    }
                    return Ok(n);
                }
            }
            if let Some(d) = effective {
                if start.elapsed() >= d {
                    return Err(IioError::Timeout);
                }
            }
            std::thread::sleep(POLL_SLICE);
        }
    }

    fn write(&mut self, buf: &[u8], _deadline: Option<Duration>) -> Result<usize, IioError> {
        if self.cancel.is_cancelled() {
            return Err(IioError::Cancelled);
        }
        let mut q = self.tx.buf.lock().unwrap();
        q.extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn close(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn writes_on_one_end_are_read_on_the_other() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.write(b"ping", None).unwrap();
        let mut buf = [0u8; 4];
        let n = b.read(&mut buf, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn read_times_out_with_no_data() {
        let (_a, mut b) = LoopbackTransport::pair();
        let mut buf = [0u8; 4];
        let err = b.read(&mut buf, Some(Duration::from_millis(10))).unwrap_err();
        assert!(matches!(err, IioError::Timeout));
    }

    #[test]
    fn cancel_unblocks_a_pending_read() {
        let (a, mut b) = LoopbackTransport::pair();
        let token = b.cancel_token();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 4];
            b.read(&mut buf, Some(Duration::from_secs(5)))
        });
        thread::sleep(Duration::from_millis(10));
        token.cancel();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(IioError::Cancelled)));
        drop(a);
    }
}
