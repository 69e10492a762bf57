// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! TCP transport for the `ip:` backend (spec.md §4.4). IIOD listens on port
//! 30431 by default.

use super::{CancelToken, Transport};
use libiio_common::IioError;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const IIOD_DEFAULT_PORT: u16 = 30431;

const SLICE: Duration = Duration::from_millis(50);

pub struct TcpTransport {
    stream: TcpStream,
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn connect(addr: impl ToSocketAddrs, connect_timeout: Duration) -> Result<Self, IioError> {
        let addr: SocketAddr = addr
            .to_socket_addrs()
            .map_err(IioError::Io)?
            .next()
            .ok_or_else(|| IioError::BadArgument("no address resolved".into()))?;
        let stream = TcpStream::connect_timeout(&addr, connect_timeout).map_err(IioError::Io)?;
        stream.set_nodelay(true).map_err(IioError::Io)?;
        Ok(TcpTransport {
            stream,
            cancel: CancelToken::new(),
            timeout: None,
        })
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn wait_slice(&mut self, deadline: Option<Duration>) -> Result<bool, IioError> {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;
            super::cancel::wait_readable(self.stream.as_raw_fd(), &self.cancel, deadline)
        }
        #[cfg(not(unix))]
        {
            if self.cancel.is_cancelled() {
                return Err(IioError::Cancelled);
            }
            let slice = deadline.map(|d| d.min(SLICE)).unwrap_or(SLICE);
            self.stream.set_read_timeout(Some(slice)).map_err(IioError::Io)?;
            Ok(true)
        }
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8], deadline: Option<Duration>) -> Result<usize, IioError> {
        let start = std::time::Instant::now();
        loop {
            if self.cancel.is_cancelled() {
                return Err(IioError::Cancelled);
            }
            let ready = self.wait_slice(deadline.map(|d| d.saturating_sub(start.elapsed())))?;
            if !ready {
                if let Some(d) = deadline {
                    if start.elapsed() >= d {
                        return Err(IioError::Timeout);
                    }
                    continue;
                }
                continue;
            }
            match self.stream.read(buf) {
                Ok(0) => return Err(IioError::PeerClosed),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if let Some(d) = deadline {
                        if start.elapsed() >= d {
                            return Err(IioError::Timeout);
                        }
                    }
                    continue;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IioError::Io(e)),
            }
        }
    }

    fn write(&mut self, buf: &[u8], deadline: Option<Duration>) -> Result<usize, IioError> {
        if self.cancel.is_cancelled() {
            return Err(IioError::Cancelled);
        }
        self.stream
            .set_write_timeout(deadline.or(self.timeout))
            .map_err(IioError::Io)?;
        match self.stream.write(buf) {
            Ok(0) => Err(IioError::PeerClosed),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(IioError::Timeout),
            Err(e) => Err(IioError::Io(e)),
        }
    }

    fn cancel(&self) {
        self.cancel.cancel();
        // Unblocks a poll() that's already past the wakeup check but still
        // parked in the kernel read() itself on platforms without a true
        // multiplexed wait (shutdown is otherwise a no-op once cancelled).
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn close(&mut self) {
        self.cancel();
    }
}
