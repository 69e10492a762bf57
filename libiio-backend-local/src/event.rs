// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Event chardev I/O (spec.md §4.5 / C5, §4.8 / C8): `ioctl(fd,
//! IIO_GET_EVENT_FD_IOCTL)` on the device chardev yields a second fd that
//! produces one fixed-size `struct iio_event_data` per `read(2)`.

use crate::chardev::ioctl_call;
use crate::ioctl;
use libiio_common::IioError;
use libiio_core::RawEvent;
use libiio_protocol::transport::cancel::wait_readable;
use libiio_protocol::CancelToken;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::time::Duration;

const EVENT_RECORD_SIZE: usize = 16;

pub struct ChardevEventStream {
    file: File,
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl ChardevEventStream {
    pub fn open(device_id: &str, cancel: CancelToken, timeout: Option<Duration>) -> Result<Self, IioError> {
        let path = format!("/dev/{device_id}");
        let dev_file = OpenOptions::new().read(true).open(&path).map_err(IioError::Io)?;

        let mut event_fd: i32 = -1;
        unsafe {
            ioctl_call(
                dev_file.as_raw_fd(),
                ioctl::IIO_GET_EVENT_FD_IOCTL,
                &mut event_fd as *mut _ as *mut libc::c_void,
            )
            .map_err(IioError::Io)?;
        }
        // SAFETY: the ioctl above handed us ownership of a freshly opened fd.
        let file = unsafe { File::from_raw_fd(event_fd) };
        Ok(ChardevEventStream { file, cancel, timeout })
    }

    pub fn read(&self, nonblock: bool) -> Result<RawEvent, IioError> {
        let mut buf = [0u8; EVENT_RECORD_SIZE];
        let mut filled = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(IioError::Cancelled);
            }
            match (&self.file).read(&mut buf[filled..]) {
                Ok(0) => return Err(IioError::PeerClosed),
                Ok(n) => {
                    filled += n;
                    if filled == EVENT_RECORD_SIZE {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if nonblock {
                        return Err(IioError::WouldBlock);
                    }
                    match wait_readable(self.file.as_raw_fd(), &self.cancel, self.timeout) {
                        Ok(true) => continue,
                        Ok(false) => return Err(IioError::Timeout),
                        Err(e) => return Err(e),
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IioError::Io(e)),
            }
        }
        let id = u64::from_ne_bytes(buf[0..8].try_into().unwrap());
        let timestamp_ns = i64::from_ne_bytes(buf[8..16].try_into().unwrap());
        Ok(RawEvent { id, timestamp_ns })
    }
}
