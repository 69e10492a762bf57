// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Buffer chardev I/O (spec.md §4.5 / C5): `/dev/iio:deviceN` opened
//! `O_RDWR | O_NONBLOCK`, either through the ioctl-allocated mmap'd block
//! pool or, when the kernel/driver doesn't support it, a plain blocking
//! `read(2)`/`write(2)` fallback. Either path joins the buffer's
//! [`CancelToken`] so `Buffer::cancel()` unblocks it from any thread.

use crate::ioctl::{self, BlockDesc};
use libiio_common::IioError;
use libiio_protocol::transport::cancel::wait_readable;
use libiio_protocol::CancelToken;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Blocks requested from [`IIO_BLOCK_ALLOC_IOCTL`] when the mmap path is
/// available. A small, fixed pool; `Stream` layers its own prefetch depth
/// on top independent of this.
const MMAP_BLOCK_COUNT: u32 = 4;

pub(crate) unsafe fn ioctl_call(fd: i32, request: u64, arg: *mut libc::c_void) -> std::io::Result<i32> {
    let ret = libc::ioctl(fd, request as _, arg);
    if ret < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

struct MmapBlock {
    desc: BlockDesc,
    map: MmapMut,
}

enum Transport {
    /// `IIO_BLOCK_ALLOC_IOCTL` succeeded: blocks are mmap'd kernel memory,
    /// enqueued/dequeued by index via ioctl.
    Mmap { blocks: Vec<MmapBlock> },
    /// The kernel/driver doesn't support the block ioctls (old driver, or
    /// a device that only ever supported the legacy ABI): plain
    /// `read`/`write` on the chardev, one block's worth at a time.
    ReadWrite,
}

/// The backend-private buffer handle stashed inside a `BackendBufferHandle`.
pub struct ChardevBuffer {
    file: Mutex<File>,
    cancel: CancelToken,
    transport: Transport,
    timeout: Option<Duration>,
}

impl ChardevBuffer {
    pub fn open(device_id: &str, cancel: CancelToken, timeout: Option<Duration>) -> Result<Self, IioError> {
        let path = format!("/dev/{device_id}");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .map_err(IioError::Io)?;

        let transport = match try_alloc_mmap_blocks(&file) {
            Ok(blocks) => {
                debug!(device = device_id, blocks = blocks.len(), "buffer chardev using mmap ioctl path");
                Transport::Mmap { blocks }
            }
            Err(e) => {
                debug!(device = device_id, error = %e, "buffer chardev falling back to read/write path");
                Transport::ReadWrite
            }
        };

        Ok(ChardevBuffer { file: Mutex::new(file), cancel, transport, timeout })
    }

    pub fn enqueue(&self, data: &[u8], bytes_used: usize, cyclic: bool) -> Result<(), IioError> {
        match &self.transport {
            Transport::Mmap { blocks } => {
                let fd = self.file.lock().unwrap().as_raw_fd();
                let block = blocks.first().ok_or(IioError::BadState("no blocks allocated".into()))?;
                let mut desc = block.desc;
                desc.bytes_used = bytes_used as u32;
                // SAFETY: `desc` is a valid `BlockDesc` describing a block
                // this fd owns from a prior successful ALLOC/QUERY.
                unsafe {
                    ioctl_call(fd, ioctl::IIO_BLOCK_ENQUEUE_IOCTL, &mut desc as *mut _ as *mut libc::c_void)
                        .map_err(IioError::Io)?;
                }
                trace!(cyclic, bytes_used, "enqueued mmap block");
                Ok(())
            }
            Transport::ReadWrite => {
                let mut file = self.file.lock().unwrap();
                write_all_cancellable(&mut file, &data[..bytes_used], &self.cancel, self.timeout)
            }
        }
    }

    pub fn dequeue(&self, data: &mut [u8], nonblock: bool) -> Result<usize, IioError> {
        match &self.transport {
            Transport::Mmap { blocks } => {
                let fd = self.file.lock().unwrap().as_raw_fd();
                if !nonblock {
                    match wait_readable(fd, &self.cancel, self.timeout) {
                        Ok(true) => {}
                        Ok(false) => return Err(IioError::Timeout),
                        Err(e) => return Err(e),
                    }
                }
                let block = blocks.first().ok_or(IioError::BadState("no blocks allocated".into()))?;
                let mut desc = block.desc;
                unsafe {
                    match ioctl_call(fd, ioctl::IIO_BLOCK_DEQUEUE_IOCTL, &mut desc as *mut _ as *mut libc::c_void) {
                        Ok(_) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock && nonblock => {
                            return Err(IioError::WouldBlock)
                        }
                        Err(e) => return Err(IioError::Io(e)),
                    }
                }
                let n = (desc.bytes_used as usize).min(data.len());
                data[..n].copy_from_slice(&block.map[..n]);
                Ok(n)
            }
            Transport::ReadWrite => {
                let mut file = self.file.lock().unwrap();
                read_cancellable(&mut file, data, nonblock, &self.cancel, self.timeout)
            }
        }
    }

    pub fn close(&self) -> Result<(), IioError> {
        if let Transport::Mmap { .. } = &self.transport {
            let fd = self.file.lock().unwrap().as_raw_fd();
            unsafe {
                let _ = ioctl_call(fd, ioctl::IIO_BLOCK_FREE_IOCTL, std::ptr::null_mut());
            }
        }
        Ok(())
    }
}

fn try_alloc_mmap_blocks(file: &File) -> Result<Vec<MmapBlock>, IioError> {
    let fd = file.as_raw_fd();
    let mut request = (MMAP_BLOCK_COUNT, 0u32);
    unsafe {
        ioctl_call(fd, ioctl::IIO_BLOCK_ALLOC_IOCTL, &mut request as *mut _ as *mut libc::c_void)
            .map_err(IioError::Io)?;
    }
    let mut blocks = Vec::with_capacity(MMAP_BLOCK_COUNT as usize);
    for id in 0..MMAP_BLOCK_COUNT {
        let mut desc = BlockDesc { id, size: 0, bytes_used: 0, offset: 0 };
        unsafe {
            ioctl_call(fd, ioctl::IIO_BLOCK_QUERY_IOCTL, &mut desc as *mut _ as *mut libc::c_void)
                .map_err(IioError::Io)?;
        }
        // SAFETY: the kernel has just told us this block's size/offset via
        // QUERY; the mapping is valid for the chardev's lifetime.
        let map = unsafe {
            memmap2::MmapOptions::new()
                .offset(desc.offset as u64)
                .len(desc.size as usize)
                .map_mut(file)
                .map_err(IioError::Io)?
        };
        blocks.push(MmapBlock { desc, map });
    }
    Ok(blocks)
}

fn write_all_cancellable(
    file: &mut File,
    mut data: &[u8],
    cancel: &CancelToken,
    timeout: Option<Duration>,
) -> Result<(), IioError> {
    while !data.is_empty() {
        if cancel.is_cancelled() {
            return Err(IioError::Cancelled);
        }
        match file.write(data) {
            Ok(0) => return Err(IioError::PeerClosed),
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                match wait_readable(file.as_raw_fd(), cancel, timeout) {
                    Ok(_) => continue,
                    Err(e) => return Err(e),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(IioError::Io(e)),
        }
    }
    Ok(())
}

fn read_cancellable(
    file: &mut File,
    data: &mut [u8],
    nonblock: bool,
    cancel: &CancelToken,
    timeout: Option<Duration>,
) -> Result<usize, IioError> {
    loop {
        if cancel.is_cancelled() {
            return Err(IioError::Cancelled);
        }
        match file.read(data) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if nonblock {
                    return Err(IioError::WouldBlock);
                }
                match wait_readable(file.as_raw_fd(), cancel, timeout) {
                    Ok(true) => continue,
                    Ok(false) => return Err(IioError::Timeout),
                    Err(e) => return Err(e),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(IioError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ioctl_call_reports_errno_on_failure() {
        // An invalid fd (-1) always fails with EBADF; exercises the error
        // path without needing a real IIO chardev.
        let err = unsafe { ioctl_call(-1, ioctl::IIO_BLOCK_FREE_IOCTL, std::ptr::null_mut()) }.unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
