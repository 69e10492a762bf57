// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The prefetching [`Stream`] helper over a [`Buffer`] (spec.md §4.7):
//! owns N blocks and presents them as a circular iterator, enqueueing the
//! just-returned block on each step.

use crate::buffer::{Block, Buffer};
use libiio_common::IioError;
use std::sync::Arc;

/// A convenience wrapper that turns repeated `enqueue`/`dequeue` pairs into
/// a single `next()` call. Priming (spec.md §4.7): the first call enqueues
/// every block up front (maximizing how far ahead the hardware can run)
/// then dequeues block 0; every later call re-enqueues the block it
/// previously handed out before dequeuing the next one in FIFO order.
pub struct Stream {
    buffer: Arc<Buffer>,
    blocks: Vec<Block>,
    cursor: usize,
    primed: bool,
}

impl Stream {
    pub fn new(buffer: Arc<Buffer>, nb_blocks: usize, bytes_per_block: usize) -> Result<Stream, IioError> {
        if nb_blocks == 0 {
            return Err(IioError::BadArgument("a stream needs at least one block".into()));
        }
        let blocks = (0..nb_blocks).map(|_| buffer.create_block(bytes_per_block)).collect();
        Ok(Stream { buffer, blocks, cursor: 0, primed: false })
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the head block, borrowed until the next call to `next()`.
    pub fn next(&mut self) -> Result<&mut Block, IioError> {
        let n = self.blocks.len();
        if !self.primed {
            for block in self.blocks.iter_mut() {
                block.enqueue(0, false)?;
            }
            self.primed = true;
        } else {
            self.blocks[self.cursor].enqueue(0, false)?;
        }
        self.blocks[self.cursor].dequeue(false)?;
        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % n;
        Ok(&mut self.blocks[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AttrRef, Backend, BackendBufferHandle, BackendEventHandle, ContextBuildResult, ContextParams};
    use crate::event::RawEvent;
    use crate::mask::ChannelsMask;
    use crate::model::DeviceData;
    use libiio_protocol::CancelToken;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A backend whose dequeue always completes immediately with a ramp
    /// value, so the stream's priming/steady-state cadence can be checked
    /// deterministically.
    struct RampBackend {
        counter: Mutex<u8>,
    }

    impl RampBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self { counter: Mutex::new(0) })
        }
    }

    impl Backend for RampBackend {
        fn scheme(&self) -> &'static str {
            "ramp"
        }
        fn open_context(&self, _p: &ContextParams) -> Result<ContextBuildResult, IioError> {
            Ok(ContextBuildResult { devices: vec![], description: String::new(), attrs: vec![] })
        }
        fn get_xml(&self, _d: &[DeviceData]) -> Result<String, IioError> {
            Ok(String::new())
        }
        fn read_attr(&self, _a: &AttrRef) -> Result<String, IioError> {
            Err(IioError::NotSupported("n/a".into()))
        }
        fn write_attr(&self, _a: &AttrRef, _v: &str) -> Result<(), IioError> {
            Err(IioError::NotSupported("n/a".into()))
        }
        fn open_buffer(
            &self,
            _device_id: &str,
            _device_index: usize,
            mask: &ChannelsMask,
            _cancel: &CancelToken,
        ) -> Result<(BackendBufferHandle, ChannelsMask), IioError> {
            Ok((BackendBufferHandle(Box::new(VecDeque::<u8>::new())), mask.clone()))
        }
        fn close_buffer(&self, _h: &BackendBufferHandle) -> Result<(), IioError> {
            Ok(())
        }
        fn enqueue_block(
            &self,
            _h: &BackendBufferHandle,
            _data: &[u8],
            _bytes_used: usize,
            _cyclic: bool,
        ) -> Result<(), IioError> {
            Ok(())
        }
        fn dequeue_block(
            &self,
            _h: &BackendBufferHandle,
            data: &mut [u8],
            _nonblock: bool,
        ) -> Result<usize, IioError> {
            let mut c = self.counter.lock().unwrap();
            for b in data.iter_mut() {
                *b = *c;
                *c = c.wrapping_add(1);
            }
            Ok(data.len())
        }
        fn get_trigger(&self, _d: &str) -> Result<Option<String>, IioError> {
            Ok(None)
        }
        fn set_trigger(&self, _d: &str, _t: Option<&str>) -> Result<(), IioError> {
            Ok(())
        }
        fn open_event_stream(&self, _d: &str, _cancel: &CancelToken) -> Result<BackendEventHandle, IioError> {
            Err(IioError::NotSupported("n/a".into()))
        }
        fn read_event(&self, _h: &BackendEventHandle, _nonblock: bool) -> Result<RawEvent, IioError> {
            Err(IioError::NotSupported("n/a".into()))
        }
    }

    #[test]
    fn stream_cycles_through_all_blocks_in_fifo_order() {
        let backend = RampBackend::new();
        let buffer = Buffer::open(backend, "iio:device0", 0, &ChannelsMask::all_enabled(1)).unwrap();
        let mut stream = Stream::new(buffer, 3, 4).unwrap();

        let mut seen = Vec::new();
        for _ in 0..6 {
            let block = stream.next().unwrap();
            seen.push(block.as_slice().to_vec());
        }
        // 6 calls over 3 blocks of 4 bytes each is a contiguous 0..24 ramp.
        let flat: Vec<u8> = seen.into_iter().flatten().collect();
        let expected: Vec<u8> = (0u8..24).collect();
        assert_eq!(flat, expected);
    }

    #[test]
    fn stream_rejects_zero_blocks() {
        let backend = RampBackend::new();
        let buffer = Buffer::open(backend, "iio:device0", 0, &ChannelsMask::all_enabled(1)).unwrap();
        assert!(Stream::new(buffer, 0, 4).is_err());
    }
}
