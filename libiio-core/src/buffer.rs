// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The buffer/block engine (spec.md §4.7 / C7): block lifecycle, cyclic
//! mode, blocking/non-blocking dequeue, cancellation across threads.

use crate::backend::{Backend, BackendBufferHandle};
use crate::mask::ChannelsMask;
use libiio_common::IioError;
use libiio_protocol::CancelToken;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A handle to a hardware data path of a device, opened with a requested
/// mask (spec.md §3). Owns the backend's buffer handle and the shared
/// [`CancelToken`] every block enqueued on it is unblocked by.
pub struct Buffer {
    backend: Arc<dyn Backend>,
    device_id: String,
    device_index: usize,
    requested_mask: ChannelsMask,
    resolved_mask: ChannelsMask,
    handle: BackendBufferHandle,
    cancel: CancelToken,
    cancelled: AtomicBool,
    enabled: AtomicBool,
    destroyed: AtomicBool,
    cyclic_pushed: AtomicBool,
}

impl Buffer {
    /// Opens a buffer. The backend may resolve a different mask than the
    /// one requested (e.g. the kernel enables extra channels it can't
    /// disable independently) — the caller must use [`Buffer::resolved_mask`]
    /// for sample-size math, not the mask it passed in.
    pub fn open(
        backend: Arc<dyn Backend>,
        device_id: &str,
        device_index: usize,
        mask: &ChannelsMask,
    ) -> Result<Arc<Buffer>, IioError> {
        let cancel = CancelToken::new();
        let (handle, resolved_mask) = backend.open_buffer(device_id, device_index, mask, &cancel)?;
        Ok(Arc::new(Buffer {
            backend,
            device_id: device_id.to_string(),
            device_index,
            requested_mask: mask.clone(),
            resolved_mask,
            handle,
            cancel,
            cancelled: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            cyclic_pushed: AtomicBool::new(false),
        }))
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }

    pub fn requested_mask(&self) -> &ChannelsMask {
        &self.requested_mask
    }

    pub fn resolved_mask(&self) -> &ChannelsMask {
        &self.resolved_mask
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) -> Result<(), IioError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(IioError::BadState("buffer is cancelled".into()));
        }
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn disable(&self) -> Result<(), IioError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(IioError::BadState("buffer is cancelled".into()));
        }
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// The only cancellation primitive for a capture in progress (spec.md
    /// §5): safe to call from any thread at any time. Idempotent and
    /// sticky — once cancelled, the buffer must be destroyed and a new one
    /// opened to resume I/O.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub fn destroy(&self) {
        self.cancel();
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            let _ = self.backend.close_buffer(&self.handle);
        }
    }

    /// Allocates a block of `size_bytes` bound to this buffer for its
    /// entire lifetime (spec.md §3 invariant).
    pub fn create_block(self: &Arc<Self>, size_bytes: usize) -> Block {
        Block {
            buffer: self.clone(),
            data: vec![0u8; size_bytes],
            bytes_used: AtomicUsize::new(0),
            state: Mutex::new(BlockState::Idle),
        }
    }

    fn enqueue_raw(&self, data: &[u8], bytes_used: usize, cyclic: bool) -> Result<(), IioError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(IioError::Cancelled);
        }
        if cyclic && self.cyclic_pushed.swap(true, Ordering::SeqCst) {
            return Err(IioError::BadState(
                "cyclic buffer already has a block enqueued for its lifetime".into(),
            ));
        }
        self.backend.enqueue_block(&self.handle, data, bytes_used, cyclic)
    }

    fn dequeue_raw(&self, data: &mut [u8], nonblock: bool) -> Result<usize, IioError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(IioError::Cancelled);
        }
        self.backend.dequeue_block(&self.handle, data, nonblock)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// A block's lifecycle state (spec.md §4.7 state diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Idle,
    Enqueued,
    Done,
    Cancelled,
    Freed,
}

/// A fixed-size memory region belonging to exactly one [`Buffer`] (spec.md
/// §3). Must not be accessed while `Enqueued`.
pub struct Block {
    buffer: Arc<Buffer>,
    data: Vec<u8>,
    bytes_used: AtomicUsize,
    state: Mutex<BlockState>,
}

impl Block {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> BlockState {
        *self.state.lock().unwrap()
    }

    /// Read-only view of this block's memory. Callers should check
    /// [`Block::state`] first — the contents are only meaningful once the
    /// block has transitioned to `Done`.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.bytes_used()]
    }

    /// Mutable view of the whole backing region, for filling a TX block
    /// before enqueueing it.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Enqueues this block. `bytes_used == 0` means "the whole block"
    /// (spec.md §4.7). `cyclic == true` may only succeed once across the
    /// owning buffer's lifetime — a second attempt fails with `BadState`
    /// ("CyclicAlreadyPushed" in spec.md terms; the taxonomy in §7 folds it
    /// into `BadState`).
    pub fn enqueue(&mut self, bytes_used: usize, cyclic: bool) -> Result<(), IioError> {
        let mut state = self.state.lock().unwrap();
        if !matches!(*state, BlockState::Idle | BlockState::Done) {
            return Err(IioError::BadState("block is already enqueued".into()));
        }
        let used = if bytes_used == 0 { self.data.len() } else { bytes_used.min(self.data.len()) };
        self.buffer.enqueue_raw(&self.data[..used], used, cyclic)?;
        self.bytes_used.store(used, Ordering::SeqCst);
        *state = BlockState::Enqueued;
        Ok(())
    }

    /// Dequeues this block. `nonblock = true` returns `WouldBlock` if the
    /// block isn't ready yet; `nonblock = false` parks until it's `Done`,
    /// the buffer is cancelled, or the transport times out (spec.md §4.7).
    pub fn dequeue(&mut self, nonblock: bool) -> Result<(), IioError> {
        if self.buffer.is_cancelled() {
            let mut state = self.state.lock().unwrap();
            if matches!(*state, BlockState::Enqueued) {
                *state = BlockState::Cancelled;
            }
            return Err(IioError::Cancelled);
        }
        {
            let state = self.state.lock().unwrap();
            if !matches!(*state, BlockState::Enqueued) {
                return Err(IioError::BadState(
                    "dequeue on a block that is not enqueued".into(),
                ));
            }
        }
        match self.buffer.dequeue_raw(&mut self.data, nonblock) {
            Ok(n) => {
                self.bytes_used.store(n, Ordering::SeqCst);
                *self.state.lock().unwrap() = BlockState::Done;
                Ok(())
            }
            Err(IioError::Cancelled) => {
                *self.state.lock().unwrap() = BlockState::Cancelled;
                Err(IioError::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    pub fn destroy(&mut self) {
        *self.state.lock().unwrap() = BlockState::Freed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AttrRef, ContextBuildResult, ContextParams};
    use crate::event::RawEvent;
    use crate::model::DeviceData;
    use std::sync::Mutex as StdMutex;
    use std::thread;
    use std::time::Duration;

    /// A loopback backend whose buffer is a shared ring of bytes: enqueue
    /// appends, dequeue pops and blocks (joining the cancel token) when
    /// empty. Good enough to exercise the block state machine without a
    /// real chardev.
    struct LoopbackBufferBackend {
        ring: StdMutex<VecDeque<u8>>,
        cancel: StdMutex<Option<CancelToken>>,
    }
    use std::collections::VecDeque;

    impl LoopbackBufferBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self { ring: StdMutex::new(VecDeque::new()), cancel: StdMutex::new(None) })
        }
    }

    impl Backend for LoopbackBufferBackend {
        fn scheme(&self) -> &'static str {
            "looptest"
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
            cancel: &CancelToken,
        ) -> Result<(crate::backend::BackendBufferHandle, ChannelsMask), IioError> {
            *self.cancel.lock().unwrap() = Some(cancel.clone());
            Ok((crate::backend::BackendBufferHandle(Box::new(())), mask.clone()))
        }
        fn close_buffer(&self, _h: &crate::backend::BackendBufferHandle) -> Result<(), IioError> {
            Ok(())
        }
        fn enqueue_block(
            &self,
            _h: &crate::backend::BackendBufferHandle,
            data: &[u8],
            bytes_used: usize,
            _cyclic: bool,
        ) -> Result<(), IioError> {
            self.ring.lock().unwrap().extend(data[..bytes_used].iter().copied());
            Ok(())
        }
        fn dequeue_block(
            &self,
            _h: &crate::backend::BackendBufferHandle,
            data: &mut [u8],
            nonblock: bool,
        ) -> Result<usize, IioError> {
            let cancel = self.cancel.lock().unwrap().clone().unwrap();
            let start = std::time::Instant::now();
            loop {
                if cancel.is_cancelled() {
                    return Err(IioError::Cancelled);
                }
                {
                    let mut ring = self.ring.lock().unwrap();
                    if !ring.is_empty() {
                        let n = ring.len().min(data.len());
                        for b in data.iter_mut().take(n) {
                            *b = ring.pop_front().unwrap();
                        }
                        return Ok(n);
                    }
                }
                if nonblock {
                    return Err(IioError::WouldBlock);
                }
                if start.elapsed() > Duration::from_secs(5) {
                    return Err(IioError::Timeout);
                }
                thread::sleep(Duration::from_millis(1));
            }
        }
        fn get_trigger(&self, _d: &str) -> Result<Option<String>, IioError> {
            Ok(None)
        }
        fn set_trigger(&self, _d: &str, _t: Option<&str>) -> Result<(), IioError> {
            Ok(())
        }
        fn open_event_stream(
            &self,
            _d: &str,
            _cancel: &CancelToken,
        ) -> Result<crate::backend::BackendEventHandle, IioError> {
            Err(IioError::NotSupported("n/a".into()))
        }
        fn read_event(
            &self,
            _h: &crate::backend::BackendEventHandle,
            _nonblock: bool,
        ) -> Result<RawEvent, IioError> {
            Err(IioError::NotSupported("n/a".into()))
        }
    }

    fn open_test_buffer() -> Arc<Buffer> {
        let backend = LoopbackBufferBackend::new();
        Buffer::open(backend, "iio:device0", 0, &ChannelsMask::all_enabled(4)).unwrap()
    }

    #[test]
    fn dequeue_before_enqueue_is_bad_state_not_would_block() {
        let buffer = open_test_buffer();
        let mut block = buffer.create_block(16);
        let err = block.dequeue(true).unwrap_err();
        assert!(matches!(err, IioError::BadState(_)));
    }

    #[test]
    fn enqueue_zero_bytes_used_means_whole_block() {
        let buffer = open_test_buffer();
        let mut block = buffer.create_block(8);
        block.as_mut_slice().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        block.enqueue(0, false).unwrap();
        block.dequeue(false).unwrap();
        assert_eq!(block.bytes_used(), 8);
        assert_eq!(block.as_slice(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    /// spec.md §8 scenario 4: cyclic enqueue twice fails the second time.
    #[test]
    fn cyclic_buffer_rejects_second_enqueue() {
        let buffer = open_test_buffer();
        let mut block = buffer.create_block(16);
        block.enqueue(0, true).unwrap();
        block.destroy();
        let mut block2 = buffer.create_block(16);
        let err = block2.enqueue(0, true).unwrap_err();
        assert!(matches!(err, IioError::BadState(_)));
    }

    #[test]
    fn enqueue_on_already_enqueued_block_fails() {
        let buffer = open_test_buffer();
        let mut block = buffer.create_block(16);
        block.enqueue(0, false).unwrap();
        let err = block.enqueue(0, false).unwrap_err();
        assert!(matches!(err, IioError::BadState(_)));
    }

    /// spec.md §8 scenario 5: cancellation unblocks a blocking dequeue from
    /// another thread within a bounded delay.
    #[test]
    fn cancel_unblocks_blocking_dequeue_from_another_thread() {
        let buffer = open_test_buffer();
        let mut block = buffer.create_block(16);
        block.enqueue(0, false).unwrap();

        let buffer2 = buffer.clone();
        let handle = thread::spawn(move || block.dequeue(false).map(|_| ()).map_err(|e| e));
        thread::sleep(Duration::from_millis(20));
        buffer2.cancel();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(IioError::Cancelled)));
        assert!(buffer2.is_cancelled());
    }

    #[test]
    fn cancelled_buffer_rejects_further_enqueue() {
        let buffer = open_test_buffer();
        buffer.cancel();
        let mut block = buffer.create_block(16);
        let err = block.enqueue(0, false).unwrap_err();
        assert!(matches!(err, IioError::Cancelled));
    }

    #[test]
    fn enable_disable_fail_once_cancelled() {
        let buffer = open_test_buffer();
        buffer.enable().unwrap();
        buffer.cancel();
        assert!(matches!(buffer.enable().unwrap_err(), IioError::BadState(_)));
        assert!(matches!(buffer.disable().unwrap_err(), IioError::BadState(_)));
    }
}
