// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Raw ioctl request-number construction for the IIO buffer/event chardev
//! ABI (spec.md §4.5). Built by hand from the kernel's `_IOC` encoding
//! (`include/uapi/asm-generic/ioctl.h`) rather than `nix::ioctl_*!` macros,
//! since we cannot compile-check macro expansion here.

const NRBITS: u32 = 8;
const TYPEBITS: u32 = 8;
const SIZEBITS: u32 = 14;

const NRSHIFT: u32 = 0;
const TYPESHIFT: u32 = NRSHIFT + NRBITS;
const SIZESHIFT: u32 = TYPESHIFT + TYPEBITS;
const DIRSHIFT: u32 = SIZESHIFT + SIZEBITS;

const NONE: u32 = 0;
const WRITE: u32 = 1;
const READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u8, size: u32) -> u64 {
    ((dir << DIRSHIFT) | ((ty as u32) << TYPESHIFT) | ((nr as u32) << NRSHIFT) | (size << SIZESHIFT)) as u64
}

const IIO_TYPE: u8 = b'i';

/// `IIO_GET_EVENT_FD_IOCTL`: returns a new fd for the device's event queue.
pub const IIO_GET_EVENT_FD_IOCTL: u64 = ioc(READ, IIO_TYPE, 0x90, 4);

/// `IIO_BUFFER_GET_FD_IOCTL`: returns a per-buffer-index fd (multi-buffer
/// devices only; buffer index 0 is also reachable via `/dev/iio:deviceN`
/// directly).
pub const IIO_BUFFER_GET_FD_IOCTL: u64 = ioc(READ | WRITE, IIO_TYPE, 0x91, 4);

/// `IIO_BLOCK_ALLOC_IOCTL`: allocates `count` blocks of `size` bytes each
/// and maps them into the kernel's DMA buffer pool.
pub const IIO_BLOCK_ALLOC_IOCTL: u64 = ioc(READ | WRITE, IIO_TYPE, 0xa0, 8);

/// `IIO_BLOCK_FREE_IOCTL`: releases the block pool allocated above.
pub const IIO_BLOCK_FREE_IOCTL: u64 = ioc(NONE, IIO_TYPE, 0xa1, 0);

/// `IIO_BLOCK_QUERY_IOCTL`: returns the mmap offset/size of one allocated
/// block, used to set up the `memmap2::MmapMut` for it.
pub const IIO_BLOCK_QUERY_IOCTL: u64 = ioc(READ | WRITE, IIO_TYPE, 0xa2, 16);

/// `IIO_BLOCK_ENQUEUE_IOCTL`: hands a block back to the kernel to fill
/// (input device) or drain (output device).
pub const IIO_BLOCK_ENQUEUE_IOCTL: u64 = ioc(READ | WRITE, IIO_TYPE, 0xa3, 16);

/// `IIO_BLOCK_DEQUEUE_IOCTL`: retrieves the next completed block, blocking
/// unless the chardev was opened/flagged `O_NONBLOCK`.
pub const IIO_BLOCK_DEQUEUE_IOCTL: u64 = ioc(READ | WRITE, IIO_TYPE, 0xa4, 16);

/// One block descriptor as exchanged with `QUERY`/`ENQUEUE`/`DEQUEUE`
/// (mirrors the kernel's `struct iio_buffer_block`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockDesc {
    pub id: u32,
    pub size: u32,
    pub bytes_used: u32,
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_numbers_are_distinct() {
        let all = [
            IIO_GET_EVENT_FD_IOCTL,
            IIO_BUFFER_GET_FD_IOCTL,
            IIO_BLOCK_ALLOC_IOCTL,
            IIO_BLOCK_FREE_IOCTL,
            IIO_BLOCK_QUERY_IOCTL,
            IIO_BLOCK_ENQUEUE_IOCTL,
            IIO_BLOCK_DEQUEUE_IOCTL,
        ];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "ioctl {i} and {j} collide");
                }
            }
        }
    }

    #[test]
    fn encodes_expected_direction_and_type_bits() {
        // type field ('i' == 0x69) lives at bits [15:8] regardless of direction.
        assert_eq!((IIO_GET_EVENT_FD_IOCTL >> TYPESHIFT) & 0xff, 0x69);
        assert_eq!((IIO_BLOCK_ENQUEUE_IOCTL >> TYPESHIFT) & 0xff, 0x69);
        // _IOR/_IOWR both set the READ bit.
        assert_eq!((IIO_GET_EVENT_FD_IOCTL >> DIRSHIFT) & (READ as u64), READ as u64);
        assert_eq!((IIO_BLOCK_ALLOC_IOCTL >> DIRSHIFT) & (WRITE as u64), WRITE as u64);
    }
}
