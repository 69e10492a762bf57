// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The channels-active bitset and the sample-set layout it implies
//! (spec.md §4.10 / C10).

use crate::model::{ChannelData, DataFormat};

/// An opaque bitset indexed by channel index, sized to a device's channel
/// count. Distinct from the backend's *resolved* mask, which is what the
/// kernel actually accepted after `open_buffer` (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelsMask {
    words: Vec<u64>,
    len: usize,
}

const WORD_BITS: usize = 64;

impl ChannelsMask {
    pub fn new(len: usize) -> Self {
        ChannelsMask { words: vec![0u64; len.div_ceil(WORD_BITS).max(1)], len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set(&mut self, index: usize) {
        assert!(index < self.len, "channel index {index} out of range for mask of len {}", self.len);
        self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
    }

    pub fn clear(&mut self, index: usize) {
        assert!(index < self.len, "channel index {index} out of range for mask of len {}", self.len);
        self.words[index / WORD_BITS] &= !(1 << (index % WORD_BITS));
    }

    pub fn is_set(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    pub fn popcount(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn all_enabled(len: usize) -> Self {
        let mut mask = ChannelsMask::new(len);
        for i in 0..len {
            mask.set(i);
        }
        mask
    }

    /// Parses a hex mask as seen on the wire (spec.md §6, e.g. `"1f"`).
    pub fn from_hex(hex: &str, len: usize) -> Result<Self, libiio_common::IioError> {
        let value = u64::from_str_radix(hex.trim(), 16)
            .map_err(|_| libiio_common::IioError::BadArgument(format!("bad hex mask: {hex:?}")))?;
        if len > WORD_BITS {
            return Err(libiio_common::IioError::BadArgument(
                "hex mask encoding only supports up to 64 channels".into(),
            ));
        }
        let mut mask = ChannelsMask::new(len);
        for i in 0..len {
            if value & (1 << i) != 0 {
                mask.set(i);
            }
        }
        Ok(mask)
    }

    pub fn to_hex(&self) -> String {
        assert!(self.len <= WORD_BITS, "hex mask encoding only supports up to 64 channels");
        format!("{:x}", self.words.first().copied().unwrap_or(0))
    }

    pub fn iter_enabled(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.is_set(i))
    }
}

/// The byte layout of one sample set under a given mask: total stride, and
/// each enabled channel's byte offset within it. Offsets are aligned so a
/// channel's data starts at a multiple of its own `length/8` (spec.md
/// §4.10: "the kernel enforces this padding").
#[derive(Debug, Clone, Default)]
pub struct SampleLayout {
    pub sample_size: usize,
    pub offsets: Vec<(usize, usize)>, // (channel_index, byte_offset)
}

pub fn compute_sample_layout(channels: &[ChannelData], mask: &ChannelsMask) -> SampleLayout {
    let mut offset = 0usize;
    let mut offsets = Vec::new();
    for (index, channel) in channels.iter().enumerate() {
        if !channel.scan_element || !mask.is_set(index) {
            continue;
        }
        let align = channel.format.stride_bytes().max(1);
        if offset % align != 0 {
            offset += align - (offset % align);
        }
        offsets.push((index, offset));
        offset += channel_total_bytes(&channel.format);
    }
    SampleLayout { sample_size: offset, offsets }
}

fn channel_total_bytes(format: &DataFormat) -> usize {
    (format.length as usize * format.repeat.max(1) as usize).div_ceil(8)
}
