// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Event monitoring (spec.md §4.8 / C8): decoding the fixed-size event
//! records a device's event chardev produces, and the stream wrapper that
//! reads them one at a time.

use crate::backend::{Backend, BackendEventHandle};
use crate::model::{ChannelModifier, ChannelType};
use libiio_common::IioError;
use libiio_protocol::CancelToken;
use std::sync::Arc;

/// One decoded IIO event record. The kernel's `struct iio_event_data` is a
/// `u64` id plus a `s64` timestamp; `id` packs type/direction/channel/
/// modifier the same way `iio_event_code` does upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub id: u64,
    pub timestamp_ns: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Roc,
    Thresh,
    Mag,
    RocMag,
    Breach,
    Other(u8),
}

impl EventType {
    fn from_code(code: u8) -> EventType {
        match code {
            0 => EventType::Roc,
            1 => EventType::Thresh,
            2 => EventType::Mag,
            3 => EventType::RocMag,
            4 => EventType::Breach,
            other => EventType::Other(other),
        }
    }
}

/// The decoded, application-facing view of a [`RawEvent`] (spec.md §4.8:
/// type, direction, channel type/modifier, differential flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub event_type: EventType,
    pub direction: u8,
    pub channel_type: ChannelType,
    pub modifier: ChannelModifier,
    pub channel_index: i16,
    pub differential_index: i16,
    pub is_differential: bool,
    pub timestamp_ns: i64,
}

/// Bit layout of a packed event `id`, per spec.md §4.8/§3: `type` in bits
/// 56-63, `direction` in bits 48-54, `modifier` in bits 40-47, `chan_type`
/// in bits 32-39, matching the kernel's `IIO_EVENT_CODE` macro.
const TYPE_SHIFT: u32 = 56;
const DIRECTION_SHIFT: u32 = 48;
const DIRECTION_MASK: u64 = 0x7F;
const MODIFIER_SHIFT: u32 = 40;
const CHAN_TYPE_SHIFT: u32 = 32;
const DIFF_FLAG_BIT: u64 = 1 << 55;
const CHAN_MASK: u64 = 0xFFFF;
const CHAN2_SHIFT: u32 = 16;

impl RawEvent {
    /// Unpacks the bitfield layout the kernel uses for event codes. This is
    /// a simplified but order-compatible rendition of
    /// `IIO_EVENT_CODE(chan_type, diff, modifier, direction, type, chan,
    /// chan2)`: callers only need type/direction/modifier/channel, not
    /// bit-exact upstream compatibility.
    pub fn decode(self) -> Event {
        let channel_type = match (self.id >> CHAN_TYPE_SHIFT) & 0xFF {
            0 => ChannelType::Voltage,
            1 => ChannelType::Current,
            2 => ChannelType::Power,
            3 => ChannelType::Temp,
            4 => ChannelType::Accel,
            5 => ChannelType::AnglVel,
            6 => ChannelType::Magn,
            7 => ChannelType::Light,
            8 => ChannelType::Proximity,
            _ => ChannelType::Other,
        };
        let modifier = match (self.id >> MODIFIER_SHIFT) & 0xFF {
            1 => ChannelModifier::X,
            2 => ChannelModifier::Y,
            3 => ChannelModifier::Z,
            4 => ChannelModifier::Root,
            _ => ChannelModifier::None,
        };
        let event_type = EventType::from_code(((self.id >> TYPE_SHIFT) & 0xFF) as u8);
        let direction = ((self.id >> DIRECTION_SHIFT) & DIRECTION_MASK) as u8;
        let is_differential = self.id & DIFF_FLAG_BIT != 0;
        let channel_index = (self.id & CHAN_MASK) as i16;
        let differential_index = ((self.id >> CHAN2_SHIFT) & CHAN_MASK) as i16;
        Event {
            event_type,
            direction,
            channel_type,
            modifier,
            channel_index,
            differential_index,
            is_differential,
            timestamp_ns: self.timestamp_ns,
        }
    }
}

/// An open event queue for one device. Each read blocks (or, in
/// [`EventStream::try_read`], returns `WouldBlock`) until the kernel emits
/// the next record; there is no prefetching, unlike [`crate::stream::Stream`]
/// (spec.md §4.8: events are rare and low-rate, so a read-ahead buffer adds
/// nothing).
pub struct EventStream {
    backend: Arc<dyn Backend>,
    handle: BackendEventHandle,
    cancel: CancelToken,
}

impl EventStream {
    pub fn open(backend: Arc<dyn Backend>, device_id: &str) -> Result<EventStream, IioError> {
        let cancel = CancelToken::new();
        let handle = backend.open_event_stream(device_id, &cancel)?;
        Ok(EventStream { backend, handle, cancel })
    }

    pub fn read(&self) -> Result<Event, IioError> {
        let raw = self.backend.read_event(&self.handle, false)?;
        Ok(raw.decode())
    }

    pub fn try_read(&self) -> Result<Event, IioError> {
        let raw = self.backend.read_event(&self.handle, true)?;
        Ok(raw.decode())
    }

    /// Destroys the event stream from any thread (spec.md §5: the "poison"
    /// operation). Unblocks a pending `read()` with `Cancelled` instead of
    /// polling.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_type_direction_modifier_and_channel_fields() {
        let id = (1u64 << TYPE_SHIFT) // Thresh
            | (1u64 << DIRECTION_SHIFT) // falling
            | (3u64 << CHAN_TYPE_SHIFT) // Temp
            | (2u64 << MODIFIER_SHIFT) // Y
            | 5u64; // channel index
        let raw = RawEvent { id, timestamp_ns: 123_456_789 };
        let event = raw.decode();
        assert_eq!(event.event_type, EventType::Thresh);
        assert_eq!(event.direction, 1);
        assert_eq!(event.channel_type, ChannelType::Temp);
        assert_eq!(event.modifier, ChannelModifier::Y);
        assert_eq!(event.channel_index, 5);
        assert!(!event.is_differential);
        assert_eq!(event.timestamp_ns, 123_456_789);
    }

    #[test]
    fn differential_flag_and_second_channel_decode() {
        let id = DIFF_FLAG_BIT | (7u64 << CHAN2_SHIFT) | 2u64;
        let event = RawEvent { id, timestamp_ns: 0 }.decode();
        assert!(event.is_differential);
        assert_eq!(event.channel_index, 2);
        assert_eq!(event.differential_index, 7);
    }
}
