// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The pure-data object graph (spec.md §3): context → devices → channels →
//! attributes, plus buffers/blocks. Built once per context (from parsed
//! XML or a sysfs walk) and immutable thereafter — see [`crate::context`]
//! for the owning type and [`crate::refs`] for the borrow-like handles
//! applications actually hold.

use std::cmp::Ordering as CmpOrdering;

/// A named value handle bound to a context, device, channel, or buffer
/// (spec.md §3). `filename` may differ from `name` for the local sysfs
/// backend (e.g. a debug attribute whose sysfs file is named differently
/// from its logical name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeData {
    pub name: String,
    pub filename: String,
    pub category: AttrCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrCategory {
    Context,
    Device,
    Debug,
    Buffer,
    Channel,
}

impl AttributeData {
    pub fn new(name: impl Into<String>, category: AttrCategory) -> Self {
        let name = name.into();
        AttributeData { filename: name.clone(), name, category }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}

/// Sorts a list of attributes by name (stable), satisfying the §3 ordering
/// invariant and enabling the O(log n) binary-search lookup in
/// [`find_attr_index`].
pub fn sort_attributes(attrs: &mut [AttributeData]) {
    attrs.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Exact-match binary search over an attribute list sorted by
/// [`sort_attributes`]. O(log n) per spec.md §4.3.
pub fn find_attr_index(attrs: &[AttributeData], name: &str) -> Option<usize> {
    attrs.binary_search_by(|a| a.name.as_str().cmp(name)).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Voltage,
    Current,
    Power,
    Temp,
    Accel,
    AnglVel,
    Magn,
    Light,
    Proximity,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelModifier {
    None,
    X,
    Y,
    Z,
    Root,
}

/// The raw-to-cooked wire layout of a scan-element channel (spec.md §3).
/// `length` is the bit stride this channel occupies within one sample set
/// (`>= bits + shift`); `repeat` is the number of consecutive sub-samples
/// per channel per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFormat {
    pub is_signed: bool,
    pub is_fully_defined: bool,
    pub is_be: bool,
    pub bits: u32,
    pub length: u32,
    pub repeat: u32,
    pub shift: u32,
}

impl DataFormat {
    /// Bytes of wire storage one repetition of this channel occupies.
    pub fn stride_bytes(&self) -> usize {
        (self.length as usize).div_ceil(8)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelData {
    pub id: String,
    pub name: Option<String>,
    pub direction: ChannelDirection,
    pub scan_element: bool,
    /// Index within the sample set; `-1` (represented as `None`) for
    /// channels that don't participate in buffered capture.
    pub index: Option<u32>,
    pub channel_type: ChannelType,
    pub modifier: ChannelModifier,
    pub format: DataFormat,
    pub attrs: Vec<AttributeData>,
}

impl ChannelData {
    pub fn sort_key(&self) -> (u32, u32) {
        (self.index.unwrap_or(u32::MAX), self.format.shift)
    }
}

/// Sorts channels by index, tie-broken by format shift (spec.md §3
/// invariant).
pub fn sort_channels(channels: &mut [ChannelData]) {
    channels.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Device,
    Trigger,
    Hwmon,
}

impl DeviceKind {
    /// Discriminated by id prefix (spec.md §3): `iio:` is an ordinary
    /// device, `trigger` is a trigger, `hwmon` is a hardware-monitor
    /// device.
    pub fn from_id(id: &str) -> DeviceKind {
        if id.starts_with("trigger") {
            DeviceKind::Trigger
        } else if id.starts_with("hwmon") {
            DeviceKind::Hwmon
        } else {
            DeviceKind::Device
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceData {
    pub id: String,
    pub name: Option<String>,
    pub label: Option<String>,
    pub kind: DeviceKind,
    pub device_attrs: Vec<AttributeData>,
    pub debug_attrs: Vec<AttributeData>,
    pub buffer_attrs: Vec<AttributeData>,
    pub channels: Vec<ChannelData>,
}

impl DeviceData {
    pub fn channel_attrs(&self, channel_index: usize) -> &[AttributeData] {
        &self.channels[channel_index].attrs
    }
}

/// Sorts devices by id, lexicographic (spec.md §3 invariant).
pub fn sort_devices(devices: &mut [DeviceData]) {
    devices.sort_by(|a, b| a.id.cmp(&b.id));
}

pub fn device_cmp(a: &DeviceData, b: &DeviceData) -> CmpOrdering {
    a.id.cmp(&b.id)
}
