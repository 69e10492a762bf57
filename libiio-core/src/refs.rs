// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Borrow-like handles into a [`crate::context::Context`] (spec.md §4.3).
//! A `Context` owns its device graph; everything else is a reference into
//! it, so these types carry the context's lifetime instead of their own
//! storage.

use crate::context::Context;
use crate::model::{AttrCategory, AttributeData, ChannelData, DeviceData};
use libiio_common::IioError;

/// A reference to one device within a context.
#[derive(Debug, Clone, Copy)]
pub struct DeviceRef<'ctx> {
    pub(crate) context: &'ctx Context,
    pub(crate) index: usize,
}

impl<'ctx> DeviceRef<'ctx> {
    pub fn data(&self) -> &'ctx DeviceData {
        &self.context.devices()[self.index]
    }

    pub fn id(&self) -> &'ctx str {
        &self.data().id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn channel(&self, name: &str, output: bool) -> Option<ChannelRef<'ctx>> {
        find_channel(*self, name, output)
    }

    pub fn attr(&self, name: &str) -> Option<AttrRef<'ctx>> {
        let idx = crate::model::find_attr_index(&self.data().device_attrs, name)?;
        Some(AttrRef { device: *self, channel_index: None, category: AttrCategory::Device, index: idx })
    }

    pub fn debug_attr(&self, name: &str) -> Option<AttrRef<'ctx>> {
        let idx = crate::model::find_attr_index(&self.data().debug_attrs, name)?;
        Some(AttrRef { device: *self, channel_index: None, category: AttrCategory::Debug, index: idx })
    }

    pub fn buffer_attr(&self, name: &str) -> Option<AttrRef<'ctx>> {
        let idx = crate::model::find_attr_index(&self.data().buffer_attrs, name)?;
        Some(AttrRef { device: *self, channel_index: None, category: AttrCategory::Buffer, index: idx })
    }
}

/// A reference to one channel of one device.
#[derive(Debug, Clone, Copy)]
pub struct ChannelRef<'ctx> {
    pub device: DeviceRef<'ctx>,
    pub index: usize,
}

impl<'ctx> ChannelRef<'ctx> {
    pub fn data(&self) -> &'ctx ChannelData {
        &self.device.data().channels[self.index]
    }

    pub fn id(&self) -> &'ctx str {
        &self.data().id
    }

    pub fn attr(&self, name: &str) -> Option<AttrRef<'ctx>> {
        let idx = crate::model::find_attr_index(&self.data().attrs, name)?;
        Some(AttrRef {
            device: self.device,
            channel_index: Some(self.index),
            category: AttrCategory::Channel,
            index: idx,
        })
    }
}

/// A reference to one attribute, resolved to a specific list+index so
/// reads/writes don't re-search.
#[derive(Debug, Clone, Copy)]
pub struct AttrRef<'ctx> {
    pub device: DeviceRef<'ctx>,
    pub channel_index: Option<usize>,
    pub category: AttrCategory,
    index: usize,
}

impl<'ctx> AttrRef<'ctx> {
    pub fn data(&self) -> &'ctx AttributeData {
        match self.channel_index {
            Some(ci) => &self.device.data().channels[ci].attrs[self.index],
            None => match self.category {
                AttrCategory::Device => &self.device.data().device_attrs[self.index],
                AttrCategory::Debug => &self.device.data().debug_attrs[self.index],
                AttrCategory::Buffer => &self.device.data().buffer_attrs[self.index],
                _ => unreachable!("context/channel attrs are not resolved without a device"),
            },
        }
    }

    pub fn name(&self) -> &'ctx str {
        &self.data().name
    }

    pub fn read(&self) -> Result<String, IioError> {
        self.device.context.read_attr_ref(self)
    }

    pub fn write(&self, value: &str) -> Result<(), IioError> {
        self.device.context.write_attr_ref(self, value)
    }
}

/// Matches a device by id, then label, then name (first hit wins, spec.md
/// §4.3).
pub fn find_device<'ctx>(context: &'ctx Context, needle: &str) -> Option<DeviceRef<'ctx>> {
    let devices = context.devices();
    devices
        .iter()
        .position(|d| d.id == needle)
        .or_else(|| devices.iter().position(|d| d.label.as_deref() == Some(needle)))
        .or_else(|| devices.iter().position(|d| d.name.as_deref() == Some(needle)))
        .map(|index| DeviceRef { context, index })
}

/// Matches a channel by id then name, disambiguated by direction when more
/// than one channel shares a name (spec.md §4.3).
pub fn find_channel<'ctx>(
    device: DeviceRef<'ctx>,
    name: &str,
    output: bool,
) -> Option<ChannelRef<'ctx>> {
    let wants_output = |c: &ChannelData| {
        matches!(c.direction, crate::model::ChannelDirection::Output) == output
    };
    let channels = &device.data().channels;
    channels
        .iter()
        .position(|c| c.id == name && wants_output(c))
        .or_else(|| channels.iter().position(|c| c.name.as_deref() == Some(name) && wants_output(c)))
        .map(|index| ChannelRef { device, index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::fake_context;

    #[test]
    fn find_device_matches_id_then_label_then_name() {
        let ctx = fake_context();
        assert_eq!(find_device(&ctx, "iio:device0").unwrap().id(), "iio:device0");
        assert_eq!(find_device(&ctx, "accel label").unwrap().id(), "iio:device0");
        assert_eq!(find_device(&ctx, "accel3d").unwrap().id(), "iio:device0");
        assert!(find_device(&ctx, "missing").is_none());
    }

    #[test]
    fn find_channel_disambiguates_by_direction() {
        let ctx = fake_context();
        let dev = find_device(&ctx, "iio:device0").unwrap();
        let input = dev.channel("voltage0", false).unwrap();
        assert_eq!(input.data().direction, crate::model::ChannelDirection::Input);
    }
}
