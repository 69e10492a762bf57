// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The owning context type (spec.md §4.1-§4.2 / C1-C2): a device graph plus
//! the backend that services attribute I/O and buffer/event opens.

use crate::backend::{AttrRef as BackendAttrRef, Backend, BackendRegistry, ContextBuildResult, ContextParams};
use crate::buffer::Buffer;
use crate::event::EventStream;
use crate::mask::ChannelsMask;
use crate::model::{sort_devices, AttrCategory, DeviceData};
use crate::refs::{find_device, AttrRef, DeviceRef};
use libiio_common::IioError;
use std::sync::Arc;
use tracing::debug;

/// An open IIO context: the device graph plus context-level metadata
/// (spec.md §3: description, xml, attrs such as `uri`/`version-major`).
pub struct Context {
    backend: Arc<dyn Backend>,
    devices: Vec<DeviceData>,
    description: String,
    attrs: Vec<(String, String)>,
}

impl Context {
    /// Resolves `params.uri`'s scheme against `registry` and opens it.
    pub fn open(registry: &BackendRegistry, params: &ContextParams) -> Result<Context, IioError> {
        let backend = registry.resolve(&params.uri)?;
        debug!(uri = %params.uri, "opening context");
        let ContextBuildResult { mut devices, description, attrs } = backend.open_context(params)?;
        sort_devices(&mut devices);
        Ok(Context { backend, devices, description, attrs })
    }

    /// Builds a context directly from an already-resolved backend, used by
    /// callers that already know which backend they want (e.g. the `xml:`
    /// backend handed a parsed device list) and by tests.
    pub fn from_backend(backend: Arc<dyn Backend>, params: &ContextParams) -> Result<Context, IioError> {
        let ContextBuildResult { mut devices, description, attrs } = backend.open_context(params)?;
        sort_devices(&mut devices);
        Ok(Context { backend, devices, description, attrs })
    }

    pub fn devices(&self) -> &[DeviceData] {
        &self.devices
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn find_device<'ctx>(&'ctx self, needle: &str) -> Option<DeviceRef<'ctx>> {
        find_device(self, needle)
    }

    pub fn device(&self, index: usize) -> DeviceRef<'_> {
        assert!(index < self.devices.len(), "device index {index} out of range");
        DeviceRef { context: self, index }
    }

    /// Round-trips the device graph back to XML (spec.md §4.2: same
    /// format `iio_genxml`/the `xml:` backend consume).
    pub fn xml(&self) -> Result<String, IioError> {
        self.backend.get_xml(&self.devices)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Opens a buffer on `device` with the requested channel mask (spec.md
    /// §4.7). Blocks created from the returned buffer are bound to it for
    /// their whole lifetime.
    pub fn open_buffer(&self, device: DeviceRef<'_>, mask: &ChannelsMask) -> Result<Arc<Buffer>, IioError> {
        Buffer::open(self.backend.clone(), device.id(), device.index(), mask)
    }

    /// Opens `device`'s event queue (spec.md §4.8).
    pub fn open_event_stream(&self, device: DeviceRef<'_>) -> Result<EventStream, IioError> {
        EventStream::open(self.backend.clone(), device.id())
    }

    /// The device's trigger linkage (spec.md §4.4 `GETTRIG`/`SETTRIG`). A
    /// trigger device rejects these on itself (spec.md §3 invariant).
    pub fn get_trigger(&self, device: DeviceRef<'_>) -> Result<Option<String>, IioError> {
        if device.data().kind == crate::model::DeviceKind::Trigger {
            return Err(IioError::BadState("a trigger device has no trigger of its own".into()));
        }
        self.backend.get_trigger(device.id())
    }

    pub fn set_trigger(&self, device: DeviceRef<'_>, trigger: Option<DeviceRef<'_>>) -> Result<(), IioError> {
        if device.data().kind == crate::model::DeviceKind::Trigger {
            return Err(IioError::BadState("a trigger device cannot itself have a trigger set".into()));
        }
        self.backend.set_trigger(device.id(), trigger.map(|t| t.id()))
    }

    pub fn reg_read(&self, device: DeviceRef<'_>, addr: u32) -> Result<u32, IioError> {
        self.backend.reg_read(device.id(), addr)
    }

    pub fn reg_write(&self, device: DeviceRef<'_>, addr: u32, value: u32) -> Result<(), IioError> {
        self.backend.reg_write(device.id(), addr, value)
    }

    pub(crate) fn read_attr_ref(&self, attr: &AttrRef<'_>) -> Result<String, IioError> {
        self.backend.read_attr(&self.backend_attr_ref(attr))
    }

    pub(crate) fn write_attr_ref(&self, attr: &AttrRef<'_>, value: &str) -> Result<(), IioError> {
        self.backend.write_attr(&self.backend_attr_ref(attr), value)
    }

    fn backend_attr_ref(&self, attr: &AttrRef<'_>) -> BackendAttrRef {
        let device_id = attr.device.id().to_string();
        let channel_id = attr.channel_index.map(|ci| attr.device.data().channels[ci].id.clone());
        let filename = attr.data().filename.clone();
        BackendAttrRef { device_id, channel_id, filename, category: attr.category }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::{BackendBufferHandle, BackendEventHandle};
    use crate::event::RawEvent;
    use crate::mask::ChannelsMask;
    use crate::model::{
        AttributeData, ChannelData, ChannelDirection, ChannelModifier, ChannelType, DataFormat, DeviceKind,
    };

    struct FakeBackend;

    impl Backend for FakeBackend {
        fn scheme(&self) -> &'static str {
            "fake"
        }

        fn open_context(&self, _params: &ContextParams) -> Result<ContextBuildResult, IioError> {
            let format = DataFormat {
                is_signed: true,
                is_fully_defined: true,
                is_be: false,
                bits: 16,
                length: 16,
                repeat: 1,
                shift: 0,
            };
            let device = DeviceData {
                id: "iio:device0".into(),
                name: Some("accel3d".into()),
                label: Some("accel label".into()),
                kind: DeviceKind::Device,
                device_attrs: vec![AttributeData::new("sampling_frequency", AttrCategory::Device)],
                debug_attrs: vec![],
                buffer_attrs: vec![],
                channels: vec![ChannelData {
                    id: "voltage0".into(),
                    name: None,
                    direction: ChannelDirection::Input,
                    scan_element: true,
                    index: Some(0),
                    channel_type: ChannelType::Voltage,
                    modifier: ChannelModifier::None,
                    format,
                    attrs: vec![AttributeData::new("raw", AttrCategory::Channel)],
                }],
            };
            Ok(ContextBuildResult {
                devices: vec![device],
                description: "fake context".into(),
                attrs: vec![("uri".into(), "fake:".into())],
            })
        }

        fn get_xml(&self, _devices: &[DeviceData]) -> Result<String, IioError> {
            Ok(String::new())
        }

        fn read_attr(&self, _attr: &BackendAttrRef) -> Result<String, IioError> {
            Ok("1".into())
        }

        fn write_attr(&self, _attr: &BackendAttrRef, _value: &str) -> Result<(), IioError> {
            Ok(())
        }

        fn open_buffer(
            &self,
            _device_id: &str,
            _device_index: usize,
            _mask: &ChannelsMask,
            _cancel: &libiio_protocol::CancelToken,
        ) -> Result<(BackendBufferHandle, ChannelsMask), IioError> {
            Err(IioError::NotSupported("fake".into()))
        }

        fn close_buffer(&self, _handle: &BackendBufferHandle) -> Result<(), IioError> {
            Ok(())
        }

        fn enqueue_block(
            &self,
            _handle: &BackendBufferHandle,
            _data: &[u8],
            _bytes_used: usize,
            _cyclic: bool,
        ) -> Result<(), IioError> {
            Ok(())
        }

        fn dequeue_block(
            &self,
            _handle: &BackendBufferHandle,
            _data: &mut [u8],
            _nonblock: bool,
        ) -> Result<usize, IioError> {
            Ok(0)
        }

        fn get_trigger(&self, _device_id: &str) -> Result<Option<String>, IioError> {
            Ok(None)
        }

        fn set_trigger(&self, _device_id: &str, _trigger_id: Option<&str>) -> Result<(), IioError> {
            Ok(())
        }

        fn open_event_stream(
            &self,
            _device_id: &str,
            _cancel: &libiio_protocol::CancelToken,
        ) -> Result<BackendEventHandle, IioError> {
            Err(IioError::NotSupported("fake".into()))
        }

        fn read_event(&self, _handle: &BackendEventHandle, _nonblock: bool) -> Result<RawEvent, IioError> {
            Err(IioError::NotSupported("fake".into()))
        }
    }

    pub(crate) fn fake_context() -> Context {
        Context::from_backend(Arc::new(FakeBackend), &ContextParams::new("fake:")).unwrap()
    }

    #[test]
    fn open_context_sorts_devices_and_exposes_attrs() {
        let ctx = fake_context();
        assert_eq!(ctx.devices().len(), 1);
        assert_eq!(ctx.attr("uri"), Some("fake:"));
        assert_eq!(ctx.description(), "fake context");
    }

    #[test]
    fn attr_read_and_write_round_trip_through_backend() {
        let ctx = fake_context();
        let dev = ctx.find_device("iio:device0").unwrap();
        let attr = dev.attr("sampling_frequency").unwrap();
        assert_eq!(attr.read().unwrap(), "1");
        attr.write("10").unwrap();
    }
}
