// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The local sysfs/chardev backend (spec.md §4.5 / C5): binds sysfs
//! attribute I/O, the buffer chardev (ioctl+mmap with a read/write
//! fallback) and the event chardev into `libiio-core`'s [`Backend`] trait.
//! POSIX only.

mod chardev;
mod event;
mod ioctl;
mod sysfs;

use libiio_common::IioError;
use libiio_core::backend::{AttrRef, BackendBufferHandle, BackendEventHandle, ContextBuildResult, ContextParams};
use libiio_core::{Backend, ChannelsMask, DeviceData, ScanBackend, ScanFilter};
use libiio_protocol::CancelToken;
use std::sync::Mutex;
use std::time::Duration;
use sysfs::SysfsRoot;
use tracing::{debug, warn};

/// The `local:` backend. Holds the last-scanned device graph so
/// `open_buffer`/`reg_read`/`get_trigger` can resolve a `device_id` back to
/// its sysfs directory and channel layout without re-walking sysfs on every
/// call.
pub struct LocalBackend {
    sysfs: SysfsRoot,
    devices: Mutex<Vec<DeviceData>>,
    timeout: Mutex<Option<Duration>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        LocalBackend { sysfs: SysfsRoot::system_default(), devices: Mutex::new(Vec::new()), timeout: Mutex::new(None) }
    }

    /// Points the backend at a scratch directory shaped like
    /// `/sys/bus/iio/devices` (and, optionally, a scratch debugfs root),
    /// for tests.
    pub fn with_sysfs_root(sysfs: SysfsRoot) -> Self {
        LocalBackend { sysfs, devices: Mutex::new(Vec::new()), timeout: Mutex::new(None) }
    }

    fn device(&self, device_id: &str) -> Result<DeviceData, IioError> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == device_id)
            .cloned()
            .ok_or_else(|| IioError::NotFound(format!("no such device: {device_id}")))
    }

    fn attr_path(&self, attr: &AttrRef) -> Result<std::path::PathBuf, IioError> {
        let dev_dir = self.sysfs.device_dir(&attr.device_id);
        match attr.category {
            libiio_core::AttrCategory::Device | libiio_core::AttrCategory::Channel => {
                Ok(dev_dir.join(&attr.filename))
            }
            libiio_core::AttrCategory::Buffer => Ok(dev_dir.join("buffer").join(&attr.filename)),
            libiio_core::AttrCategory::Debug => self
                .sysfs
                .debug_device_dir(&attr.device_id)
                .map(|d| d.join(&attr.filename))
                .ok_or_else(|| IioError::NotSupported("no debugfs root configured".into())),
            libiio_core::AttrCategory::Context => {
                Err(IioError::BadArgument("context attributes aren't backend-resolved".into()))
            }
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for LocalBackend {
    fn scheme(&self) -> &'static str {
        "local"
    }

    fn open_context(&self, _params: &ContextParams) -> Result<ContextBuildResult, IioError> {
        let devices = self.sysfs.scan_devices()?;
        debug!(count = devices.len(), "scanned local sysfs devices");
        *self.devices.lock().unwrap() = devices.clone();
        Ok(ContextBuildResult {
            devices,
            description: "Local devices".into(),
            attrs: vec![("uri".into(), "local:".into())],
        })
    }

    fn get_xml(&self, devices: &[DeviceData]) -> Result<String, IioError> {
        libiio_xml::to_xml(devices, "Local devices")
    }

    fn read_attr(&self, attr: &AttrRef) -> Result<String, IioError> {
        sysfs::read_attr_file(&self.attr_path(attr)?)
    }

    fn write_attr(&self, attr: &AttrRef, value: &str) -> Result<(), IioError> {
        sysfs::write_attr_file(&self.attr_path(attr)?, value)
    }

    fn open_buffer(
        &self,
        device_id: &str,
        _device_index: usize,
        mask: &ChannelsMask,
        cancel: &CancelToken,
    ) -> Result<(BackendBufferHandle, ChannelsMask), IioError> {
        let device = self.device(device_id)?;
        configure_scan_mask(&self.sysfs, &device, mask)?;

        let timeout = *self.timeout.lock().unwrap();
        let handle = chardev::ChardevBuffer::open(device_id, cancel.clone(), timeout)?;
        Ok((BackendBufferHandle(Box::new(handle)), mask.clone()))
    }

    fn close_buffer(&self, handle: &BackendBufferHandle) -> Result<(), IioError> {
        downcast_buffer(handle)?.close()
    }

    fn enqueue_block(
        &self,
        handle: &BackendBufferHandle,
        data: &[u8],
        bytes_used: usize,
        cyclic: bool,
    ) -> Result<(), IioError> {
        downcast_buffer(handle)?.enqueue(data, bytes_used, cyclic)
    }

    fn dequeue_block(&self, handle: &BackendBufferHandle, data: &mut [u8], nonblock: bool) -> Result<usize, IioError> {
        downcast_buffer(handle)?.dequeue(data, nonblock)
    }

    fn get_trigger(&self, device_id: &str) -> Result<Option<String>, IioError> {
        let path = self.sysfs.device_dir(device_id).join("trigger").join("current_trigger");
        match sysfs::read_attr_file(&path) {
            Ok(s) if s.is_empty() => Ok(None),
            Ok(s) => Ok(Some(s)),
            Err(IioError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_trigger(&self, device_id: &str, trigger_id: Option<&str>) -> Result<(), IioError> {
        let path = self.sysfs.device_dir(device_id).join("trigger").join("current_trigger");
        sysfs::write_attr_file(&path, trigger_id.unwrap_or(""))
    }

    fn reg_read(&self, device_id: &str, addr: u32) -> Result<u32, IioError> {
        let path = self
            .sysfs
            .debug_device_dir(device_id)
            .ok_or_else(|| IioError::NotSupported("no debugfs root configured".into()))?
            .join("direct_reg_access");
        sysfs::write_attr_file(&path, &format!("{addr:#x}"))?;
        let s = sysfs::read_attr_file(&path)?;
        u32::from_str_radix(s.trim().trim_start_matches("0x"), 16)
            .map_err(|_| IioError::Protocol(format!("unparsable direct_reg_access reply: {s:?}")))
    }

    fn reg_write(&self, device_id: &str, addr: u32, value: u32) -> Result<(), IioError> {
        let path = self
            .sysfs
            .debug_device_dir(device_id)
            .ok_or_else(|| IioError::NotSupported("no debugfs root configured".into()))?
            .join("direct_reg_access");
        sysfs::write_attr_file(&path, &format!("{addr:#x} {value:#x}"))
    }

    fn open_event_stream(&self, device_id: &str, cancel: &CancelToken) -> Result<BackendEventHandle, IioError> {
        let timeout = *self.timeout.lock().unwrap();
        let stream = event::ChardevEventStream::open(device_id, cancel.clone(), timeout)?;
        Ok(BackendEventHandle(Box::new(stream)))
    }

    fn read_event(&self, handle: &BackendEventHandle, nonblock: bool) -> Result<libiio_core::RawEvent, IioError> {
        handle
            .0
            .downcast_ref::<event::ChardevEventStream>()
            .ok_or_else(|| IioError::BadState("event handle type mismatch".into()))?
            .read(nonblock)
    }
}

/// The `local` leg of context discovery (spec.md §4.9): one sysfs walk,
/// reported as a single `"local:"` entry when the filter asks for it and
/// at least one device is present.
pub struct LocalScanBackend {
    sysfs: SysfsRoot,
}

impl LocalScanBackend {
    pub fn new() -> Self {
        LocalScanBackend { sysfs: SysfsRoot::system_default() }
    }

    pub fn with_sysfs_root(sysfs: SysfsRoot) -> Self {
        LocalScanBackend { sysfs }
    }
}

impl Default for LocalScanBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanBackend for LocalScanBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn scan(&self, filter: &ScanFilter) -> Result<Vec<(String, String)>, IioError> {
        if !filter.local {
            return Ok(Vec::new());
        }
        let devices = self.sysfs.scan_devices()?;
        if devices.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![("local:".to_string(), "Local devices".to_string())])
    }
}

fn downcast_buffer(handle: &BackendBufferHandle) -> Result<&chardev::ChardevBuffer, IioError> {
    handle.0.downcast_ref::<chardev::ChardevBuffer>().ok_or_else(|| IioError::BadState("buffer handle type mismatch".into()))
}

/// Enables exactly the channels in `mask` via `scan_elements/<id>_en`,
/// disabling every other scan-element channel (spec.md §4.5). Channels
/// that aren't scan elements are unaffected.
fn configure_scan_mask(sysfs: &SysfsRoot, device: &DeviceData, mask: &ChannelsMask) -> Result<(), IioError> {
    let scan_elements_dir = sysfs.device_dir(&device.id).join("scan_elements");
    for (index, channel) in device.channels.iter().enumerate() {
        if !channel.scan_element {
            continue;
        }
        let path = scan_elements_dir.join(format!("{}_en", channel.id));
        let enabled = mask.is_set(index);
        if let Err(e) = sysfs::write_attr_file(&path, if enabled { "1" } else { "0" }) {
            warn!(channel = %channel.id, error = %e, "failed to set scan_elements enable mask");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_local() {
        assert_eq!(LocalBackend::new().scheme(), "local");
    }

    #[test]
    fn scan_backend_reports_nothing_when_filter_excludes_local() {
        let backend = LocalScanBackend::with_sysfs_root(SysfsRoot::new("/nonexistent/for/tests"));
        let filter = ScanFilter { local: false, usb: None, ip: false };
        assert_eq!(backend.scan(&filter).unwrap(), vec![]);
    }

    #[test]
    fn scan_backend_reports_nothing_with_no_devices_present() {
        let backend = LocalScanBackend::with_sysfs_root(SysfsRoot::new("/nonexistent/for/tests"));
        let filter = ScanFilter { local: true, usb: None, ip: false };
        assert_eq!(backend.scan(&filter).unwrap(), vec![]);
    }
}
