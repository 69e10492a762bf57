// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The polymorphic backend capability set (spec.md §4.4 / C4) and the URI
//! scheme that selects one. Unsupported operations return `NotSupported`;
//! callers must not assume universal availability (spec.md §9 design
//! note).

use crate::event::RawEvent;
use crate::mask::ChannelsMask;
use crate::model::{AttrCategory, DeviceData};
use libiio_common::IioError;
use libiio_protocol::CancelToken;
use std::sync::Arc;

/// Parameters resolved from a URI plus any caller overrides (timeout,
/// forced backend). Mirrors the teacher's builder-pattern configuration
/// structs.
#[derive(Debug, Clone)]
pub struct ContextParams {
    pub uri: String,
    pub timeout_ms: u32,
}

impl ContextParams {
    pub fn new(uri: impl Into<String>) -> Self {
        ContextParams { uri: uri.into(), timeout_ms: 0 }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Resolves from the environment when no URI was given explicitly
    /// (spec.md §6: `IIOD_REMOTE`).
    pub fn from_env_or(uri: Option<String>) -> Option<Self> {
        uri.or_else(|| std::env::var("IIOD_REMOTE").ok())
            .map(ContextParams::new)
    }
}

/// An opaque, backend-owned handle to an open buffer's hardware data path.
/// `libiio-core`'s [`crate::buffer::Buffer`] stores one of these and hands
/// it back into every `Backend` buffer operation.
pub struct BackendBufferHandle(pub Box<dyn std::any::Any + Send + Sync>);

/// An opaque, backend-owned handle to an open event queue.
pub struct BackendEventHandle(pub Box<dyn std::any::Any + Send + Sync>);

/// A fully resolved reference to one attribute, passed to `read_attr`/
/// `write_attr`. `channel` disambiguates a channel attribute from a
/// device/debug/buffer attribute of the same device.
#[derive(Debug, Clone)]
pub struct AttrRef {
    pub device_id: String,
    pub channel_id: Option<String>,
    pub filename: String,
    pub category: AttrCategory,
}

/// The capability set every backend implements (spec.md §4.4).
///
/// This is the Rust analogue of the original's vtable-of-function-pointers:
/// one trait, one implementation per backend, dispatched dynamically via
/// `Arc<dyn Backend>`.
pub trait Backend: Send + Sync {
    fn scheme(&self) -> &'static str;

    fn open_context(&self, params: &ContextParams) -> Result<ContextBuildResult, IioError>;

    fn get_xml(&self, devices: &[DeviceData]) -> Result<String, IioError>;

    /// Optional: backends without a cheap duplication path return
    /// `NotSupported`.
    fn clone_context(&self, _devices: &[DeviceData]) -> Result<ContextBuildResult, IioError> {
        Err(IioError::NotSupported("context cloning".into()))
    }

    fn read_attr(&self, attr: &AttrRef) -> Result<String, IioError>;
    fn write_attr(&self, attr: &AttrRef, value: &str) -> Result<(), IioError>;

    /// `cancel` is the buffer's wakeup channel: a real backend retains it
    /// and joins its wakeup fd with the data path in every blocking wait,
    /// so `Buffer::cancel()` unblocks `dequeue_block`/`enqueue_block` from
    /// any thread (spec.md §5).
    fn open_buffer(
        &self,
        device_id: &str,
        device_index: usize,
        mask: &ChannelsMask,
        cancel: &CancelToken,
    ) -> Result<(BackendBufferHandle, ChannelsMask), IioError>;
    fn close_buffer(&self, handle: &BackendBufferHandle) -> Result<(), IioError>;

    fn enqueue_block(
        &self,
        handle: &BackendBufferHandle,
        data: &[u8],
        bytes_used: usize,
        cyclic: bool,
    ) -> Result<(), IioError>;

    /// `nonblock = true` returns `WouldBlock` instead of parking.
    fn dequeue_block(
        &self,
        handle: &BackendBufferHandle,
        data: &mut [u8],
        nonblock: bool,
    ) -> Result<usize, IioError>;

    fn get_trigger(&self, device_id: &str) -> Result<Option<String>, IioError>;
    fn set_trigger(&self, device_id: &str, trigger_id: Option<&str>) -> Result<(), IioError>;

    fn reg_read(&self, _device_id: &str, _addr: u32) -> Result<u32, IioError> {
        Err(IioError::NotSupported("register access".into()))
    }
    fn reg_write(&self, _device_id: &str, _addr: u32, _value: u32) -> Result<(), IioError> {
        Err(IioError::NotSupported("register access".into()))
    }

    fn open_event_stream(
        &self,
        device_id: &str,
        cancel: &CancelToken,
    ) -> Result<BackendEventHandle, IioError>;
    fn read_event(
        &self,
        handle: &BackendEventHandle,
        nonblock: bool,
    ) -> Result<RawEvent, IioError>;
}

/// What `open_context` hands back: the device graph plus the context-level
/// metadata attributes (uri, description, version, serial — spec.md §3).
pub struct ContextBuildResult {
    pub devices: Vec<DeviceData>,
    pub description: String,
    pub attrs: Vec<(String, String)>,
}

/// Dispatches a URI to the backend that owns its scheme (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriScheme {
    Local,
    Ip { host: Option<String>, port: Option<u16> },
    Usb { bus: u8, port: u8, interface: u8 },
    Serial { port: String, baud: u32, config: String },
    Xml { path: String },
}

impl UriScheme {
    pub fn parse(uri: &str) -> Result<UriScheme, IioError> {
        let (scheme, rest) = uri
            .split_once(':')
            .ok_or_else(|| IioError::BadArgument(format!("URI missing scheme: {uri:?}")))?;
        match scheme {
            "local" => Ok(UriScheme::Local),
            "ip" => {
                if rest.is_empty() {
                    return Ok(UriScheme::Ip { host: None, port: None });
                }
                match rest.split_once(':') {
                    Some((host, port)) => {
                        let port = port.parse().map_err(|_| {
                            IioError::BadArgument(format!("bad ip: port in {uri:?}"))
                        })?;
                        Ok(UriScheme::Ip { host: Some(host.to_string()), port: Some(port) })
                    }
                    None => Ok(UriScheme::Ip { host: Some(rest.to_string()), port: None }),
                }
            }
            "usb" => {
                let parts: Vec<_> = rest.split('.').collect();
                if parts.len() != 3 {
                    return Err(IioError::BadArgument(format!(
                        "usb: URI must be bus.port.iface, got {uri:?}"
                    )));
                }
                let parse_part = |s: &str| {
                    s.parse::<u8>()
                        .map_err(|_| IioError::BadArgument(format!("bad usb: component in {uri:?}")))
                };
                Ok(UriScheme::Usb {
                    bus: parse_part(parts[0])?,
                    port: parse_part(parts[1])?,
                    interface: parse_part(parts[2])?,
                })
            }
            "serial" => {
                let parts: Vec<_> = rest.splitn(2, ',').collect();
                let port = parts
                    .first()
                    .ok_or_else(|| IioError::BadArgument(format!("serial: URI missing port in {uri:?}")))?
                    .to_string();
                let mut baud = 115200;
                let mut config = "8n1".to_string();
                if let Some(rest) = parts.get(1) {
                    let sub: Vec<_> = rest.split(',').collect();
                    if let Some(b) = sub.first() {
                        baud = b.parse().map_err(|_| {
                            IioError::BadArgument(format!("bad serial: baud in {uri:?}"))
                        })?;
                    }
                    if let Some(c) = sub.get(1) {
                        config = c.to_string();
                    }
                }
                Ok(UriScheme::Serial { port, baud, config })
            }
            "xml" => Ok(UriScheme::Xml { path: rest.to_string() }),
            other => Err(IioError::BadArgument(format!("unknown URI scheme: {other:?}"))),
        }
    }
}

/// Maps URIs to registered backends, keyed by scheme name. Application code
/// registers the backends it was built with (the CLI registers all of
/// them; an embedded build may register only `local`).
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.push(backend);
    }

    pub fn resolve(&self, uri: &str) -> Result<Arc<dyn Backend>, IioError> {
        let scheme = uri
            .split_once(':')
            .map(|(s, _)| s)
            .ok_or_else(|| IioError::BadArgument(format!("URI missing scheme: {uri:?}")))?;
        // LIBIIO_BACKEND forces a specific backend regardless of the URI
        // scheme, for tests (spec.md §6 environment variables).
        let forced = std::env::var("LIBIIO_BACKEND").ok();
        if let Some(forced) = forced {
            if let Some(b) = self.backends.iter().find(|b| b.scheme() == forced) {
                return Ok(b.clone());
            }
        }
        self.backends
            .iter()
            .find(|b| b.scheme() == scheme)
            .cloned()
            .ok_or_else(|| IioError::NotSupported(format!("no backend registered for scheme {scheme:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_uri_schemes() {
        assert_eq!(UriScheme::parse("local:").unwrap(), UriScheme::Local);
        assert_eq!(
            UriScheme::parse("ip:192.0.2.1").unwrap(),
            UriScheme::Ip { host: Some("192.0.2.1".into()), port: None }
        );
        assert_eq!(
            UriScheme::parse("ip:192.0.2.1:30432").unwrap(),
            UriScheme::Ip { host: Some("192.0.2.1".into()), port: Some(30432) }
        );
        assert_eq!(UriScheme::parse("ip:").unwrap(), UriScheme::Ip { host: None, port: None });
        assert_eq!(
            UriScheme::parse("usb:3.2.5").unwrap(),
            UriScheme::Usb { bus: 3, port: 2, interface: 5 }
        );
        assert_eq!(
            UriScheme::parse("serial:/dev/ttyUSB0,115200,8n1").unwrap(),
            UriScheme::Serial {
                port: "/dev/ttyUSB0".into(),
                baud: 115200,
                config: "8n1".into()
            }
        );
        assert_eq!(
            UriScheme::parse("xml:/tmp/ctx.xml").unwrap(),
            UriScheme::Xml { path: "/tmp/ctx.xml".into() }
        );
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(UriScheme::parse("ftp:foo").is_err());
        assert!(UriScheme::parse("no-scheme-here").is_err());
    }

    struct DummyBackend(&'static str);
    impl Backend for DummyBackend {
        fn scheme(&self) -> &'static str {
            self.0
        }
        fn open_context(&self, _params: &ContextParams) -> Result<ContextBuildResult, IioError> {
            Ok(ContextBuildResult { devices: vec![], description: String::new(), attrs: vec![] })
        }
        fn get_xml(&self, _devices: &[DeviceData]) -> Result<String, IioError> {
            Ok(String::new())
        }
        fn read_attr(&self, _attr: &AttrRef) -> Result<String, IioError> {
            Err(IioError::NotSupported("dummy".into()))
        }
        fn write_attr(&self, _attr: &AttrRef, _value: &str) -> Result<(), IioError> {
            Err(IioError::NotSupported("dummy".into()))
        }
        fn open_buffer(
            &self,
            _device_id: &str,
            _device_index: usize,
            _mask: &ChannelsMask,
            _cancel: &CancelToken,
        ) -> Result<(BackendBufferHandle, ChannelsMask), IioError> {
            Err(IioError::NotSupported("dummy".into()))
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
            _cancel: &CancelToken,
        ) -> Result<BackendEventHandle, IioError> {
            Err(IioError::NotSupported("dummy".into()))
        }
        fn read_event(
            &self,
            _handle: &BackendEventHandle,
            _nonblock: bool,
        ) -> Result<RawEvent, IioError> {
            Err(IioError::NotSupported("dummy".into()))
        }
    }

    #[test]
    fn registry_resolves_by_scheme() {
        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(DummyBackend("local")));
        registry.register(Arc::new(DummyBackend("ip")));
        assert!(registry.resolve("local:").is_ok());
        assert!(registry.resolve("ip:192.0.2.1").is_ok());
        assert!(registry.resolve("usb:1.2.3").is_err());
    }
}
