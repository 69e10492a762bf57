// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The network/USB/serial backends (spec.md §4.6-§4.7 / C6-C7): thin
//! bindings of the IIOD protocol client (`libiio-protocol`) into
//! `libiio-core`'s [`Backend`](libiio_core::Backend) trait. Only the `ip:`
//! connector has a real transport behind it; `usb:`/`serial:` are
//! registered so URI dispatch behaves consistently but report
//! `NotSupported` at connect time (see [`usb`]/[`serial`]).

mod network;
mod scan;
mod serial;
mod session;
mod usb;

pub use network::NetworkConnector;
pub use scan::{NetworkScanBackend, UsbScanBackend};
pub use serial::SerialConnector;
pub use session::{Connector, RemoteBackend};
pub use usb::UsbConnector;

pub type NetworkBackend = RemoteBackend<NetworkConnector>;
pub type UsbBackend = RemoteBackend<UsbConnector>;
pub type SerialBackend = RemoteBackend<SerialConnector>;

pub fn network_backend() -> NetworkBackend {
    RemoteBackend::new(NetworkConnector)
}

pub fn usb_backend() -> UsbBackend {
    RemoteBackend::new(UsbConnector)
}

pub fn serial_backend() -> SerialBackend {
    RemoteBackend::new(SerialConnector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libiio_core::Backend;

    #[test]
    fn backends_report_their_scheme() {
        assert_eq!(network_backend().scheme(), "ip");
        assert_eq!(usb_backend().scheme(), "usb");
        assert_eq!(serial_backend().scheme(), "serial");
    }

    #[test]
    fn attr_io_before_open_context_is_bad_state() {
        let backend = network_backend();
        let attr = libiio_core::backend::AttrRef {
            device_id: "iio:device0".into(),
            channel_id: None,
            filename: "raw".into(),
            category: libiio_core::AttrCategory::Device,
        };
        let err = backend.read_attr(&attr).unwrap_err();
        assert!(matches!(err, libiio_common::IioError::BadState(_)));
    }
}
