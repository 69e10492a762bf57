// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `usb:` backend (spec.md §4.4, §1). USB bulk-transfer packetization
//! and enumeration are an external collaborator this crate only defines an
//! interface for; no `libusb`/`rusb`/`nusb` binding ships here (no such
//! crate appears anywhere in the corpus this tree was grounded on). The
//! scheme is still registered so `UriScheme::parse`/`BackendRegistry`
//! dispatch behave the same as for a host that does carry a working USB
//! stack: callers get a clean `NotSupported` instead of "unknown scheme".

use crate::session::Connector;
use libiio_common::IioError;
use libiio_core::backend::ContextParams;
use libiio_protocol::Transport;

pub struct UsbConnector;

impl Connector for UsbConnector {
    fn scheme(&self) -> &'static str {
        "usb"
    }

    fn connect(&self, _params: &ContextParams) -> Result<Box<dyn Transport>, IioError> {
        Err(IioError::NotSupported("usb: transport requires a USB bulk-transfer backend".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_not_supported() {
        let err = UsbConnector.connect(&ContextParams::new("usb:1.2.3")).unwrap_err();
        assert!(matches!(err, IioError::NotSupported(_)));
    }
}
