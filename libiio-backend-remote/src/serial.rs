// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `serial:` backend (spec.md §4.4, §1). Opening and configuring a
//! real serial port (baud rate, parity, flow control) is an OS-specific
//! collaborator; no serial-port crate appears in the corpus this tree was
//! grounded on, so this connector only validates the URI and reports
//! `NotSupported` rather than fabricating a dependency.

use crate::session::Connector;
use libiio_common::IioError;
use libiio_core::backend::{ContextParams, UriScheme};
use libiio_protocol::Transport;

pub struct SerialConnector;

impl Connector for SerialConnector {
    fn scheme(&self) -> &'static str {
        "serial"
    }

    fn connect(&self, params: &ContextParams) -> Result<Box<dyn Transport>, IioError> {
        match UriScheme::parse(&params.uri)? {
            UriScheme::Serial { port, baud, config } => Err(IioError::NotSupported(format!(
                "serial: transport requires an OS serial-port backend ({port} at {baud} {config})"
            ))),
            _ => Err(IioError::BadArgument(format!("not a serial: URI: {:?}", params.uri))),
        }
    }
}
