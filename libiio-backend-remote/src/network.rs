// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `ip:` backend (spec.md §4.4, §8 scenario 1): dials IIOD over TCP.
//! This is the only remote connector with a real transport behind it; see
//! [`crate::usb`]/[`crate::serial`] for the two that aren't.

use crate::session::Connector;
use libiio_common::IioError;
use libiio_core::backend::{ContextParams, UriScheme};
use libiio_protocol::transport::tcp::{TcpTransport, IIOD_DEFAULT_PORT};
use libiio_protocol::Transport;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct NetworkConnector;

impl Connector for NetworkConnector {
    fn scheme(&self) -> &'static str {
        "ip"
    }

    fn connect(&self, params: &ContextParams) -> Result<Box<dyn Transport>, IioError> {
        let host = match UriScheme::parse(&params.uri)? {
            UriScheme::Ip { host: Some(host), port } => (host, port.unwrap_or(IIOD_DEFAULT_PORT)),
            UriScheme::Ip { host: None, .. } => {
                return Err(IioError::BadArgument("ip: URI requires a host (zeroconf discovery is out of scope)".into()))
            }
            _ => return Err(IioError::BadArgument(format!("not an ip: URI: {:?}", params.uri))),
        };
        debug!(host = %host.0, port = host.1, "dialing IIOD over TCP");
        let transport = TcpTransport::connect((host.0.as_str(), host.1), CONNECT_TIMEOUT)?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_host_less_uri() {
        let connector = NetworkConnector;
        let err = connector.connect(&ContextParams::new("ip:")).unwrap_err();
        assert!(matches!(err, IioError::BadArgument(_)));
    }

    #[test]
    fn rejects_foreign_scheme() {
        let connector = NetworkConnector;
        let err = connector.connect(&ContextParams::new("usb:1.2.3")).unwrap_err();
        assert!(matches!(err, IioError::BadArgument(_)));
    }
}
