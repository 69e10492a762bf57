// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The dialect-selecting codec front-end. `IiodCodec` is the only type
//! `libiio-backend-remote` talks to; the `Protocol` tag never leaks past
//! this module (design note in spec.md §9: "Do NOT leak the dialect
//! outside the codec").

use super::{v0, v1, Command, Protocol};
use crate::transport::Transport;
use libiio_common::IioError;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

pub struct IiodCodec {
    protocol: Protocol,
    next_client_id: AtomicU16,
}

impl IiodCodec {
    pub fn new(protocol: Protocol) -> Self {
        IiodCodec { protocol, next_client_id: AtomicU16::new(1) }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Performs the `VERSION` handshake. Unlike every other command, the
    /// v0 reply is a single line of the form `"<major> <minor> <tag>"`
    /// rather than a length-prefixed payload.
    pub fn version(
        &self,
        t: &mut dyn Transport,
        deadline: Option<Duration>,
    ) -> Result<super::VersionInfo, IioError> {
        match self.protocol {
            Protocol::V0 => {
                t.write_all(&v0::encode_command(&Command::Version), deadline)?;
                let line = v0::read_line(t, deadline)?;
                v0::parse_version_line(&line)
            }
            Protocol::V1 => {
                let payload = self.request_v1(t, &Command::Version, 0, &[], deadline)?;
                v0::parse_version_line(&payload)
            }
        }
    }

    /// Sends `cmd` (with an optional write payload) and returns whatever
    /// payload bytes the reply carries. `dev_index` is only consulted
    /// under v1; v0 addresses devices by name embedded in `cmd`.
    pub fn request(
        &self,
        t: &mut dyn Transport,
        cmd: &Command,
        dev_index: u8,
        write_payload: &[u8],
        deadline: Option<Duration>,
    ) -> Result<Vec<u8>, IioError> {
        match self.protocol {
            Protocol::V0 => self.request_v0(t, cmd, write_payload, deadline),
            Protocol::V1 => self.request_v1(t, cmd, dev_index, write_payload, deadline),
        }
    }

    fn request_v0(
        &self,
        t: &mut dyn Transport,
        cmd: &Command,
        write_payload: &[u8],
        deadline: Option<Duration>,
    ) -> Result<Vec<u8>, IioError> {
        t.write_all(&v0::encode_command(cmd), deadline)?;
        if !write_payload.is_empty() {
            t.write_all(write_payload, deadline)?;
        }
        let len = v0::read_reply_code(t, deadline)?;
        match cmd {
            Command::ReadBuf { .. } => v0::read_chunked_payload(t, len as usize, deadline),
            _ => v0::read_fixed_payload(t, len as usize, deadline),
        }
    }

    fn request_v1(
        &self,
        t: &mut dyn Transport,
        cmd: &Command,
        dev_index: u8,
        write_payload: &[u8],
        deadline: Option<Duration>,
    ) -> Result<Vec<u8>, IioError> {
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let request = v1::encode_request(cmd, dev_index, client_id, write_payload);
        t.write_all(&request, deadline)?;
        loop {
            let frame = v1::read_frame(t, deadline)?;
            if frame.header.client_id != client_id {
                // A response for a different in-flight request arrived
                // first; a real multiplexing client would route this to
                // that request's queue instead of discarding it.
                continue;
            }
            let frame = v1::response_result(&frame)?;
            return Ok(frame.payload.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackTransport;

    #[test]
    fn v0_read_attr_round_trip() {
        let codec = IiodCodec::new(Protocol::V0);
        let (mut server, mut client) = LoopbackTransport::pair();
        let handle = std::thread::spawn(move || {
            server.write_all(b"5\n", None).unwrap();
            server.write_all(b"1024\n", None).unwrap();
        });
        let cmd = Command::Read { dev: "dev0".into(), chn: None, attr: "raw".into() };
        let value = codec.request(&mut client, &cmd, 0, &[], None).unwrap();
        assert_eq!(value, b"1024\n");
        handle.join().unwrap();
    }

    #[test]
    fn v1_read_attr_round_trip() {
        let codec = IiodCodec::new(Protocol::V1);
        let (mut server, mut client) = LoopbackTransport::pair();
        let handle = std::thread::spawn(move || {
            let req = v1::read_frame(&mut server, None).unwrap();
            let header = v1::FrameHeader {
                opcode: req.header.opcode,
                dev_index: req.header.dev_index,
                client_id: req.header.client_id,
                payload_len: 5,
                code: 0,
            };
            server.write_all(&header.to_bytes(), None).unwrap();
            server.write_all(b"1024\n", None).unwrap();
        });
        let cmd = Command::Read { dev: "dev0".into(), chn: None, attr: "raw".into() };
        let value = codec.request(&mut client, &cmd, 0, &[], None).unwrap();
        assert_eq!(value, b"1024\n");
        handle.join().unwrap();
    }
}
