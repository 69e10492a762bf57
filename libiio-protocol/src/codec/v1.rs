// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The v1 (binary, framed) IIOD dialect (spec.md §4.2, §6).
//!
//! Every frame is a 16-byte little-endian header followed by
//! `payload_len` bytes. A single TCP stream multiplexes concurrent
//! in-flight requests by `client_id`; demultiplexing into per-request
//! queues is the transport-owning backend's job (`libiio-backend-remote`),
//! not this module's — this module only encodes/decodes frames.

use super::Command;
use crate::transport::Transport;
use libiio_common::IioError;
use std::time::Duration;

pub const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Print = 0,
    Version = 1,
    Timeout = 2,
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,
    ReadBuf = 7,
    WriteBuf = 8,
    GetTrig = 9,
    SetTrig = 10,
    SetBuffersCount = 11,
    Event = 12,
}

impl Opcode {
    pub fn from_u8(v: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match v {
            0 => Print,
            1 => Version,
            2 => Timeout,
            3 => Read,
            4 => Write,
            5 => Open,
            6 => Close,
            7 => ReadBuf,
            8 => WriteBuf,
            9 => GetTrig,
            10 => SetTrig,
            11 => SetBuffersCount,
            12 => Event,
            _ => return None,
        })
    }

    pub fn of(cmd: &Command) -> Opcode {
        match cmd {
            Command::Print => Opcode::Print,
            Command::Version => Opcode::Version,
            Command::Timeout { .. } => Opcode::Timeout,
            Command::Read { .. } => Opcode::Read,
            Command::Write { .. } => Opcode::Write,
            Command::Open { .. } => Opcode::Open,
            Command::Close { .. } => Opcode::Close,
            Command::ReadBuf { .. } => Opcode::ReadBuf,
            Command::WriteBuf { .. } => Opcode::WriteBuf,
            Command::GetTrig { .. } => Opcode::GetTrig,
            Command::SetTrig { .. } => Opcode::SetTrig,
            Command::SetBuffersCount { .. } => Opcode::SetBuffersCount,
            Command::Event { .. } => Opcode::Event,
        }
    }
}

/// A decoded (or about-to-be-encoded) v1 frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub opcode: u8,
    pub dev_index: u8,
    pub client_id: u16,
    pub payload_len: u32,
    /// Command-specific on a request; `0` or `-errno` on a response.
    pub code: i32,
}

impl FrameHeader {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = self.opcode;
        buf[1] = self.dev_index;
        buf[2..4].copy_from_slice(&self.client_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[8..12].copy_from_slice(&self.code.to_le_bytes());
        buf[12..16].copy_from_slice(&0u32.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_LEN]) -> FrameHeader {
        FrameHeader {
            opcode: buf[0],
            dev_index: buf[1],
            client_id: u16::from_le_bytes([buf[2], buf[3]]),
            payload_len: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            code: i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        }
    }
}

/// A fully decoded frame: header plus its payload bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

/// Encodes a request frame. `dev_index` resolves the device name embedded
/// in `cmd` to the backend-local index the wire format expects; payload
/// carries any bytes a `WRITE`/`WRITEBUF` command sends alongside.
pub fn encode_request(
    cmd: &Command,
    dev_index: u8,
    client_id: u16,
    payload: &[u8],
) -> Vec<u8> {
    let header = FrameHeader {
        opcode: Opcode::of(cmd) as u8,
        dev_index,
        client_id,
        payload_len: payload.len() as u32,
        code: request_code(cmd),
    };
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

/// The command-specific integer the request header's `code` field carries
/// (e.g. `TIMEOUT`'s millisecond value, `OPEN`'s sample count).
fn request_code(cmd: &Command) -> i32 {
    match cmd {
        Command::Timeout { ms } => *ms as i32,
        Command::Write { len, .. } => *len as i32,
        Command::Open { samples_count, cyclic, .. } => {
            (*samples_count as i32) | if *cyclic { i32::MIN } else { 0 }
        }
        Command::ReadBuf { count, .. } | Command::WriteBuf { count, .. } => *count as i32,
        Command::SetBuffersCount { n, .. } => *n as i32,
        _ => 0,
    }
}

/// Reads one full frame (header + payload) from the transport.
pub fn read_frame(t: &mut dyn Transport, deadline: Option<Duration>) -> Result<Frame, IioError> {
    let mut header_buf = [0u8; HEADER_LEN];
    t.read_exact(&mut header_buf, deadline)?;
    let header = FrameHeader::from_bytes(&header_buf);
    let mut payload = vec![0u8; header.payload_len as usize];
    if !payload.is_empty() {
        t.read_exact(&mut payload, deadline)?;
    }
    Ok(Frame { header, payload })
}

/// Maps a response frame's `code` field the same way a v0 reply-code line
/// is mapped: negative is a remote errno, non-negative carries through.
pub fn response_result(frame: &Frame) -> Result<&Frame, IioError> {
    if frame.header.code < 0 {
        Err(IioError::from_remote_errno(frame.header.code))
    } else {
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackTransport;

    #[test]
    fn header_roundtrips_through_bytes() {
        let header = FrameHeader {
            opcode: Opcode::Read as u8,
            dev_index: 3,
            client_id: 42,
            payload_len: 128,
            code: -22,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(FrameHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn read_frame_assembles_header_and_payload() {
        let (mut a, mut b) = LoopbackTransport::pair();
        let header = FrameHeader {
            opcode: Opcode::Read as u8,
            dev_index: 0,
            client_id: 1,
            payload_len: 5,
            code: 0,
        };
        a.write(&header.to_bytes(), None).unwrap();
        a.write(b"1024\n", None).unwrap();
        let frame = read_frame(&mut b, None).unwrap();
        assert_eq!(frame.payload, b"1024\n");
    }

    #[test]
    fn negative_code_maps_to_remote_errno() {
        let frame = Frame {
            header: FrameHeader {
                opcode: 0,
                dev_index: 0,
                client_id: 0,
                payload_len: 0,
                code: -2,
            },
            payload: vec![],
        };
        assert!(matches!(
            response_result(&frame).unwrap_err(),
            IioError::NotFound(_)
        ));
    }
}
