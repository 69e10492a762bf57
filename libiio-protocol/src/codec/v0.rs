// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The v0 (line-oriented text) IIOD dialect (spec.md §4.2, §6).
//!
//! Every command is one LF-terminated ASCII line. The first response line
//! is a decimal integer: non-negative is a byte count (the payload that
//! follows), negative is `-errno`. `READBUF`/`WRITEBUF` payloads may arrive
//! as several sub-chunks, each itself prefixed by its own decimal length
//! line, until the announced total is reached.

use super::Command;
use crate::transport::Transport;
use libiio_common::IioError;
use std::time::Duration;

pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let line = match cmd {
        Command::Print => "PRINT".to_string(),
        Command::Version => "VERSION".to_string(),
        Command::Timeout { ms } => format!("TIMEOUT {ms}"),
        Command::Read { dev, chn, attr } => match chn {
            Some(c) => format!("READ {dev} {c} {attr}"),
            None => format!("READ {dev} {attr}"),
        },
        Command::Write { dev, chn, attr, len } => match chn {
            Some(c) => format!("WRITE {dev} {c} {attr} {len}"),
            None => format!("WRITE {dev} {attr} {len}"),
        },
        Command::Open { dev, mask, samples_count, cyclic } => {
            format!("OPEN {dev} {mask} {samples_count} {}", *cyclic as u8)
        }
        Command::Close { dev } => format!("CLOSE {dev}"),
        Command::ReadBuf { dev, count } => format!("READBUF {dev} {count}"),
        Command::WriteBuf { dev, count } => format!("WRITEBUF {dev} {count}"),
        Command::GetTrig { dev } => format!("GETTRIG {dev}"),
        Command::SetTrig { dev, trig } => match trig {
            Some(t) => format!("SETTRIG {dev} {t}"),
            None => format!("SETTRIG {dev}"),
        },
        Command::SetBuffersCount { dev, n } => format!("SET {dev} BUFFERS_COUNT {n}"),
        Command::Event { dev } => format!("EVENT {dev}"),
    };
    let mut bytes = line.into_bytes();
    bytes.push(b'\n');
    bytes
}

/// Reads one LF-terminated line, excluding the trailing `\n`. Lines longer
/// than `MAX_LINE` are rejected as a protocol error rather than growing
/// unbounded on a misbehaving peer.
const MAX_LINE: usize = 4096;

pub fn read_line(t: &mut dyn Transport, deadline: Option<Duration>) -> Result<Vec<u8>, IioError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        t.read_exact(&mut byte, deadline)?;
        if byte[0] == b'\n' {
            return Ok(line);
        }
        line.push(byte[0]);
        if line.len() > MAX_LINE {
            return Err(IioError::Protocol("v0 response line too long".into()));
        }
    }
}

/// Reads the leading integer-or-errno response line. `Ok(n)` for `n >= 0`
/// is the announced byte count; a negative remote reply becomes the
/// corresponding [`IioError`] (spec.md §6 scenario 6).
pub fn read_reply_code(t: &mut dyn Transport, deadline: Option<Duration>) -> Result<i64, IioError> {
    let line = read_line(t, deadline)?;
    let text = std::str::from_utf8(&line)
        .map_err(|_| IioError::Protocol("non-UTF8 v0 reply line".into()))?;
    let code: i64 = text
        .trim()
        .parse()
        .map_err(|_| IioError::Protocol(format!("non-numeric v0 reply line: {text:?}")))?;
    if code < 0 {
        return Err(IioError::from_remote_errno(code as i32));
    }
    Ok(code)
}

/// Reads a `READ`/`WRITE` acknowledgement payload of exactly `len` bytes.
/// Per spec.md §9's preserved open question: a `len` of zero yields an
/// empty byte string, not an error — the ambiguity between "empty value"
/// and "error code 0" is intentionally left unresolved and this is the
/// chosen, documented behavior.
pub fn read_fixed_payload(
    t: &mut dyn Transport,
    len: usize,
    deadline: Option<Duration>,
) -> Result<Vec<u8>, IioError> {
    let mut buf = vec![0u8; len];
    if len > 0 {
        t.read_exact(&mut buf, deadline)?;
    }
    Ok(buf)
}

/// Reads a `READBUF` payload of `total` bytes, which may arrive as several
/// sub-chunks each prefixed by its own decimal length line.
pub fn read_chunked_payload(
    t: &mut dyn Transport,
    total: usize,
    deadline: Option<Duration>,
) -> Result<Vec<u8>, IioError> {
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        let chunk_len = read_reply_code(t, deadline)? as usize;
        if chunk_len == 0 {
            return Err(IioError::Protocol("zero-length READBUF sub-chunk".into()));
        }
        if out.len() + chunk_len > total {
            return Err(IioError::Truncated { needed: total, got: out.len() + chunk_len });
        }
        let chunk = read_fixed_payload(t, chunk_len, deadline)?;
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

/// Parses a `VERSION` reply line of the form `"<major> <minor> <tag>"`.
pub fn parse_version_line(line: &[u8]) -> Result<super::VersionInfo, IioError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| IioError::Protocol("non-UTF8 VERSION reply".into()))?;
    let mut parts = text.trim().splitn(3, ' ');
    let major = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| IioError::Protocol(format!("malformed VERSION reply: {text:?}")))?;
    let minor = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| IioError::Protocol(format!("malformed VERSION reply: {text:?}")))?;
    let tag = parts.next().unwrap_or("").to_string();
    Ok(super::VersionInfo { major, minor, tag })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackTransport;

    #[test]
    fn encodes_read_without_channel() {
        let cmd = Command::Read {
            dev: "dev0".into(),
            chn: None,
            attr: "sampling_frequency".into(),
        };
        assert_eq!(encode_command(&cmd), b"READ dev0 sampling_frequency\n");
    }

    #[test]
    fn encodes_open_with_cyclic_flag() {
        let cmd = Command::Open {
            dev: "dev0".into(),
            mask: "1f".into(),
            samples_count: 4096,
            cyclic: true,
        };
        assert_eq!(encode_command(&cmd), b"OPEN dev0 1f 4096 1\n");
    }

    #[test]
    fn reads_reply_code_and_errno() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.write(b"5\n", None).unwrap();
        assert_eq!(read_reply_code(&mut b, None).unwrap(), 5);

        a.write(b"-22\n", None).unwrap();
        let err = read_reply_code(&mut b, None).unwrap_err();
        assert!(matches!(err, IioError::BadArgument(_)));
    }

    #[test]
    fn zero_length_payload_is_empty_not_an_error() {
        let (_a, mut b) = LoopbackTransport::pair();
        let payload = read_fixed_payload(&mut b, 0, None).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn parses_version_line() {
        let v = parse_version_line(b"0 25 abc1234").unwrap();
        assert_eq!(v.major, 0);
        assert_eq!(v.minor, 25);
        assert_eq!(v.tag, "abc1234");
    }

    #[test]
    fn reads_chunked_readbuf_payload() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.write(b"2\n", None).unwrap();
        a.write(b"ab", None).unwrap();
        a.write(b"2\n", None).unwrap();
        a.write(b"cd", None).unwrap();
        let payload = read_chunked_payload(&mut b, 4, None).unwrap();
        assert_eq!(payload, b"abcd");
    }
}
