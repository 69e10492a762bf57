// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The IIOD wire protocol codec (spec.md §4.2, §6): commands, responses,
//! and the error mapping shared by both dialects.
//!
//! `Protocol` is a tagged variant, never leaked past this module's public
//! API: callers build a [`Command`], hand it to [`Codec::encode`], and get
//! back raw bytes to push through a [`crate::transport::Transport`]; the
//! dialect only changes how those bytes look on the wire.

pub mod dispatch;
pub mod v0;
pub mod v1;

pub use dispatch::IiodCodec;

use libiio_common::IioError;

/// Which IIOD dialect a connection negotiated. v0 survives on a single
/// microcontroller connection; v1 pipelines multiple in-flight requests
/// over one TCP stream via `client_id`. Implementations must support v0 for
/// serial transports and should support v1 for TCP/USB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    V0,
    V1,
}

impl Protocol {
    /// Negotiated by the initial handshake: the client sends `VERSION`: v1
    /// iff the server's major version is >= 1.
    pub fn negotiate(server_major: u32) -> Protocol {
        if server_major >= 1 {
            Protocol::V1
        } else {
            Protocol::V0
        }
    }
}

/// One IIOD command, dialect-agnostic (spec.md §4.2 table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Print,
    Version,
    Timeout { ms: u32 },
    Read { dev: String, chn: Option<String>, attr: String },
    Write { dev: String, chn: Option<String>, attr: String, len: u32 },
    Open { dev: String, mask: String, samples_count: u32, cyclic: bool },
    Close { dev: String },
    ReadBuf { dev: String, count: u32 },
    WriteBuf { dev: String, count: u32 },
    GetTrig { dev: String },
    SetTrig { dev: String, trig: Option<String> },
    SetBuffersCount { dev: String, n: u32 },
    Event { dev: String },
}

/// The decoded server version reply to `VERSION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub tag: String,
}

/// Maps a remote negative-errno integer to a local error (spec.md §6, §7).
/// A short read on an expected-length payload maps to `Truncated`
/// regardless of dialect.
pub fn map_remote_code(code: i32) -> Option<IioError> {
    if code < 0 {
        Some(IioError::from_remote_errno(code))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_v1_for_major_one_and_above() {
        assert_eq!(Protocol::negotiate(0), Protocol::V0);
        assert_eq!(Protocol::negotiate(1), Protocol::V1);
        assert_eq!(Protocol::negotiate(2), Protocol::V1);
    }

    #[test]
    fn maps_negative_code_only() {
        assert!(map_remote_code(0).is_none());
        assert!(map_remote_code(5).is_none());
        assert!(matches!(map_remote_code(-22), Some(IioError::BadArgument(_))));
    }
}
