// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::io;

/// The error taxonomy shared by every crate in the workspace.
///
/// Each variant maps to one of the kinds named in the wire-protocol error
/// encoding (remote negative-errno replies) and to the local failure modes
/// of the buffer engine and transport layer. `raw_errno`, when present,
/// preserves the numeric code for callers bridging to the legacy errno-based
/// C interface.
#[derive(Debug, thiserror::Error)]
pub enum IioError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("bad state: {0}")]
    BadState(String),

    #[error("would block")]
    WouldBlock,

    #[error("operation timed out")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("response truncated, needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl IioError {
    /// The auxiliary numeric code preserved for compatibility with the
    /// legacy errno-based interface. Mirrors the negative-errno values the
    /// IIOD wire protocol sends on the line (see spec.md §6).
    pub fn raw_errno(&self) -> Option<i32> {
        match self {
            IioError::NotFound(_) => Some(libc_enoent()),
            IioError::NotSupported(_) => Some(libc_enosys()),
            IioError::BadArgument(_) => Some(libc_einval()),
            IioError::BadState(_) => Some(libc_ebadf()),
            IioError::WouldBlock => Some(libc_eagain()),
            IioError::Timeout => Some(libc_etimedout()),
            IioError::Cancelled => Some(libc_ecanceled()),
            IioError::PeerClosed => Some(libc_epipe()),
            IioError::Truncated { .. } => Some(libc_etoobig()),
            IioError::Io(e) => e.raw_os_error(),
            IioError::Protocol(_) => None,
        }
    }

    /// Maps a remote negative-errno reply (§6, §7) to a local error kind.
    /// Unknown negative codes still round-trip as `Io`, preserving the
    /// numeric value for diagnostics.
    pub fn from_remote_errno(code: i32) -> IioError {
        debug_assert!(code < 0, "from_remote_errno expects a negative code");
        match -code {
            x if x == libc_enoent() => IioError::NotFound("remote attribute".into()),
            x if x == libc_enosys() || x == libc_eopnotsupp() => {
                IioError::NotSupported("remote operation".into())
            }
            x if x == libc_einval() => IioError::BadArgument("remote argument".into()),
            x if x == libc_ebadf() => IioError::BadState("remote state".into()),
            x if x == libc_eagain() => IioError::WouldBlock,
            x if x == libc_etimedout() => IioError::Timeout,
            x if x == libc_ecanceled() => IioError::Cancelled,
            x if x == libc_epipe() => IioError::PeerClosed,
            _ => IioError::Io(io::Error::from_raw_os_error(-code)),
        }
    }
}

/// A trait for errors that can be rendered to a printable string without
/// allocation at the FFI boundary. Mirrors the `FfiSafeErrorMessage`
/// convention used for cross-language error reporting.
pub trait PrintableError: fmt::Display {
    /// Formats the error together with its auxiliary numeric code, the way
    /// the legacy `iio_strerror` helper does.
    fn to_printable(&self, errno: Option<i32>) -> String {
        match errno {
            Some(code) => format!("{self} (errno {code})"),
            None => self.to_string(),
        }
    }
}

impl PrintableError for IioError {}

pub type Result<T> = std::result::Result<T, IioError>;

// The library never links against libc's errno constants directly so that
// `libiio-common` stays usable on non-Unix hosts (the network/XML backends
// run there); these mirror their well-known numeric values instead.
const fn libc_enoent() -> i32 {
    2
}
const fn libc_eagain() -> i32 {
    11
}
const fn libc_einval() -> i32 {
    22
}
const fn libc_epipe() -> i32 {
    32
}
const fn libc_ebadf() -> i32 {
    9
}
const fn libc_etimedout() -> i32 {
    110
}
const fn libc_ecanceled() -> i32 {
    125
}
const fn libc_enosys() -> i32 {
    38
}
const fn libc_eopnotsupp() -> i32 {
    95
}
const fn libc_etoobig() -> i32 {
    7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errno_roundtrip_maps_known_codes() {
        assert!(matches!(
            IioError::from_remote_errno(-22),
            IioError::BadArgument(_)
        ));
        assert!(matches!(
            IioError::from_remote_errno(-2),
            IioError::NotFound(_)
        ));
        assert!(matches!(
            IioError::from_remote_errno(-38),
            IioError::NotSupported(_)
        ));
    }

    #[test]
    fn unknown_remote_errno_preserves_code() {
        let err = IioError::from_remote_errno(-5);
        match err {
            IioError::Io(e) => assert_eq!(e.raw_os_error(), Some(5)),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn printable_includes_errno_when_present() {
        let err = IioError::BadArgument("bad mask".into());
        let printed = err.to_printable(err.raw_errno());
        assert!(printed.contains("bad mask"));
        assert!(printed.contains("errno"));
    }
}
