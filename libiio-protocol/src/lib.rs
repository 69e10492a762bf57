// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The IIOD wire protocol client: transport abstraction with cancellation
//! (spec.md §4.1) plus the v0/v1 codec (spec.md §4.2).

pub mod codec;
pub mod transport;

pub use codec::{Command, IiodCodec, Protocol, VersionInfo};
pub use transport::{CancelToken, Transport};
