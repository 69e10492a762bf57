// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared error taxonomy, C-locale numeric parsing, and test helpers used
//! across the iio-rs workspace.

pub mod error;
pub mod locale;
pub mod test_utils;
pub mod wildcard;

pub use error::{IioError, PrintableError, Result};
