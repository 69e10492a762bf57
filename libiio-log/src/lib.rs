// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Initializes the `tracing` subscriber used by every other crate in the
//! workspace. Library crates only ever call into `tracing`'s macros
//! directly (`trace!`, `debug!`, `warn!`); only applications (the CLI
//! binaries, tests) call [`init`].

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a global `tracing` subscriber reading its filter from
/// `IIO_LOG`, falling back to `warn` if unset or invalid. Safe to call more
/// than once; only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("IIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
