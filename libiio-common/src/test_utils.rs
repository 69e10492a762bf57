// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test helpers for the iio-rs workspace: a scratch-directory
//! builder (for fake sysfs trees) backed by `tempfile`, the same crate the
//! teacher workspace reaches for in its own integration tests.

use std::path::Path;

/// RAII guard over a uniquely-named scratch directory; removed on drop
/// even if the test panics.
pub struct TempDirGuard(tempfile::TempDir);

impl std::ops::Deref for TempDirGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.0.path()
    }
}

impl AsRef<Path> for TempDirGuard {
    fn as_ref(&self) -> &Path {
        self.0.path()
    }
}

/// Creates a scratch directory named after `prefix`, for building a fake
/// sysfs tree or XML fixture without touching the real filesystem layout.
pub fn create_scratch_dir(prefix: &str) -> std::io::Result<TempDirGuard> {
    let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
    Ok(TempDirGuard(dir))
}
