// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared plumbing for the `iio_info`/`iio_attr`/`iio_rwdev`/`iio_reg`/
//! `iio_event`/`iio_genxml` binaries (spec.md §6): the common flag set, the
//! registry every binary opens contexts against, and the scan helper behind
//! `-a`/`-S`.

use clap::Args;
use libiio_backend_local::{LocalBackend, LocalScanBackend};
use libiio_backend_remote::{network_backend, serial_backend, usb_backend, NetworkScanBackend, UsbScanBackend};
use libiio_common::IioError;
use libiio_core::{BackendRegistry, Context, ContextParams, ScanAggregator};
use std::process::ExitCode;
use std::sync::Arc;

/// Flags shared by every tool (spec.md §6).
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Use the context at the given URI instead of scanning or IIOD_REMOTE
    #[arg(short = 'u', long = "uri")]
    pub uri: Option<String>,

    /// Scan for contexts and open the first match; an optional filter
    /// narrows which backends are scanned (e.g. "local", "usb=0456:*", "ip")
    #[arg(short = 'a', long = "auto", num_args = 0..=1, default_missing_value = "")]
    pub auto: Option<String>,

    /// Scan for contexts matching an optional filter, print them, and exit
    #[arg(short = 'S', long = "scan", num_args = 0..=1, default_missing_value = "")]
    pub scan: Option<String>,

    /// I/O timeout in milliseconds (0 means the backend's default)
    #[arg(short = 'T', long = "timeout", default_value_t = 0)]
    pub timeout: u32,
}

/// Builds the registry every CLI binary resolves URIs against: the local
/// backend plus every remote-transport connector (spec.md §4.4/§4.6-§4.7).
pub fn build_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(LocalBackend::new()));
    registry.register(Arc::new(network_backend()));
    registry.register(Arc::new(usb_backend()));
    registry.register(Arc::new(serial_backend()));
    registry
}

/// Builds the discovery aggregator behind `-a`/`-S` (spec.md §4.9).
pub fn build_scan_aggregator() -> ScanAggregator {
    let mut aggregator = ScanAggregator::new();
    aggregator.register(Arc::new(LocalScanBackend::new()));
    aggregator.register(Arc::new(NetworkScanBackend));
    aggregator.register(Arc::new(UsbScanBackend));
    aggregator
}

/// If `-S` was given, prints the scan results and returns `true` so the
/// caller exits instead of going on to open a context.
pub fn maybe_print_scan(args: &CommonArgs) -> Result<bool, IioError> {
    let Some(filter) = &args.scan else { return Ok(false) };
    let found = build_scan_aggregator().scan(filter)?;
    if found.is_empty() {
        println!("No IIO context found.");
    } else {
        for (uri, description) in &found {
            println!("\t{uri} [{description}]");
        }
    }
    Ok(true)
}

/// Resolves `args` into an open [`Context`]: explicit `-u`, then `-a`
/// (scan and take the first match), then `IIOD_REMOTE` (spec.md §6).
pub fn open_context(args: &CommonArgs) -> Result<Context, IioError> {
    let registry = build_registry();

    if let Some(filter) = &args.auto {
        let found = build_scan_aggregator().scan(filter)?;
        let (uri, _) = found
            .first()
            .ok_or_else(|| IioError::NotFound("no IIO context found".into()))?;
        let params = ContextParams::new(uri.clone()).with_timeout_ms(args.timeout);
        return Context::open(&registry, &params);
    }

    let params = ContextParams::from_env_or(args.uri.clone())
        .ok_or_else(|| {
            IioError::BadArgument("no context given: pass -u <uri>, -a, or set IIOD_REMOTE".into())
        })?
        .with_timeout_ms(args.timeout);
    Context::open(&registry, &params)
}

/// Prints `err` to stderr the way every tool reports failure (spec.md §6:
/// diagnostics to stderr, non-zero exit).
pub fn report_error(err: IioError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::FAILURE
}
