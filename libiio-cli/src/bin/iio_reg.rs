// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! `iio_reg` (spec.md §4.4/§6): direct register access via
//! `Context::reg_read`/`reg_write`, local-backend-only (spec.md
//! "SUPPLEMENTAL FEATURES" in SPEC_FULL.md).

use clap::Parser;
use libiio_cli::{maybe_print_scan, open_context, report_error, CommonArgs};
use libiio_common::IioError;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "iio_reg", about = "Read or write a device register directly")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Device id, label, or name
    device: String,

    /// Register address, decimal or 0x-prefixed hex
    address: String,

    /// If given, write this value (decimal or 0x-prefixed hex) instead of
    /// reading the register
    value: Option<String>,
}

fn main() -> ExitCode {
    libiio_log::init();
    let cli = Cli::parse();

    match maybe_print_scan(&cli.common) {
        Ok(true) => return ExitCode::SUCCESS,
        Ok(false) => {}
        Err(e) => return report_error(e),
    }

    match open_context(&cli.common).and_then(|ctx| run(&ctx, &cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(e),
    }
}

fn run(ctx: &libiio_core::Context, cli: &Cli) -> Result<(), IioError> {
    let device = ctx
        .find_device(&cli.device)
        .ok_or_else(|| IioError::NotFound(format!("no such device: {}", cli.device)))?;
    let address = parse_u32(&cli.address)?;

    match &cli.value {
        Some(value) => {
            let value = parse_u32(value)?;
            ctx.reg_write(device, address, value)?;
            println!("wrote 0x{value:x} to register 0x{address:x}");
        }
        None => {
            let value = ctx.reg_read(device, address)?;
            println!("0x{address:x}: 0x{value:x}");
        }
    }
    Ok(())
}

fn parse_u32(s: &str) -> Result<u32, IioError> {
    let s = s.trim();
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    u32::from_str_radix(digits, radix)
        .map_err(|_| IioError::BadArgument(format!("not a valid register value: {s:?}")))
}
