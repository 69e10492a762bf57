// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! `iio_attr` (spec.md §6): reads or writes device/channel/debug/buffer
//! attributes, with wildcard matching (spec.md §4.3) against the attribute
//! name when no exact attribute is named.

use clap::Parser;
use libiio_cli::{maybe_print_scan, open_context, report_error, CommonArgs};
use libiio_common::wildcard;
use libiio_core::{AttrRef, Context, DeviceRef};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "iio_attr", about = "Read or write IIO attributes")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Restrict the match to a channel instead of the device itself
    #[arg(short = 'c', long = "channel")]
    channel: Option<String>,

    /// The channel named by -c is an output channel (default: input)
    #[arg(short = 'o', long = "output")]
    output: bool,

    /// Match against debug attributes instead of device/channel attributes
    #[arg(short = 'D', long = "debug")]
    debug: bool,

    /// Match against buffer attributes instead of device/channel attributes
    #[arg(short = 'B', long = "buffer")]
    buffer: bool,

    /// Device id, label, or name
    device: String,

    /// Attribute name, or a `*`-wildcard pattern (spec.md §4.3)
    attribute: String,

    /// If given, write this value to every attribute the pattern matches
    /// instead of reading it
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

fn run(ctx: &Context, cli: &Cli) -> Result<(), libiio_common::IioError> {
    let device = ctx.find_device(&cli.device).ok_or_else(|| {
        libiio_common::IioError::NotFound(format!("no such device: {}", cli.device))
    })?;

    let attrs: Vec<AttrRef<'_>> = matching_attrs(device, cli)?;
    if attrs.is_empty() {
        return Err(libiio_common::IioError::NotFound(format!(
            "no attribute matching {:?}",
            cli.attribute
        )));
    }

    for attr in attrs {
        match &cli.value {
            Some(value) => {
                attr.write(value)?;
                println!("{}: wrote {value:?}", attr.name());
            }
            None => {
                let value = attr.read()?;
                println!("{}: {value}", attr.name());
            }
        }
    }
    Ok(())
}

fn matching_attrs<'ctx>(
    device: DeviceRef<'ctx>,
    cli: &Cli,
) -> Result<Vec<AttrRef<'ctx>>, libiio_common::IioError> {
    let names: Vec<String> = if let Some(channel_name) = &cli.channel {
        let channel = device.channel(channel_name, cli.output).ok_or_else(|| {
            libiio_common::IioError::NotFound(format!("no such channel: {channel_name}"))
        })?;
        channel.data().attrs.iter().map(|a| a.name.clone()).collect()
    } else if cli.debug {
        device.data().debug_attrs.iter().map(|a| a.name.clone()).collect()
    } else if cli.buffer {
        device.data().buffer_attrs.iter().map(|a| a.name.clone()).collect()
    } else {
        device.data().device_attrs.iter().map(|a| a.name.clone()).collect()
    };

    let mut out = Vec::new();
    for name in names {
        if !wildcard::matches(&cli.attribute, &name) {
            continue;
        }
        let attr = if let Some(channel_name) = &cli.channel {
            device.channel(channel_name, cli.output).and_then(|c| c.attr(&name))
        } else if cli.debug {
            device.debug_attr(&name)
        } else if cli.buffer {
            device.buffer_attr(&name)
        } else {
            device.attr(&name)
        };
        if let Some(attr) = attr {
            out.push(attr);
        }
    }
    Ok(out)
}
