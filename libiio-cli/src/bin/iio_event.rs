// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! `iio_event` (spec.md §4.8/§6): opens a device's event queue and prints
//! every decoded event as it arrives, until cancelled.

use clap::Parser;
use libiio_cli::{maybe_print_scan, open_context, report_error, CommonArgs};
use libiio_common::IioError;
use libiio_core::{ChannelModifier, ChannelType, Context, Event, EventType};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "iio_event", about = "Print hardware events from an IIO device")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Device id, label, or name
    device: String,

    /// Print at most this many events, then exit (default: run forever)
    #[arg(short = 'n', long = "count")]
    count: Option<u64>,
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

fn run(ctx: &Context, cli: &Cli) -> Result<(), IioError> {
    let device = ctx
        .find_device(&cli.device)
        .ok_or_else(|| IioError::NotFound(format!("no such device: {}", cli.device)))?;
    let events = ctx.open_event_stream(device)?;

    let mut seen = 0u64;
    loop {
        if let Some(limit) = cli.count {
            if seen >= limit {
                return Ok(());
            }
        }
        match events.read() {
            Ok(event) => {
                println!("{}", format_event(&event));
                seen += 1;
            }
            Err(IioError::Cancelled) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn format_event(event: &Event) -> String {
    let kind = match event.event_type {
        EventType::Roc => "roc",
        EventType::Thresh => "thresh",
        EventType::Mag => "mag",
        EventType::RocMag => "roc_mag",
        EventType::Breach => "breach",
        EventType::Other(_) => "other",
    };
    let channel_type = match event.channel_type {
        ChannelType::Voltage => "voltage",
        ChannelType::Current => "current",
        ChannelType::Power => "power",
        ChannelType::Temp => "temp",
        ChannelType::Accel => "accel",
        ChannelType::AnglVel => "anglvel",
        ChannelType::Magn => "magn",
        ChannelType::Light => "light",
        ChannelType::Proximity => "proximity",
        ChannelType::Other => "other",
    };
    let modifier = match event.modifier {
        ChannelModifier::None => "",
        ChannelModifier::X => "_x",
        ChannelModifier::Y => "_y",
        ChannelModifier::Z => "_z",
        ChannelModifier::Root => "_sqrt",
    };
    format!(
        "{}: {channel_type}{modifier}[{}] {kind}{}",
        event.timestamp_ns,
        event.channel_index,
        if event.is_differential { format!("-{}", event.differential_index) } else { String::new() }
    )
}
