// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! `iio_info` (spec.md §6): dumps everything a context knows about itself —
//! description, every device, every device/debug/buffer attribute, and
//! every channel with its own attributes.

use clap::Parser;
use libiio_cli::{maybe_print_scan, open_context, report_error, CommonArgs};
use libiio_core::{AttrCategory, ChannelDirection, Context, DeviceKind};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "iio_info", about = "List IIO contexts, devices, and channels")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> ExitCode {
    libiio_log::init();
    let cli = Cli::parse();

    match maybe_print_scan(&cli.common) {
        Ok(true) => return ExitCode::SUCCESS,
        Ok(false) => {}
        Err(e) => return report_error(e),
    }

    match open_context(&cli.common) {
        Ok(ctx) => {
            print_context(&ctx);
            ExitCode::SUCCESS
        }
        Err(e) => report_error(e),
    }
}

fn print_context(ctx: &Context) {
    println!("IIO context description: {}", ctx.description());
    println!("IIO context has {} attributes:", ctx.attrs().len());
    for (key, value) in ctx.attrs() {
        println!("\t{key}: {value}");
    }

    println!("IIO context has {} devices:", ctx.devices().len());
    for (index, device) in ctx.devices().iter().enumerate() {
        let dev = ctx.device(index);
        let kind = match device.kind {
            DeviceKind::Device => "device",
            DeviceKind::Trigger => "trigger",
            DeviceKind::Hwmon => "hwmon device",
        };
        print!("\t{} ({kind}", device.id);
        if let Some(name) = &device.name {
            print!(", {name}");
        }
        if let Some(label) = &device.label {
            print!(", label: {label}");
        }
        println!(")");

        if let Ok(Some(trigger)) = ctx.get_trigger(dev) {
            println!("\t\ttrigger: {trigger}");
        }

        println!("\t\t{} channels found:", device.channels.len());
        for channel in &device.channels {
            let dir = match channel.direction {
                ChannelDirection::Input => "input",
                ChannelDirection::Output => "output",
            };
            print!("\t\t\t{} ({dir}", channel.id);
            if let Some(name) = &channel.name {
                print!(", {name}");
            }
            if let Some(index) = channel.index {
                print!(", index: {index}");
            }
            println!(")");
            for attr in &channel.attrs {
                println!("\t\t\t\t{}", attr.name);
            }
        }

        print_attr_list("device", &device.device_attrs);
        print_attr_list("debug", &device.debug_attrs);
        print_attr_list("buffer", &device.buffer_attrs);
    }
}

fn print_attr_list(kind: &str, attrs: &[libiio_core::AttributeData]) {
    if attrs.is_empty() {
        return;
    }
    println!("\t\t{} {kind} attributes found:", attrs.len());
    for attr in attrs {
        debug_assert!(matches!(
            attr.category,
            AttrCategory::Device | AttrCategory::Debug | AttrCategory::Buffer
        ));
        println!("\t\t\t{}", attr.name);
    }
}
