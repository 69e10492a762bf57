// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! `iio_rwdev` (spec.md §6): streams buffered samples in (`-w`) or out of a
//! device through the buffer/block/stream engine of spec.md §4.7, writing
//! raw sample bytes to stdout or reading them from stdin.

use clap::Parser;
use libiio_cli::{maybe_print_scan, open_context, report_error, CommonArgs};
use libiio_common::IioError;
use libiio_core::{ChannelsMask, Context, DeviceRef, Stream};
use std::io::{Read, Write};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "iio_rwdev", about = "Stream samples in or out of an IIO device buffer")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Device id, label, or name
    device: String,

    /// Write samples read from stdin to the device instead of streaming
    /// samples out to stdout
    #[arg(short = 'w', long = "write")]
    write: bool,

    /// Comma-separated list of channel ids/names to enable; default is
    /// every scan-element channel
    #[arg(short = 'c', long = "channels")]
    channels: Option<String>,

    /// Samples per block
    #[arg(short = 'b', long = "buffer-size", default_value_t = 4096)]
    buffer_size: usize,

    /// Number of blocks to cycle through the stream
    #[arg(short = 'n', long = "blocks", default_value_t = 4)]
    blocks: usize,

    /// Total number of samples to transfer; 0 means "until the input/output
    /// is exhausted" (write: stdin EOF; read: never, run until killed)
    #[arg(short = 's', long = "samples", default_value_t = 0)]
    samples: u64,

    /// Replay a single written block continuously until cancelled (spec.md
    /// §4.7 cyclic mode); write mode only
    #[arg(short = 'C', long = "cyclic")]
    cyclic: bool,

    /// Set this trigger on the device before opening the buffer
    #[arg(short = 'T', long = "trigger")]
    trigger: Option<String>,
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

    if let Some(trigger_name) = &cli.trigger {
        let trigger = ctx
            .find_device(trigger_name)
            .ok_or_else(|| IioError::NotFound(format!("no such trigger: {trigger_name}")))?;
        ctx.set_trigger(device, Some(trigger))?;
    }

    let mask = build_mask(device, cli.channels.as_deref())?;
    let buffer = ctx.open_buffer(device, &mask)?;
    let layout = libiio_core::compute_sample_layout(&device.data().channels, buffer.resolved_mask());
    if layout.sample_size == 0 {
        return Err(IioError::BadArgument("no channels enabled".into()));
    }

    buffer.enable()?;
    let bytes_per_block = layout.sample_size * cli.buffer_size;
    let total_samples = if cli.samples == 0 { None } else { Some(cli.samples) };

    if cli.write {
        write_loop(&buffer, bytes_per_block, cli.cyclic, total_samples, layout.sample_size)
    } else {
        read_loop(&buffer, cli.blocks, bytes_per_block, total_samples, layout.sample_size)
    }
}

fn build_mask(device: DeviceRef<'_>, channels: Option<&str>) -> Result<ChannelsMask, IioError> {
    let count = device.data().channels.len();
    match channels {
        None => Ok(ChannelsMask::all_enabled(count)),
        Some(list) => {
            let mut mask = ChannelsMask::new(count);
            for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let channel = device
                    .channel(name, false)
                    .or_else(|| device.channel(name, true))
                    .ok_or_else(|| IioError::NotFound(format!("no such channel: {name}")))?;
                mask.set(channel.index);
            }
            Ok(mask)
        }
    }
}

fn read_loop(
    buffer: &std::sync::Arc<libiio_core::Buffer>,
    blocks: usize,
    bytes_per_block: usize,
    total_samples: Option<u64>,
    sample_size: usize,
) -> Result<(), IioError> {
    let mut stream = Stream::new(buffer.clone(), blocks, bytes_per_block)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut samples_done = 0u64;
    loop {
        if let Some(total) = total_samples {
            if samples_done >= total {
                return Ok(());
            }
        }
        let block = stream.next()?;
        let data = block.as_slice();
        let take = match total_samples {
            Some(total) => {
                let remaining = ((total - samples_done) as usize) * sample_size;
                data.len().min(remaining)
            }
            None => data.len(),
        };
        out.write_all(&data[..take]).map_err(IioError::Io)?;
        samples_done += (take / sample_size) as u64;
    }
}

fn write_loop(
    buffer: &std::sync::Arc<libiio_core::Buffer>,
    bytes_per_block: usize,
    cyclic: bool,
    total_samples: Option<u64>,
    sample_size: usize,
) -> Result<(), IioError> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut block = buffer.create_block(bytes_per_block);
    let mut samples_done = 0u64;
    loop {
        if let Some(total) = total_samples {
            if samples_done >= total {
                return Ok(());
            }
        }
        let n = read_full(&mut input, block.as_mut_slice()).map_err(IioError::Io)?;
        if n == 0 {
            return Ok(());
        }
        block.enqueue(n, cyclic)?;
        if cyclic {
            return Ok(());
        }
        block.dequeue(false)?;
        samples_done += (n / sample_size) as u64;
    }
}

fn read_full(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
