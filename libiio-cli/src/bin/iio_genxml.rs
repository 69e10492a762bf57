// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! `iio_genxml` (spec.md §6): dumps a context's device graph as the XML
//! document the `xml:` backend can parse back in (spec.md §4.4).

use clap::Parser;
use libiio_cli::{maybe_print_scan, open_context, report_error, CommonArgs};
use libiio_common::IioError;
use std::fs;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "iio_genxml", about = "Dump a context's device graph as XML")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Write the XML document to this path instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<String>,
}

fn main() -> ExitCode {
    libiio_log::init();
    let cli = Cli::parse();

    match maybe_print_scan(&cli.common) {
        Ok(true) => return ExitCode::SUCCESS,
        Ok(false) => {}
        Err(e) => return report_error(e),
    }

    let result = open_context(&cli.common).and_then(|ctx| ctx.xml()).and_then(|xml| {
        match &cli.output {
            Some(path) => fs::write(path, xml).map_err(IioError::Io),
            None => {
                println!("{xml}");
                Ok(())
            }
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(e),
    }
}
