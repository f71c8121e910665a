// Copyright 2018-2021 System76 <info@system76.com>
//
// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;
use gmux_switch::{
    args::{Args, Backend},
    gmux::{self, GmuxDevice},
    gpu::{self, UserOption},
    logging,
};
use std::process;

fn main() {
    let args = Args::parse();

    if let Err(why) = logging::setup(args.level_filter()) {
        eprintln!("failed to set up logging: {}", why);
        process::exit(1);
    }

    if args.status {
        let mut device = device(args.backend);
        match device.status() {
            Ok(status) => {
                println!("Active GPU: {}", status.active);
                println!("Discrete GPU power: {}", status.discrete_power);
            }
            Err(why) => {
                log::error!("failed to read mux state: {}", why);
                process::exit(1);
            }
        }
        return;
    }

    let integrated = args.integrated.as_deref().map_or(UserOption::Unknown, UserOption::parse);
    let discrete = args.discrete.as_deref().map_or(UserOption::Unknown, UserOption::parse);

    let Some(selection) = gpu::resolve(integrated, discrete) else {
        log::info!("no GPU options given, nothing to do");
        return;
    };

    let mut device = device(args.backend);
    let status = gmux::apply(&mut device, &selection);
    if status != 0 {
        process::exit(status);
    }
}

fn device(backend: Backend) -> GmuxDevice {
    let device = match backend {
        Backend::Auto => GmuxDevice::probe(),
        Backend::Port => GmuxDevice::port(),
        Backend::Efi => GmuxDevice::efi(),
    };

    device.unwrap_or_else(|why| {
        log::error!("{}", why);
        process::exit(-1);
    })
}
