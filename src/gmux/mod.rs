// Copyright 2018-2021 System76 <info@system76.com>
//
// SPDX-License-Identifier: GPL-3.0-only

pub mod efi;
pub mod port;

use crate::{
    errors::{combined_status, PowerError, PrivilegeError, SwitchError},
    gpu::{GpuKind, GpuSelection, PowerState},
};
use efi::EfiGmux;
use port::{IoPorts, PortGmux};
use std::{io, path::Path};

/// The logical contract both hardware mechanisms implement.
pub trait Gmux {
    fn switch_active(&mut self, gpu: GpuKind) -> Result<(), SwitchError>;
    fn set_power(&mut self, gpu: GpuKind, state: PowerState) -> Result<(), PowerError>;
}

/// Current mux state, as far as the selected mechanism can observe it.
pub struct MuxStatus {
    pub active:         GpuKind,
    pub discrete_power: PowerState,
}

enum Driver {
    Port(PortGmux<IoPorts>),
    Efi(EfiGmux),
}

/// A gmux reached through whichever mechanism the machine supports.
/// Construction acquires the privilege the mechanism needs; no hardware is
/// touched before that succeeds.
pub struct GmuxDevice {
    driver: Driver,
}

impl GmuxDevice {
    /// Picks the EFI mechanism when the firmware variable is present, and
    /// falls back to the port protocol otherwise.
    pub fn probe() -> Result<Self, PrivilegeError> {
        if Path::new(efi::GPU_POWER_PREFS).exists() {
            log::debug!("found {}, using the EFI mechanism", efi::GPU_POWER_PREFS);
            Self::efi()
        } else {
            log::debug!("no firmware variable, using the port protocol");
            Self::port()
        }
    }

    pub fn port() -> Result<Self, PrivilegeError> {
        let ports = unsafe { IoPorts::request() }.map_err(PrivilegeError::Iopl)?;
        Ok(GmuxDevice { driver: Driver::Port(PortGmux::new(ports)) })
    }

    pub fn efi() -> Result<Self, PrivilegeError> {
        if unsafe { libc::geteuid() } != 0 {
            return Err(PrivilegeError::NotRoot);
        }
        Ok(GmuxDevice { driver: Driver::Efi(EfiGmux::new()) })
    }

    pub fn status(&mut self) -> io::Result<MuxStatus> {
        match &mut self.driver {
            Driver::Port(gmux) => Ok(MuxStatus {
                active:         gmux.active_gpu(),
                discrete_power: gmux.discrete_power(),
            }),
            // The variable stores only the boot preference; discrete power
            // is not observable through it.
            Driver::Efi(gmux) => Ok(MuxStatus {
                active:         gmux.selected_gpu()?,
                discrete_power: PowerState::Unknown,
            }),
        }
    }
}

impl Gmux for GmuxDevice {
    fn switch_active(&mut self, gpu: GpuKind) -> Result<(), SwitchError> {
        match &mut self.driver {
            Driver::Port(gmux) => gmux.switch_active(gpu),
            Driver::Efi(gmux) => gmux.switch_active(gpu),
        }
    }

    fn set_power(&mut self, gpu: GpuKind, state: PowerState) -> Result<(), PowerError> {
        match &mut self.driver {
            Driver::Port(gmux) => gmux.set_power(gpu, state),
            Driver::Efi(gmux) => gmux.set_power(gpu, state),
        }
    }
}

/// Runs the switch and both power calls against the device. The three
/// operations are independent: a failure is logged and recorded, never
/// short-circuited, and the combined status packs all three codes.
pub fn apply<G: Gmux>(gmux: &mut G, selection: &GpuSelection) -> i32 {
    log::info!("Switching to GPU: {}", selection.active);
    let switch = match gmux.switch_active(selection.active) {
        Ok(()) => 0,
        Err(why) => {
            log::error!("failed to switch active GPU: {}", why);
            why.code()
        }
    };

    log::info!("new integrated GPU state: {}", selection.integrated);
    let integrated = match gmux.set_power(GpuKind::Integrated, selection.integrated) {
        Ok(()) => 0,
        Err(why) => {
            log::error!("failed to set integrated GPU state: {}", why);
            why.code()
        }
    };

    log::info!("new discrete GPU state: {}", selection.discrete);
    let discrete = match gmux.set_power(GpuKind::Discrete, selection.discrete) {
        Ok(()) => 0,
        Err(why) => {
            log::error!("failed to set discrete GPU state: {}", why);
            why.code()
        }
    };

    combined_status(switch, integrated, discrete)
}
