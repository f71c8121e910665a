// Copyright 2018-2021 System76 <info@system76.com>
//
// SPDX-License-Identifier: GPL-3.0-only

use crate::{
    errors::{PowerError, SwitchError},
    gmux::Gmux,
    gpu::{GpuKind, PowerState},
};
use std::{
    fs,
    io::{self, Write},
    os::fd::AsRawFd,
    path::PathBuf,
};

/// The firmware variable holding the boot GPU preference, as exposed by
/// efivarfs. This path is a platform contract, not configurable.
pub const GPU_POWER_PREFS: &str =
    "/sys/firmware/efi/efivars/gpu-power-prefs-fa4ce28d-b62f-4c99-9cc3-6815686e30f9";

// efivarfs attribute header: non-volatile, boot-service and runtime access.
const EFI_ATTRIBUTES: [u8; 4] = [0x07, 0x00, 0x00, 0x00];

// Offset of the GPU selector within the 8-byte payload.
const SELECTOR_OFFSET: usize = 4;

const FS_IOC_GETFLAGS: libc::c_ulong = 0x8008_6601;
const FS_IOC_SETFLAGS: libc::c_ulong = 0x4008_6602;
const FS_IMMUTABLE_FL: libc::c_long = 0x0000_0010;

/// The newer mechanism: gmux is driven indirectly through an 8-byte write to
/// the `gpu-power-prefs` firmware variable, which efivarfs marks immutable
/// between writes.
pub struct EfiGmux {
    path: PathBuf,
}

impl EfiGmux {
    pub fn new() -> Self { EfiGmux { path: PathBuf::from(GPU_POWER_PREFS) } }

    /// Reads back the stored boot preference from the variable's selector
    /// byte.
    pub fn selected_gpu(&self) -> io::Result<GpuKind> {
        let payload = fs::read(&self.path)?;
        Ok(match payload.get(SELECTOR_OFFSET) {
            Some(1) => GpuKind::Integrated,
            Some(0) => GpuKind::Discrete,
            _ => GpuKind::Unknown,
        })
    }

    /// Clears the immutable attribute bit so the variable can be written.
    ///
    /// The bit is deliberately not restored after the write: the variable
    /// stays mutable once a switch has been performed, and restoring it
    /// would change firmware-visible state.
    fn clear_immutable(&self) -> Result<(), SwitchError> {
        let file = fs::File::open(&self.path)
            .map_err(|why| SwitchError::GetFlags(self.path.clone(), why))?;

        let mut flags: libc::c_long = 0;
        if unsafe { libc::ioctl(file.as_raw_fd(), FS_IOC_GETFLAGS, &mut flags) } < 0 {
            return Err(SwitchError::GetFlags(self.path.clone(), io::Error::last_os_error()));
        }

        log::debug!("clearing immutable bit on {:?} (flags 0x{:x})", self.path, flags);
        flags &= !FS_IMMUTABLE_FL;

        if unsafe { libc::ioctl(file.as_raw_fd(), FS_IOC_SETFLAGS, &flags) } < 0 {
            return Err(SwitchError::SetFlags(self.path.clone(), io::Error::last_os_error()));
        }

        Ok(())
    }
}

impl Default for EfiGmux {
    fn default() -> Self { Self::new() }
}

impl Gmux for EfiGmux {
    fn switch_active(&mut self, gpu: GpuKind) -> Result<(), SwitchError> {
        let metadata = fs::symlink_metadata(&self.path)
            .map_err(|why| SwitchError::Stat(self.path.clone(), why))?;

        // Firmware-variable pseudo-files present differently across kernel
        // versions, so symlinks and directories are admitted as well.
        let file_type = metadata.file_type();
        if !(file_type.is_file() || file_type.is_symlink() || file_type.is_dir()) {
            return Err(SwitchError::UnsupportedFileType(self.path.clone()));
        }

        self.clear_immutable()?;

        let selector = match gpu {
            GpuKind::Integrated => 1,
            GpuKind::Discrete => 0,
            GpuKind::Unknown => return Err(SwitchError::NoGpuSelected),
        };

        let mut payload = [0u8; 8];
        payload[..SELECTOR_OFFSET].copy_from_slice(&EFI_ATTRIBUTES);
        payload[SELECTOR_OFFSET] = selector;

        log::debug!("writing {:02x?} to {:?}", payload, self.path);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|why| SwitchError::Open(self.path.clone(), why))?;

        // No partial-write recovery: an interrupt mid-write leaves the
        // variable in an undefined state. That risk is inherent to writing
        // firmware NVRAM directly and is accepted here.
        file.write_all(&payload)
            .and_then(|()| file.flush())
            .map_err(|why| SwitchError::Write(self.path.clone(), why))
    }

    /// Discrete power is not addressable through the variable; it follows
    /// the selected GPU at the next boot.
    fn set_power(&mut self, _gpu: GpuKind, _state: PowerState) -> Result<(), PowerError> {
        Ok(())
    }
}
