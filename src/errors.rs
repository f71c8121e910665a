// Copyright 2018-2021 System76 <info@system76.com>
//
// SPDX-License-Identifier: GPL-3.0-only

use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PrivilegeError {
    #[error("failed to acquire I/O port access: {}", _0)]
    Iopl(io::Error),
    #[error("must be run as root")]
    NotRoot,
}

#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    #[error("failed to stat {:?}: {}", _0, _1)]
    Stat(PathBuf, io::Error),
    #[error("{:?} is not a regular file, symlink, or directory", _0)]
    UnsupportedFileType(PathBuf),
    #[error("failed to read attribute flags on {:?}: {}", _0, _1)]
    GetFlags(PathBuf, io::Error),
    #[error("failed to write attribute flags on {:?}: {}", _0, _1)]
    SetFlags(PathBuf, io::Error),
    #[error("no GPU selected to switch to")]
    NoGpuSelected,
    #[error("failed to open {:?} for writing: {}", _0, _1)]
    Open(PathBuf, io::Error),
    #[error("failed to write GPU selection to {:?}: {}", _0, _1)]
    Write(PathBuf, io::Error),
}

impl SwitchError {
    /// Status code of this failure in the combined process result.
    pub fn code(&self) -> i32 {
        match self {
            SwitchError::Stat(..) => 1,
            SwitchError::UnsupportedFileType(..) => 2,
            SwitchError::GetFlags(..) => 3,
            SwitchError::SetFlags(..) => 4,
            SwitchError::NoGpuSelected => 5,
            SwitchError::Open(..) => 6,
            SwitchError::Write(..) => 7,
        }
    }
}

/// Power sequencing has no failure mode on either mechanism: port register
/// writes report no per-write error once I/O access is held, and the EFI
/// mechanism does not address power at all. The enum is uninhabited so the
/// contract still has an error slot for the aggregator.
#[derive(Debug, thiserror::Error)]
pub enum PowerError {}

impl PowerError {
    pub fn code(&self) -> i32 { match *self {} }
}

/// Packs the three sub-operation status codes into disjoint bit-fields so a
/// caller can tell which stage failed: low byte is the switch, next byte the
/// integrated power call, next byte the discrete power call.
pub fn combined_status(switch: i32, integrated: i32, discrete: i32) -> i32 {
    (switch & 0xff) | (integrated & 0xff) << 8 | (discrete & 0xff) << 16
}
