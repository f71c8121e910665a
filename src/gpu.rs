// Copyright 2018-2021 System76 <info@system76.com>
//
// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

/// Which physical GPU an operation targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GpuKind {
    Unknown,
    Integrated,
    Discrete,
}

impl fmt::Display for GpuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GpuKind::Unknown => "UNKNOWN",
            GpuKind::Integrated => "INTEGRATED",
            GpuKind::Discrete => "DISCRETE",
        })
    }
}

/// Desired or observed power state of a GPU.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerState {
    Unknown,
    On,
    Off,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::Unknown => "UNKNOWN",
            PowerState::On => "ON",
            PowerState::Off => "OFF",
        })
    }
}

/// Raw parsed intent for one GPU slot.
///
/// `DontUse` is reserved: no token parses to it, but the variant is part of
/// the option vocabulary and keeps its display form.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserOption {
    Unknown,
    Use,
    DontUse,
    PowerOff,
    PowerOn,
}

impl fmt::Display for UserOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UserOption::Unknown => "UNKNOWN",
            UserOption::Use => "USE",
            UserOption::DontUse => "DONT USE",
            UserOption::PowerOff => "POWEROFF",
            UserOption::PowerOn => "POWERON",
        })
    }
}

const TOKEN_CAPACITY: usize = 64;

impl UserOption {
    /// Parses a mode token case-insensitively through a fixed 64-byte buffer.
    ///
    /// Overlong input is silently truncated to the buffer, so a long token
    /// that merely starts with a valid word still resolves to `Unknown`.
    /// Comparison is on bytes; truncation mid-way through a multi-byte
    /// character cannot match any recognized token.
    pub fn parse(token: &str) -> Self {
        let mut buffer = [0u8; TOKEN_CAPACITY];
        let bytes = token.as_bytes();
        let len = bytes.len().min(TOKEN_CAPACITY - 1);
        buffer[..len].copy_from_slice(&bytes[..len]);

        let token = &mut buffer[..len];
        token.make_ascii_lowercase();

        match &*token {
            b"use" => UserOption::Use,
            b"poweroff" => UserOption::PowerOff,
            b"poweron" => UserOption::PowerOn,
            _ => UserOption::Unknown,
        }
    }
}

/// The resolved outcome of the two option slots: which GPU becomes active
/// and the desired power state of each GPU.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GpuSelection {
    pub active:     GpuKind,
    pub integrated: PowerState,
    pub discrete:   PowerState,
}

/// Resolves the per-slot options into a `GpuSelection`.
///
/// Returns `None` when both slots are unspecified: that is a deliberate
/// no-op, and no hardware operation may be performed.
pub fn resolve(mut integrated: UserOption, mut discrete: UserOption) -> Option<GpuSelection> {
    if integrated == UserOption::Unknown && discrete == UserOption::Unknown {
        return None;
    }

    // If only one gpu was specified, we default to letting the other one
    // stay powered on.
    if integrated == UserOption::Use && discrete == UserOption::Unknown {
        discrete = UserOption::PowerOn;
    } else if discrete == UserOption::Use && integrated == UserOption::Unknown {
        integrated = UserOption::PowerOn;
    }

    log::info!("Applying config: integrated: {}, discrete: {}", integrated, discrete);

    let mut active = GpuKind::Unknown;
    if integrated == UserOption::Use {
        active = GpuKind::Integrated;
    }
    if discrete == UserOption::Use {
        active = GpuKind::Discrete;
    }

    Some(GpuSelection {
        active,
        integrated: power_state(integrated),
        discrete: power_state(discrete),
    })
}

fn power_state(option: UserOption) -> PowerState {
    if option == UserOption::PowerOff {
        PowerState::Off
    } else {
        PowerState::On
    }
}
