// Copyright 2018-2021 System76 <info@system76.com>
//
// SPDX-License-Identifier: GPL-3.0-only

#![deny(clippy::all)]
#![deny(unused_crate_dependencies)]
#![deny(unused_imports)]
#![allow(clippy::match_like_matches_macro)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod args;
pub mod errors;
pub mod gmux;
pub mod gpu;
pub mod logging;
