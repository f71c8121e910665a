// Copyright 2018-2021 System76 <info@system76.com>
//
// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Switches the active GPU and discrete GPU power on dual-GPU MacBook Pro
/// laptops through the gmux controller
#[derive(Parser)]
#[command(
    name = "gmux-switch",
    version,
    after_help = "See: https://wiki.archlinux.org/index.php/MacBookPro10,\
                  x#What_does_not_work_(early_August_2013,_3.10.3-1)"
)]
pub struct Args {
    /// Mode for the integrated GPU: 'use', 'poweron' or 'poweroff'
    #[arg(short, long, value_name = "MODE")]
    pub integrated: Option<String>,

    /// Mode for the discrete GPU: 'use', 'poweron' or 'poweroff'
    #[arg(short, long, value_name = "MODE")]
    pub discrete: Option<String>,

    /// Which hardware mechanism drives the gmux
    #[arg(long, value_enum, default_value = "auto")]
    pub backend: Backend,

    /// Print the current mux state instead of switching
    #[arg(long, conflicts_with_all = ["integrated", "discrete"])]
    pub status: bool,

    /// Set the verbosity of logs to 'off' [default is 'info']
    #[arg(long, short, group = "verbosity")]
    pub quiet: bool,

    /// Set the verbosity of logs to 'debug' [default is 'info']
    #[arg(long, short, group = "verbosity")]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Backend {
    /// Use the EFI variable when the firmware exposes it, the port protocol
    /// otherwise
    Auto,
    /// Legacy indexed I/O-port protocol
    Port,
    /// Firmware variable write through efivarfs
    Efi,
}

impl Args {
    pub fn level_filter(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Off
        } else if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_tokens_are_not_validated_by_the_parser() {
        // Unknown tokens must reach the resolver, which maps them to
        // Unknown; the parser only carries them.
        let args = Args::parse_from(["gmux-switch", "-i", "nonsense"]);
        assert_eq!(args.integrated.as_deref(), Some("nonsense"));
        assert_eq!(args.discrete, None);
    }

    #[test]
    fn status_conflicts_with_modes() {
        assert!(Args::try_parse_from(["gmux-switch", "--status", "-i", "use"]).is_err());
        assert!(Args::try_parse_from(["gmux-switch", "--status"]).is_ok());
    }

    #[test]
    fn verbosity_flags_are_exclusive() {
        assert!(Args::try_parse_from(["gmux-switch", "-q", "-v"]).is_err());
        assert_eq!(Args::parse_from(["gmux-switch", "-q"]).level_filter(), LevelFilter::Off);
        assert_eq!(Args::parse_from(["gmux-switch", "-v"]).level_filter(), LevelFilter::Debug);
        assert_eq!(Args::parse_from(["gmux-switch"]).level_filter(), LevelFilter::Info);
    }

    #[test]
    fn backend_selection() {
        assert_eq!(Args::parse_from(["gmux-switch"]).backend, Backend::Auto);
        assert_eq!(Args::parse_from(["gmux-switch", "--backend", "port"]).backend, Backend::Port);
        assert_eq!(Args::parse_from(["gmux-switch", "--backend", "efi"]).backend, Backend::Efi);
    }
}
