// Copyright 2018-2021 System76 <info@system76.com>
//
// SPDX-License-Identifier: GPL-3.0-only

use crate::{
    errors::{PowerError, SwitchError},
    gmux::Gmux,
    gpu::{GpuKind, PowerState},
};
use std::{arch::asm, io};

// gmux registers, relative to the base I/O port.
pub const GMUX_PORT_SWITCH_DISPLAY: u16 = 0x10;
pub const GMUX_PORT_SWITCH_DDC: u16 = 0x28;
pub const GMUX_PORT_SWITCH_EXTERNAL: u16 = 0x40;
pub const GMUX_PORT_DISCRETE_POWER: u16 = 0x50;
pub const GMUX_PORT_VALUE: u16 = 0xc2;
pub const GMUX_PORT_READ: u16 = 0xd0;
pub const GMUX_PORT_WRITE: u16 = 0xd4;

pub const GMUX_IOSTART: u16 = 0x700;

/// Raw access to the port-mapped register bank. Injected into `PortGmux` so
/// tests can substitute a recording fake for the live I/O ports.
pub trait PortIo {
    fn outb(&mut self, port: u16, value: u8);
    fn inb(&mut self, port: u16) -> u8;
}

/// Live port I/O. Holding a value of this type means `iopl(3)` succeeded and
/// the process may touch any port.
pub struct IoPorts(());

impl IoPorts {
    pub unsafe fn request() -> io::Result<Self> {
        if libc::iopl(3) < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(IoPorts(()))
    }
}

impl PortIo for IoPorts {
    fn outb(&mut self, port: u16, value: u8) {
        unsafe {
            asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }

    fn inb(&mut self, port: u16) -> u8 {
        let value: u8;
        unsafe {
            asm!("in al, dx", in("dx") port, out("al") value, options(nomem, nostack, preserves_flags));
        }
        value
    }
}

/// The indexed register protocol used by older gmux revisions.
pub struct PortGmux<P: PortIo> {
    ports: P,
}

impl<P: PortIo> PortGmux<P> {
    pub fn new(ports: P) -> Self { PortGmux { ports } }

    /// The value must land in the VALUE register before the index write
    /// triggers the hardware latch.
    fn indexed_write(&mut self, register: u16, value: u8) {
        log::debug!("gmux write: register 0x{:02x} <- 0x{:02x}", register, value);
        self.ports.outb(GMUX_IOSTART + GMUX_PORT_VALUE, value);
        self.ports.outb(GMUX_IOSTART + GMUX_PORT_WRITE, (register & 0xff) as u8);
    }

    fn indexed_read(&mut self, register: u16) -> u8 {
        self.ports.outb(GMUX_IOSTART + GMUX_PORT_READ, (register & 0xff) as u8);
        let value = self.ports.inb(GMUX_IOSTART + GMUX_PORT_VALUE);
        log::debug!("gmux read: register 0x{:02x} -> 0x{:02x}", register, value);
        value
    }

    pub fn active_gpu(&mut self) -> GpuKind {
        match self.indexed_read(GMUX_PORT_SWITCH_DISPLAY) {
            2 => GpuKind::Integrated,
            3 => GpuKind::Discrete,
            _ => GpuKind::Unknown,
        }
    }

    pub fn discrete_power(&mut self) -> PowerState {
        // Bit 0 is the latch bit both power sequences leave behind.
        if self.indexed_read(GMUX_PORT_DISCRETE_POWER) & 1 == 1 {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

impl<P: PortIo> Gmux for PortGmux<P> {
    fn switch_active(&mut self, gpu: GpuKind) -> Result<(), SwitchError> {
        // DDC, then display, then external. Reordering these produces an
        // unsupported transitional display state on real hardware.
        match gpu {
            GpuKind::Integrated => {
                self.indexed_write(GMUX_PORT_SWITCH_DDC, 1);
                self.indexed_write(GMUX_PORT_SWITCH_DISPLAY, 2);
                self.indexed_write(GMUX_PORT_SWITCH_EXTERNAL, 2);
            }
            GpuKind::Discrete => {
                self.indexed_write(GMUX_PORT_SWITCH_DDC, 2);
                self.indexed_write(GMUX_PORT_SWITCH_DISPLAY, 3);
                self.indexed_write(GMUX_PORT_SWITCH_EXTERNAL, 3);
            }
            GpuKind::Unknown => (),
        }
        Ok(())
    }

    fn set_power(&mut self, gpu: GpuKind, state: PowerState) -> Result<(), PowerError> {
        // Only discrete power is controllable through this path. Both
        // sequences assert first, then latch (on) or clear (off).
        match (gpu, state) {
            (GpuKind::Discrete, PowerState::On) => {
                self.indexed_write(GMUX_PORT_DISCRETE_POWER, 1);
                self.indexed_write(GMUX_PORT_DISCRETE_POWER, 3);
            }
            (GpuKind::Discrete, PowerState::Off) => {
                self.indexed_write(GMUX_PORT_DISCRETE_POWER, 1);
                self.indexed_write(GMUX_PORT_DISCRETE_POWER, 0);
            }
            _ => (),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakePorts {
        writes: Vec<(u16, u8)>,
        reads:  VecDeque<u8>,
    }

    impl PortIo for FakePorts {
        fn outb(&mut self, port: u16, value: u8) { self.writes.push((port, value)); }

        fn inb(&mut self, _port: u16) -> u8 { self.reads.pop_front().unwrap_or(0) }
    }

    const VALUE: u16 = GMUX_IOSTART + GMUX_PORT_VALUE;
    const READ: u16 = GMUX_IOSTART + GMUX_PORT_READ;
    const WRITE: u16 = GMUX_IOSTART + GMUX_PORT_WRITE;

    #[test]
    fn indexed_write_is_value_then_index() {
        let mut gmux = PortGmux::new(FakePorts::default());
        gmux.indexed_write(GMUX_PORT_SWITCH_DDC, 1);
        assert_eq!(gmux.ports.writes, vec![(VALUE, 1), (WRITE, 0x28)]);
    }

    #[test]
    fn indexed_read_is_index_then_value() {
        let mut ports = FakePorts::default();
        ports.reads.push_back(0xab);
        let mut gmux = PortGmux::new(ports);
        assert_eq!(gmux.indexed_read(GMUX_PORT_DISCRETE_POWER), 0xab);
        assert_eq!(gmux.ports.writes, vec![(READ, 0x50)]);
    }

    #[test]
    fn switch_to_integrated() {
        let mut gmux = PortGmux::new(FakePorts::default());
        gmux.switch_active(GpuKind::Integrated).unwrap();
        assert_eq!(gmux.ports.writes, vec![
            (VALUE, 1),
            (WRITE, 0x28), // DDC = 1
            (VALUE, 2),
            (WRITE, 0x10), // display = 2
            (VALUE, 2),
            (WRITE, 0x40), // external = 2
        ]);
    }

    #[test]
    fn switch_to_discrete() {
        let mut gmux = PortGmux::new(FakePorts::default());
        gmux.switch_active(GpuKind::Discrete).unwrap();
        assert_eq!(gmux.ports.writes, vec![
            (VALUE, 2),
            (WRITE, 0x28), // DDC = 2
            (VALUE, 3),
            (WRITE, 0x10), // display = 3
            (VALUE, 3),
            (WRITE, 0x40), // external = 3
        ]);
    }

    #[test]
    fn switch_to_unknown_touches_nothing() {
        let mut gmux = PortGmux::new(FakePorts::default());
        gmux.switch_active(GpuKind::Unknown).unwrap();
        assert!(gmux.ports.writes.is_empty());
    }

    #[test]
    fn discrete_power_on_asserts_then_latches() {
        let mut gmux = PortGmux::new(FakePorts::default());
        gmux.set_power(GpuKind::Discrete, PowerState::On).unwrap();
        assert_eq!(gmux.ports.writes, vec![
            (VALUE, 1),
            (WRITE, 0x50),
            (VALUE, 3),
            (WRITE, 0x50),
        ]);
    }

    #[test]
    fn discrete_power_off_asserts_then_clears() {
        let mut gmux = PortGmux::new(FakePorts::default());
        gmux.set_power(GpuKind::Discrete, PowerState::Off).unwrap();
        assert_eq!(gmux.ports.writes, vec![
            (VALUE, 1),
            (WRITE, 0x50),
            (VALUE, 0),
            (WRITE, 0x50),
        ]);
    }

    #[test]
    fn integrated_power_is_uncontrollable() {
        let mut gmux = PortGmux::new(FakePorts::default());
        gmux.set_power(GpuKind::Integrated, PowerState::On).unwrap();
        gmux.set_power(GpuKind::Integrated, PowerState::Off).unwrap();
        gmux.set_power(GpuKind::Unknown, PowerState::On).unwrap();
        gmux.set_power(GpuKind::Discrete, PowerState::Unknown).unwrap();
        assert!(gmux.ports.writes.is_empty());
    }

    #[test]
    fn active_gpu_readback() {
        for (raw, expected) in [
            (2u8, GpuKind::Integrated),
            (3, GpuKind::Discrete),
            (0, GpuKind::Unknown),
            (0xff, GpuKind::Unknown),
        ] {
            let mut ports = FakePorts::default();
            ports.reads.push_back(raw);
            let mut gmux = PortGmux::new(ports);
            assert_eq!(gmux.active_gpu(), expected);
            assert_eq!(gmux.ports.writes, vec![(READ, 0x10)]);
        }
    }

    #[test]
    fn discrete_power_readback() {
        for (raw, expected) in [(3u8, PowerState::On), (1, PowerState::On), (0, PowerState::Off)] {
            let mut ports = FakePorts::default();
            ports.reads.push_back(raw);
            let mut gmux = PortGmux::new(ports);
            assert_eq!(gmux.discrete_power(), expected);
        }
    }
}
