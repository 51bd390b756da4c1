// Licensed under the Apache-2.0 license

//! Register-level simulation of the two-wire peripheral.
//!
//! `SimTwi` behaves like the hardware as far as the slave driver can tell:
//! `INT` is write-one-to-clear, `STOP` clears itself once the bus is released,
//! and the data register holds whatever was last received or loaded. The
//! host side injects conditions with [`SimTwi::raise`] and inspects what the
//! driver did through the counters and histories.

use heapless::HistoryBuffer;

use crate::i2c::common::{BusCondition, LineMode, TwiControl};
use crate::i2c::traits::{TwiLines, TwiRegisters};

/// Depth of the control-write and transmit histories.
pub const SIM_HISTORY: usize = 32;

/// Snapshot of the configuration-relevant registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SimRegisters {
    pub slave_address: u8,
    /// Control register without the pending flag.
    pub control: TwiControl,
    pub line_mode: LineMode,
    pub powered: bool,
}

pub struct SimTwi {
    status: u8,
    control: TwiControl,
    pending: bool,
    data: u8,
    slave_address: u8,
    line_mode: LineMode,
    powered: bool,
    pending_clears: usize,
    stop_requests: usize,
    control_writes: HistoryBuffer<TwiControl, SIM_HISTORY>,
    transmitted: HistoryBuffer<u8, SIM_HISTORY>,
}

impl Default for SimTwi {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTwi {
    /// A peripheral straight out of reset: unpowered, lines released.
    #[must_use]
    pub fn new() -> Self {
        Self {
            // 0xF8: no relevant state information
            status: 0xF8,
            control: TwiControl::empty(),
            pending: false,
            data: 0,
            slave_address: 0,
            line_mode: LineMode::Released,
            powered: false,
            pending_clears: 0,
            stop_requests: 0,
            control_writes: HistoryBuffer::new(),
            transmitted: HistoryBuffer::new(),
        }
    }

    /// Latch `condition` and raise the pending flag. `data` is placed in the
    /// data register, as the hardware does for received bytes.
    pub fn raise(&mut self, condition: BusCondition, data: u8) {
        self.raise_raw(condition.code(), data);
    }

    /// Like [`SimTwi::raise`] with an arbitrary status register value.
    pub fn raise_raw(&mut self, status: u8, data: u8) {
        self.status = status;
        self.data = data;
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Number of writes that acknowledged a pending condition.
    pub fn pending_clears(&self) -> usize {
        self.pending_clears
    }

    /// Number of writes that requested a stop condition.
    pub fn stop_requests(&self) -> usize {
        self.stop_requests
    }

    pub fn registers(&self) -> SimRegisters {
        SimRegisters {
            slave_address: self.slave_address,
            control: self.control,
            line_mode: self.line_mode,
            powered: self.powered,
        }
    }

    /// Recent control register writes, oldest first.
    pub fn control_writes(&self) -> impl Iterator<Item = TwiControl> + '_ {
        self.control_writes.oldest_ordered().copied()
    }

    /// Recent bytes loaded for transmission, oldest first.
    pub fn transmitted(&self) -> impl Iterator<Item = u8> + '_ {
        self.transmitted.oldest_ordered().copied()
    }

    pub fn last_transmitted(&self) -> Option<u8> {
        self.transmitted.recent().copied()
    }
}

impl TwiRegisters for SimTwi {
    fn status(&self) -> u8 {
        self.status
    }

    fn control(&self) -> TwiControl {
        if self.pending {
            self.control | TwiControl::INT
        } else {
            self.control
        }
    }

    fn write_control(&mut self, value: TwiControl) {
        self.control_writes.write(value);

        if value.contains(TwiControl::INT) && self.pending {
            self.pending = false;
            self.pending_clears += 1;
        }
        if value.contains(TwiControl::STOP) {
            self.stop_requests += 1;
        }
        // STOP is released by hardware as soon as the bus is idle again.
        self.control = value.difference(TwiControl::INT | TwiControl::STOP);
    }

    fn data(&self) -> u8 {
        self.data
    }

    fn write_data(&mut self, value: u8) {
        self.data = value;
        self.transmitted.write(value);
    }

    fn write_slave_address(&mut self, value: u8) {
        self.slave_address = value;
    }
}

impl TwiLines for SimTwi {
    fn set_line_mode(&mut self, mode: LineMode) {
        self.line_mode = mode;
    }

    fn set_module_power(&mut self, enabled: bool) {
        self.powered = enabled;
    }
}
